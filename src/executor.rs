//! Search execution
//!
//! A [`SphinxSearch`] is handed out in building state, collects the
//! boolean expression through the [`SearchBuilder`] interface, and on
//! [`execute`](SphinxSearch::execute) compiles it, runs it against the
//! daemon and feeds decoded hits to the caller's callback.
//!
//! Results come back newest first: document keys embed uidvalidity and
//! uid, so sorting on the key descending approximates recency.

use std::ops::ControlFlow;

use log::{info, warn};

use crate::config::Config;
use crate::conn::Connection;
use crate::dockey::DocumentKey;
use crate::error::{Error, Result};
use crate::escape::escape_statement_literal;
use crate::query::{BoolOp, QueryCompiler, SearchBuilder};
use crate::types::{MailboxInfo, Uid, DOC_TABLE, KEY_COLUMN, LATEST_TABLE};

/// Options for one search execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Compile only; execute() succeeds with zero hits.
    pub dry_run: bool,
    /// Report every unindexed uid as a candidate hit the caller must
    /// re-verify, preserving no-false-negative semantics.
    pub include_unindexed: bool,
    /// Surface hits from other mailboxes sharing the daemon instead of
    /// filtering them out.
    pub multi_mailbox: bool,
}

/// A compiled full-text expression, kept for later snippet extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery(pub(crate) String);

impl CompiledQuery {
    /// Wrap an expression previously produced by a search execution,
    /// e.g. one carried across processes for snippet generation.
    pub fn from_expression(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hit callback: `(mailbox, uidvalidity, uid)`.  `Break` stops the
/// stream; the executor treats it as normal early termination.
pub type HitHandler<'a> = &'a mut dyn FnMut(&str, u32, Uid) -> ControlFlow<()>;

pub struct SphinxSearch {
    conn: Connection,
    mailbox: MailboxInfo,
    opts: SearchOptions,
    compiler: QueryCompiler,
    verbosity: u8,
    max_matches: u32,
}

impl SphinxSearch {
    pub(crate) fn new(
        conn: Connection,
        mailbox: MailboxInfo,
        opts: SearchOptions,
        config: &Config,
    ) -> Self {
        Self {
            conn,
            mailbox,
            opts,
            compiler: QueryCompiler::new(config.text_excludes_odd_headers),
            verbosity: config.verbosity,
            max_matches: config.max_matches,
        }
    }

    /// Compile the collected expression, run it and stream hits to
    /// `on_hit`.  Returns the compiled expression so the caller can
    /// reuse it for snippet extraction.
    ///
    /// Fails with [`Error::TrivialSearch`] when no real match leaf was
    /// recorded; the daemon would at best enumerate every indexed
    /// message, so the caller is forced onto its fallback path instead.
    pub fn execute(mut self, on_hit: HitHandler<'_>) -> Result<CompiledQuery> {
        let nmatches = self.compiler.match_count();
        let expression = self.compiler.finalize();

        if self.opts.dry_run {
            return Ok(CompiledQuery(expression));
        }

        if nmatches == 0 {
            return Err(Error::TrivialSearch);
        }

        self.conn.acquire(&self.mailbox.name)?;
        let result = self.run(&expression, on_hit);
        self.conn.release();
        result.map(|()| CompiledQuery(expression))
    }

    fn run(&mut self, expression: &str, on_hit: HitHandler<'_>) -> Result<()> {
        let mut latest: Uid = 0;
        if self.opts.include_unindexed {
            // Fetch the latest-indexed uid before the main query so it
            // is an underestimate under concurrent indexing.  The
            // caller copes with false positives but not with silently
            // dropped hits.
            latest = self.read_latest()?;
        }

        let mut statement = format!(
            "SELECT {key} FROM {table} WHERE MATCH({q})",
            key = KEY_COLUMN,
            table = DOC_TABLE,
            q = escape_statement_literal(expression),
        );
        statement.push_str(&format!(
            " ORDER BY {key} DESC LIMIT {max} OPTION max_matches={max}",
            key = KEY_COLUMN,
            max = self.max_matches,
        ));

        if self.verbosity > 0 {
            info!("Sphinx query {}", statement);
        }

        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        for row in reply.into_rows() {
            let Some(cell) = row.first() else { continue };
            let key = match DocumentKey::decode(cell) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Sphinx: skipping unparsable result row: {}", e);
                    continue;
                }
            };

            if !self.opts.multi_mailbox {
                if key.mailbox != self.mailbox.name {
                    continue;
                }
                if key.uidvalidity != self.mailbox.uidvalidity {
                    continue;
                }
            }

            if on_hit(&key.mailbox, key.uidvalidity, key.uid).is_break() {
                return Ok(());
            }
        }

        if self.opts.include_unindexed {
            // Everything past the latest-indexed uid is a candidate the
            // caller must verify against the message itself.
            for uid in latest.saturating_add(1)..=self.mailbox.last_uid {
                if on_hit(&self.mailbox.name, self.mailbox.uidvalidity, uid).is_break() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Latest indexed uid for this mailbox generation, or 0.
    ///
    /// The daemon cannot predicate on string columns, so this selects
    /// every row for the uidvalidity and filters by mailbox name here.
    fn read_latest(&mut self) -> Result<Uid> {
        let statement = format!(
            "SELECT mboxname,uid FROM {table} WHERE uidvalidity={v} LIMIT 10000",
            table = LATEST_TABLE,
            v = self.mailbox.uidvalidity,
        );

        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        for row in reply.into_rows() {
            if row.first().map(String::as_str) == Some(self.mailbox.name.as_str()) {
                return Ok(row
                    .get(1)
                    .and_then(|uid| uid.parse().ok())
                    .unwrap_or(0));
            }
        }
        Ok(0)
    }
}

impl SearchBuilder for SphinxSearch {
    fn begin_group(&mut self, op: BoolOp) {
        self.compiler.begin_group(op);
    }

    fn match_field(&mut self, field: crate::types::SearchField, text: Option<&str>) {
        self.compiler.match_field(field, text);
    }

    fn end_group(&mut self, op: BoolOp) {
        self.compiler.end_group(op);
    }
}
