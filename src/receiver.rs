//! Streaming text receivers
//!
//! The mail store walks mailboxes, messages and message parts, pushing
//! text at a [`TextReceiver`].  Two implementations exist:
//!
//! - [`UpdateReceiver`] turns each message into an INSERT against the
//!   realtime index, tracks the latest indexed uid in the `latest` side
//!   table and batches commits.
//! - [`SnippetReceiver`] accumulates the same part text but asks the
//!   daemon for highlighted excerpts instead of inserting anything.
//!
//! Both share the per-message part accumulator.

use std::ops::ControlFlow;

use log::{debug, error};

use crate::config::Config;
use crate::conn::Connection;
use crate::dockey::DocumentKey;
use crate::error::{Error, Result};
use crate::escape::{escape_statement_literal, floor_char_boundary};
use crate::executor::CompiledQuery;
use crate::types::{MailboxInfo, SearchField, Uid, DOC_TABLE, KEY_COLUMN, LATEST_TABLE};

/// Receiver interface driven by the mail store's own iteration.
///
/// Call order per mailbox session:
/// `begin_mailbox (begin_message (begin_part append_text* end_part)* end_message)* end_mailbox`
pub trait TextReceiver {
    fn begin_mailbox(&mut self, mailbox: &MailboxInfo) -> Result<()>;

    /// First uid the caller should feed; everything below it is
    /// already indexed.
    fn first_unindexed_uid(&self) -> Uid {
        1
    }

    fn is_indexed(&self, _uid: Uid) -> bool {
        false
    }

    fn begin_message(&mut self, uid: Uid);

    fn begin_part(&mut self, field: SearchField);

    fn append_text(&mut self, text: &str);

    fn end_part(&mut self);

    fn end_message(&mut self) -> Result<()>;

    fn end_mailbox(&mut self) -> Result<()>;
}

/// Snippet callback: `(mailbox, uid, field index, highlighted text)`.
pub type SnippetHandler<'a> = Box<dyn FnMut(&str, Uid, usize, &str) -> ControlFlow<()> + 'a>;

/// Per-message part text, capped across all fields combined.
struct PartsAccumulator {
    uid: Uid,
    current: Option<usize>,
    parts: Vec<String>,
    total: usize,
    cap: usize,
    truncated: bool,
}

impl PartsAccumulator {
    fn new(cap: usize) -> Self {
        Self {
            uid: 0,
            current: None,
            parts: vec![String::new(); SearchField::COUNT],
            total: 0,
            cap,
            truncated: false,
        }
    }

    fn begin_message(&mut self, uid: Uid) {
        self.uid = uid;
        for part in &mut self.parts {
            part.clear();
        }
        self.total = 0;
        self.truncated = false;
        self.current = None;
    }

    fn begin_part(&mut self, field: SearchField) {
        // Any has no column; its text is never accumulated.
        self.current = match field {
            SearchField::Any => None,
            field => Some(field.index()),
        };
    }

    fn append(&mut self, mailbox: &str, text: &str) {
        let Some(index) = self.current else { return };

        let mut len = text.len();
        if self.total + len > self.cap {
            if !self.truncated {
                self.truncated = true;
                error!(
                    "Sphinx: truncating text from message mailbox {} uid {}",
                    mailbox, self.uid
                );
            }
            len = floor_char_boundary(text, self.cap - self.total);
        }
        if len > 0 {
            self.total += len;
            self.parts[index].push_str(&text[..len]);
        }
    }

    fn end_part(&mut self) {
        self.current = None;
    }
}

/// Indexing receiver: one live mailbox session at a time.
pub struct UpdateReceiver {
    conn: Connection,
    verbosity: u8,
    max_uncommitted: u32,
    mailbox: Option<MailboxInfo>,
    acc: PartsAccumulator,
    /// Largest document id in the realtime index; pre-incremented to
    /// assign ids to new rows.  Re-use after deletions is harmless
    /// because ids are write-only keys.
    lastid: u32,
    /// Latest indexed uid for this mailbox generation.
    latest: Uid,
    /// Row id of this mailbox's `latest` entry, 0 when none exists yet.
    latest_id: u32,
    /// Largest row id across the whole `latest` table at mailbox open,
    /// used to synthesize an id when inserting a fresh row.
    latest_lastid: u32,
    uncommitted: u32,
}

impl UpdateReceiver {
    pub(crate) fn new(conn: Connection, config: &Config) -> Self {
        Self {
            conn,
            verbosity: config.verbosity,
            max_uncommitted: config.max_uncommitted,
            mailbox: None,
            acc: PartsAccumulator::new(config.max_parts_size),
            lastid: 0,
            latest: 0,
            latest_id: 0,
            latest_lastid: 0,
            uncommitted: 0,
        }
    }

    fn mailbox(&self) -> Result<&MailboxInfo> {
        self.mailbox
            .as_ref()
            .ok_or_else(|| Error::Internal("no open mailbox session".to_string()))
    }

    /// Largest document id currently in the realtime index, the
    /// starting point for id assignment.
    fn read_lastid(&mut self) -> Result<()> {
        self.lastid = 0;

        let statement = format!(
            "SELECT max(id) FROM {} ORDER BY id DESC LIMIT 1",
            DOC_TABLE
        );
        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        if let Some(row) = reply.into_rows().into_iter().next() {
            self.lastid = row
                .first()
                .and_then(|cell| cell.parse().ok())
                .unwrap_or(0);
        }

        if self.verbosity > 1 {
            debug!("Sphinx read_lastid: {}", self.lastid);
        }
        Ok(())
    }

    /// Recover the latest-indexed marker for the open mailbox.
    ///
    /// The daemon cannot predicate on string columns, so the obvious
    /// `WHERE mboxname=...` is off the table: select every row for the
    /// uidvalidity and filter by mailbox name client-side.  The row-id
    /// watermark is read separately for use when inserting.
    fn read_latest(&mut self) -> Result<()> {
        self.latest = 0;
        self.latest_id = 0;
        self.latest_lastid = 0;

        let mailbox = self.mailbox()?.clone();

        let statement = format!(
            "SELECT id,mboxname,uid FROM {table} WHERE uidvalidity={v} LIMIT 10000",
            table = LATEST_TABLE,
            v = mailbox.uidvalidity,
        );
        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        for row in reply.into_rows() {
            if row.get(1).map(String::as_str) == Some(mailbox.name.as_str()) {
                self.latest_id = row.first().and_then(|c| c.parse().ok()).unwrap_or(0);
                self.latest = row.get(2).and_then(|c| c.parse().ok()).unwrap_or(0);
                break;
            }
        }

        // max(id) comes back one row per document rather than a single
        // aggregate, hence the explicit ORDER BY ... LIMIT 1.
        let statement = format!(
            "SELECT max(id) FROM {} ORDER BY id DESC LIMIT 1",
            LATEST_TABLE
        );
        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        if let Some(row) = reply.into_rows().into_iter().next() {
            self.latest_lastid = row
                .first()
                .and_then(|cell| cell.parse().ok())
                .unwrap_or(0);
        }

        Ok(())
    }

    /// Upsert this mailbox's row in the `latest` table: UPDATE by row
    /// id when one was found at mailbox open, INSERT with a fresh row
    /// id otherwise.
    fn write_latest(&mut self) -> Result<()> {
        let mailbox = self.mailbox()?.clone();

        let statement;
        let mut id = self.latest_id;
        if id != 0 {
            statement = format!(
                "UPDATE {table} SET uid={uid} WHERE id={id}",
                table = LATEST_TABLE,
                uid = self.latest,
                id = id,
            );
        } else {
            id = self.latest_lastid + 1;
            statement = format!(
                "INSERT INTO {table} (id,mboxname,uidvalidity,uid) VALUES ({id},{name},{v},{uid})",
                table = LATEST_TABLE,
                id = id,
                name = escape_statement_literal(&mailbox.name),
                v = mailbox.uidvalidity,
                uid = self.latest,
            );
        }

        self.conn.run_statement(self.verbosity, &statement)?;
        self.latest_id = id;
        Ok(())
    }

    /// Commit buffered inserts once the batch threshold is reached, or
    /// unconditionally when forced.  The latest-indexed marker is
    /// written first so a crash never leaves it ahead of the data.
    fn flush(&mut self, force: bool) -> Result<()> {
        if !force && self.uncommitted < self.max_uncommitted {
            return Ok(());
        }
        if self.uncommitted == 0 {
            return Ok(());
        }

        self.write_latest()?;

        if self.verbosity > 1 {
            debug!("Sphinx committing");
        }

        if let Err(e) = self.conn.run_statement(self.verbosity, "COMMIT") {
            let mailbox = self.mailbox.as_ref().map(|m| m.name.as_str()).unwrap_or("?");
            error!(
                "IOERROR: Sphinx COMMIT failed for mailbox {}, {} messages ending at uid {}: {}",
                mailbox, self.uncommitted, self.acc.uid, e
            );
            return Err(e);
        }

        self.uncommitted = 0;
        Ok(())
    }

    /// INSERT the accumulated message.  Only fields with text make it
    /// into the column list; the daemon refuses explicit NULLs, so
    /// absent fields are omitted entirely.
    fn insert_message(&mut self) -> Result<()> {
        let mailbox = self.mailbox()?.clone();

        self.lastid += 1;
        let key = DocumentKey::new(mailbox.name.clone(), mailbox.uidvalidity, self.acc.uid);

        let mut statement = format!("INSERT INTO {} (id,{}", DOC_TABLE, KEY_COLUMN);
        for field in SearchField::ALL {
            if let Some(column) = field.column() {
                if !self.acc.parts[field.index()].is_empty() {
                    statement.push(',');
                    statement.push_str(column);
                }
            }
        }
        statement.push_str(") VALUES (");
        statement.push_str(&self.lastid.to_string());
        statement.push(',');
        statement.push_str(&escape_statement_literal(&key.encode()));
        for field in SearchField::ALL {
            if field.column().is_some() && !self.acc.parts[field.index()].is_empty() {
                statement.push(',');
                statement.push_str(&escape_statement_literal(&self.acc.parts[field.index()]));
            }
        }
        statement.push(')');

        self.conn.run_statement(self.verbosity, &statement)?;

        self.uncommitted += 1;
        self.latest = self.acc.uid;

        self.flush(false)
    }
}

impl TextReceiver for UpdateReceiver {
    fn begin_mailbox(&mut self, mailbox: &MailboxInfo) -> Result<()> {
        self.conn.acquire(&mailbox.name)?;
        self.mailbox = Some(mailbox.clone());

        self.read_lastid()?;
        self.read_latest()?;
        Ok(())
    }

    fn first_unindexed_uid(&self) -> Uid {
        self.latest.saturating_add(1)
    }

    fn is_indexed(&self, uid: Uid) -> bool {
        uid <= self.latest
    }

    fn begin_message(&mut self, uid: Uid) {
        self.acc.begin_message(uid);
    }

    fn begin_part(&mut self, field: SearchField) {
        self.acc.begin_part(field);
    }

    fn append_text(&mut self, text: &str) {
        let mailbox = self.mailbox.as_ref().map(|m| m.name.as_str()).unwrap_or("");
        self.acc.append(mailbox, text);
    }

    fn end_part(&mut self) {
        if self.verbosity > 1 {
            if let Some(index) = self.acc.current {
                debug!(
                    "Sphinx: {} bytes in part {}",
                    self.acc.parts[index].len(),
                    index
                );
            }
        }
        self.acc.end_part();
    }

    /// Index the accumulated message.  Insert and flush failures are
    /// logged and swallowed so one bad message does not stall the rest
    /// of the mailbox; a missing session is still an error.
    fn end_message(&mut self) -> Result<()> {
        if !self.conn.is_open() {
            return Err(Error::Internal(
                "end_message before begin_mailbox".to_string(),
            ));
        }

        if let Err(e) = self.insert_message() {
            let mailbox = self.mailbox.as_ref().map(|m| m.name.as_str()).unwrap_or("?");
            error!(
                "Sphinx: failed to index message mailbox {} uid {}: {}",
                mailbox, self.acc.uid, e
            );
        }

        self.acc.uid = 0;
        Ok(())
    }

    fn end_mailbox(&mut self) -> Result<()> {
        let mut result = Ok(());
        if self.conn.is_open() {
            result = self.flush(true);
            self.conn.release();
        }
        self.mailbox = None;
        result
    }
}

/// Snippet receiver: accumulates part text like the indexer, then asks
/// the daemon to highlight the stored search expression in it.
pub struct SnippetReceiver<'a> {
    conn: Connection,
    verbosity: u8,
    mailbox: Option<MailboxInfo>,
    acc: PartsAccumulator,
    /// Expression captured at search time; `None` means no snippets
    /// were requested and every message is a silent no-op.
    query: Option<CompiledQuery>,
    on_snippet: SnippetHandler<'a>,
}

impl<'a> SnippetReceiver<'a> {
    pub(crate) fn new(
        conn: Connection,
        config: &Config,
        query: Option<CompiledQuery>,
        on_snippet: SnippetHandler<'a>,
    ) -> Self {
        Self {
            conn,
            verbosity: config.verbosity,
            mailbox: None,
            acc: PartsAccumulator::new(config.max_parts_size),
            query,
            on_snippet,
        }
    }

    fn extract_snippets(&mut self) -> Result<()> {
        let Some(query) = &self.query else {
            return Ok(());
        };
        let mailbox = self
            .mailbox
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::Internal("no open mailbox session".to_string()))?;

        let mut statement = String::from("CALL SNIPPETS((");
        for (i, part) in self.acc.parts.iter().enumerate() {
            if i > 0 {
                statement.push(',');
            }
            statement.push_str(&escape_statement_literal(part));
        }
        statement.push_str("), ");
        statement.push_str(&escape_statement_literal(DOC_TABLE));
        statement.push_str(", ");
        statement.push_str(&escape_statement_literal(query.as_str()));
        statement.push_str(", 1 AS query_mode, 1 AS allow_empty)");

        let reply = self.conn.run_statement(self.verbosity, &statement)?;

        for (index, row) in reply.into_rows().into_iter().enumerate() {
            let Some(cell) = row.first() else { continue };
            if self.verbosity > 1 {
                debug!("snippet [{}] {:?}", index, cell);
            }
            if cell.is_empty() {
                continue;
            }
            if (self.on_snippet)(&mailbox.name, self.acc.uid, index, cell).is_break() {
                break;
            }
        }

        Ok(())
    }
}

impl TextReceiver for SnippetReceiver<'_> {
    fn begin_mailbox(&mut self, mailbox: &MailboxInfo) -> Result<()> {
        self.conn.acquire(&mailbox.name)?;
        self.mailbox = Some(mailbox.clone());
        Ok(())
    }

    fn begin_message(&mut self, uid: Uid) {
        self.acc.begin_message(uid);
    }

    fn begin_part(&mut self, field: SearchField) {
        self.acc.begin_part(field);
    }

    fn append_text(&mut self, text: &str) {
        let mailbox = self.mailbox.as_ref().map(|m| m.name.as_str()).unwrap_or("");
        self.acc.append(mailbox, text);
    }

    fn end_part(&mut self) {
        self.acc.end_part();
    }

    fn end_message(&mut self) -> Result<()> {
        if !self.conn.is_open() {
            return Err(Error::Internal(
                "end_message before begin_mailbox".to_string(),
            ));
        }
        self.extract_snippets()
    }

    fn end_mailbox(&mut self) -> Result<()> {
        if self.conn.is_open() {
            self.conn.release();
        }
        self.mailbox = None;
        Ok(())
    }
}
