//! Engine facade
//!
//! One [`SphinxEngine`] per adapter instance ties the directory
//! service, the connector and the configuration together and hands out
//! the per-operation state machines: searches, indexing sessions and
//! snippet sessions.  Each of those acquires and releases its own
//! daemon connection around its scope.

use std::sync::Arc;

use crate::config::Config;
use crate::conn::Connection;
use crate::daemon::{Connector, Directory};
use crate::error::Result;
use crate::executor::{CompiledQuery, SearchOptions, SphinxSearch};
use crate::receiver::{SnippetHandler, SnippetReceiver, UpdateReceiver};
use crate::types::MailboxInfo;

pub struct SphinxEngine {
    directory: Arc<dyn Directory>,
    connector: Arc<dyn Connector>,
    config: Config,
}

impl SphinxEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        connector: Arc<dyn Connector>,
        config: Config,
    ) -> Self {
        Self {
            directory,
            connector,
            config,
        }
    }

    fn connection(&self) -> Connection {
        Connection::new(Arc::clone(&self.directory), Arc::clone(&self.connector))
    }

    /// Start building a search over `mailbox`.
    pub fn begin_search(&self, mailbox: MailboxInfo, opts: SearchOptions) -> SphinxSearch {
        SphinxSearch::new(self.connection(), mailbox, opts, &self.config)
    }

    /// Create an indexing receiver for incremental index updates.
    pub fn begin_update(&self) -> UpdateReceiver {
        UpdateReceiver::new(self.connection(), &self.config)
    }

    /// Create a snippet receiver.  `query` is the compiled expression
    /// returned by a previous search execution; `None` turns every
    /// message into a no-op, supporting the "no snippets requested"
    /// mode without a separate code path in the caller.
    pub fn begin_snippets<'a>(
        &self,
        query: Option<CompiledQuery>,
        on_snippet: SnippetHandler<'a>,
    ) -> SnippetReceiver<'a> {
        SnippetReceiver::new(self.connection(), &self.config, query, on_snippet)
    }

    /// Make sure the daemon for `mailbox` is running.  Resolution alone
    /// starts it and refreshes its liveness; the endpoint is discarded.
    pub fn start_daemon(&self, mailbox: &str) -> Result<()> {
        self.directory.resolve(mailbox).map(|_| ())
    }

    /// Ask the directory to shut the daemon for `mailbox` down.
    pub fn stop_daemon(&self, mailbox: &str) -> Result<()> {
        self.directory.request_stop(mailbox)
    }
}
