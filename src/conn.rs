//! Connection management for daemon sessions
//!
//! A [`Connection`] resolves a mailbox to its daemon endpoint through
//! the [`Directory`] and keeps the opened client cached for as long as
//! the resolved endpoint stays the same.  It is not a pool: each
//! logical operation (one search, one mailbox indexing session)
//! acquires and releases around its own scope.

use std::sync::Arc;

use log::{debug, error};

use crate::daemon::{Connector, DaemonClient, Directory, StatementReply};
use crate::error::{Error, Result};
use crate::escape::{escape_query_literal, floor_char_boundary};

/// Statement prefix length shown in diagnostics, unless verbosity asks
/// for the whole thing.
const LOG_STATEMENT_MAX: usize = 128;

pub struct Connection {
    directory: Arc<dyn Directory>,
    connector: Arc<dyn Connector>,
    endpoint: Option<String>,
    client: Option<Box<dyn DaemonClient>>,
}

impl Connection {
    pub fn new(directory: Arc<dyn Directory>, connector: Arc<dyn Connector>) -> Self {
        Self {
            directory,
            connector,
            endpoint: None,
            client: None,
        }
    }

    /// Ensure an open connection to the daemon serving `mailbox`.
    ///
    /// The directory is consulted every time, even when the same
    /// mailbox is still in use: the lookup signals liveness and stops
    /// the directory from expiring the daemon under us.  The cached
    /// client is reused only while the resolved endpoint is unchanged;
    /// an endpoint change closes it and reconnects.
    pub fn acquire(&mut self, mailbox: &str) -> Result<()> {
        let endpoint = self.directory.resolve(mailbox)?;

        if self.client.is_some() && self.endpoint.as_deref() == Some(endpoint.as_str()) {
            return Ok(());
        }

        self.release();

        match self.connector.connect(&endpoint) {
            Ok(client) => {
                self.endpoint = Some(endpoint);
                self.client = Some(client);
                Ok(())
            }
            Err(e) => {
                error!("IOERROR: failed to connect to Sphinx at {}: {}", endpoint, e);
                Err(Error::Io(format!("failed to connect to Sphinx: {}", e)))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Close the connection (if any) and forget the cached endpoint.
    pub fn release(&mut self) {
        self.endpoint = None;
        if let Some(mut client) = self.client.take() {
            client.close();
        }
    }

    /// Execute one statement, logging failures with the offending
    /// statement (truncated unless verbosity is maximal, and never with
    /// literals in unescaped form).
    pub fn run_statement(&mut self, verbosity: u8, statement: &str) -> Result<StatementReply> {
        let maxlen = if verbosity > 2 { 0 } else { LOG_STATEMENT_MAX };

        if verbosity > 1 {
            debug!("{}", describe_statement(statement, maxlen));
        }

        let client = self
            .client
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("no open daemon connection".to_string()))?;

        match client.execute(statement) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!("IOERROR: {} failed: {}", describe_statement(statement, maxlen), e);
                Err(e)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

/// Render a statement for diagnostics.  `maxlen == 0` means unlimited;
/// a statement within the limit is shown whole in escaped form so log
/// lines stay parseable.
fn describe_statement(statement: &str, maxlen: usize) -> String {
    if maxlen != 0 && statement.len() > maxlen {
        let end = floor_char_boundary(statement, maxlen);
        format!("Sphinx statement {}...", &statement[..end])
    } else {
        format!("Sphinx statement {}", escape_query_literal(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedDirectory {
        endpoint: Mutex<String>,
        resolves: Mutex<u32>,
    }

    impl ScriptedDirectory {
        fn new(endpoint: &str) -> Self {
            Self {
                endpoint: Mutex::new(endpoint.to_string()),
                resolves: Mutex::new(0),
            }
        }
    }

    impl Directory for ScriptedDirectory {
        fn resolve(&self, _mailbox: &str) -> Result<String> {
            *self.resolves.lock().unwrap() += 1;
            Ok(self.endpoint.lock().unwrap().clone())
        }

        fn request_stop(&self, _mailbox: &str) -> Result<()> {
            Ok(())
        }
    }

    struct CountingConnector {
        connects: Mutex<u32>,
    }

    struct NullClient;

    impl DaemonClient for NullClient {
        fn execute(&mut self, _statement: &str) -> Result<StatementReply> {
            Ok(StatementReply::Affected(0))
        }

        fn close(&mut self) {}
    }

    impl Connector for CountingConnector {
        fn connect(&self, _endpoint: &str) -> Result<Box<dyn DaemonClient>> {
            *self.connects.lock().unwrap() += 1;
            Ok(Box::new(NullClient))
        }
    }

    #[test]
    fn test_reuses_connection_for_same_endpoint() {
        let directory = Arc::new(ScriptedDirectory::new("sock-a"));
        let connector = Arc::new(CountingConnector {
            connects: Mutex::new(0),
        });

        let mut conn = Connection::new(directory.clone(), connector.clone());
        conn.acquire("INBOX").unwrap();
        conn.acquire("INBOX").unwrap();

        // directory consulted every time, connection opened once
        assert_eq!(*directory.resolves.lock().unwrap(), 2);
        assert_eq!(*connector.connects.lock().unwrap(), 1);
    }

    #[test]
    fn test_reconnects_when_endpoint_changes() {
        let directory = Arc::new(ScriptedDirectory::new("sock-a"));
        let connector = Arc::new(CountingConnector {
            connects: Mutex::new(0),
        });

        let mut conn = Connection::new(directory.clone(), connector.clone());
        conn.acquire("INBOX").unwrap();

        *directory.endpoint.lock().unwrap() = "sock-b".to_string();
        conn.acquire("INBOX").unwrap();

        assert_eq!(*connector.connects.lock().unwrap(), 2);
    }

    #[test]
    fn test_release_clears_cached_endpoint() {
        let directory = Arc::new(ScriptedDirectory::new("sock-a"));
        let connector = Arc::new(CountingConnector {
            connects: Mutex::new(0),
        });

        let mut conn = Connection::new(directory, connector.clone());
        conn.acquire("INBOX").unwrap();
        conn.release();
        assert!(!conn.is_open());

        conn.acquire("INBOX").unwrap();
        assert_eq!(*connector.connects.lock().unwrap(), 2);
    }

    #[test]
    fn test_statement_without_connection_is_internal() {
        let directory = Arc::new(ScriptedDirectory::new("sock-a"));
        let connector = Arc::new(CountingConnector {
            connects: Mutex::new(0),
        });

        let mut conn = Connection::new(directory, connector);
        assert!(matches!(
            conn.run_statement(0, "COMMIT"),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_describe_statement_truncates() {
        let long = "x".repeat(200);
        let desc = describe_statement(&long, 128);
        assert!(desc.ends_with("..."));
        let desc = describe_statement(&long, 0);
        assert!(desc.contains(&long));
    }
}
