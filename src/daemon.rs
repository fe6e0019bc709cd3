//! Transport boundary to the Sphinx daemon
//!
//! The adapter never opens sockets itself.  Two collaborators are
//! supplied at construction time:
//!
//! - a [`Directory`] that maps a mailbox name to the endpoint of a live
//!   daemon instance and can be told to stop one, and
//! - a [`Connector`] that turns an endpoint into a [`DaemonClient`]
//!   able to execute SphinxQL statements over a blocking round trip.
//!
//! Everything the adapter sends is plain statement text; replies are
//! either an affected-row count or a buffered set of string rows.

use crate::error::Result;

/// One decoded result row.
pub type Row = Vec<String>;

/// Reply to an executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementReply {
    /// Row count for writes (INSERT, UPDATE, COMMIT...).
    Affected(u64),
    /// Result set for reads.
    Rows(Vec<Row>),
}

impl StatementReply {
    /// The reply's rows, treating a write reply as an empty set.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            StatementReply::Affected(_) => Vec::new(),
            StatementReply::Rows(rows) => rows,
        }
    }
}

/// Directory and lifecycle service for per-mailbox daemon instances.
///
/// `resolve` must be called on every connection acquisition, even for a
/// mailbox already in use: the lookup itself tells the directory the
/// daemon is live and must not be expired.
pub trait Directory: Send + Sync {
    /// Map a mailbox name to the endpoint of its (possibly freshly
    /// started) daemon instance.
    fn resolve(&self, mailbox: &str) -> Result<String>;

    /// Ask the directory to shut down the daemon for a mailbox.
    fn request_stop(&self, mailbox: &str) -> Result<()>;
}

/// Factory opening a client connection against a resolved endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Box<dyn DaemonClient>>;
}

/// A live, blocking connection to one daemon instance.
pub trait DaemonClient {
    /// Execute one statement and wait for its reply.
    fn execute(&mut self, statement: &str) -> Result<StatementReply>;

    /// Close the underlying connection.  Called exactly once before the
    /// client is dropped.
    fn close(&mut self);
}
