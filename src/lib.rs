//! sphinxglue - Sphinx full-text search backend adapter for mail stores
//!
//! This library lets a mail store delegate full-text indexing and
//! querying to an external Sphinx-style search daemon reachable over a
//! SQL-like statement protocol.  It compiles boolean search expressions
//! into Sphinx extended query syntax, streams per-message part text
//! into the daemon as documents, and decodes search results back into
//! mailbox-scoped hits with highlighted snippets on demand.
//!
//! The mail store, the daemon directory service and the wire transport
//! are external collaborators supplied through the traits in
//! [`daemon`]; everything here is synchronous and blocking, one logical
//! operation per instance at a time.

pub mod config;
pub mod conn;
pub mod daemon;
pub mod dockey;
pub mod engine;
pub mod error;
pub mod escape;
pub mod executor;
pub mod query;
pub mod receiver;
pub mod types;

pub use config::Config;
pub use conn::Connection;
pub use daemon::{Connector, DaemonClient, Directory, Row, StatementReply};
pub use dockey::DocumentKey;
pub use engine::SphinxEngine;
pub use error::{Error, Result};
pub use executor::{CompiledQuery, HitHandler, SearchOptions, SphinxSearch};
pub use query::{BoolOp, QueryCompiler, SearchBuilder};
pub use receiver::{SnippetHandler, SnippetReceiver, TextReceiver, UpdateReceiver};
pub use types::{MailboxInfo, MailboxName, SearchField, Uid};
