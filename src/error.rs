//! Error types for the Sphinx adapter

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport or statement failure talking to the Sphinx daemon.
    #[error("IO error: {0}")]
    Io(String),

    /// The search expression has no full-text match clauses.  Sphinx
    /// cannot usefully evaluate such a query, so the caller must fall
    /// back to scanning and filtering messages itself.  This is an
    /// expected control-flow signal, not a fault.
    #[error("query contains no full-text match clauses")]
    TrivialSearch,

    /// Protocol misuse, e.g. ending a message before opening a mailbox.
    #[error("internal error: {0}")]
    Internal(String),

    /// A result row's document key failed to parse.
    #[error("malformed document key: {0}")]
    MalformedKey(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
