//! Adapter configuration
//!
//! Read-only for the lifetime of a session.  Loadable from TOML, e.g.:
//!
//! ```toml
//! verbosity = 1
//! text_excludes_odd_headers = true
//! max_uncommitted = 20
//! ```

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Diagnostic detail: 0 silent, 1 query logging, 2 per-statement
    /// logging, 3 unabridged statements in logs.
    pub verbosity: u8,

    /// When set, an unqualified text match covers only the well-known
    /// header fields and the body, not every indexed header.
    pub text_excludes_odd_headers: bool,

    /// Inserts buffered between commits.  Aligned with the typical
    /// caller batch size so one commit happens per batch by default.
    pub max_uncommitted: u32,

    /// Hard cap on accumulated part text per message, in bytes.  The
    /// daemon rejects statements much past 8 MB, so stay well under.
    pub max_parts_size: usize,

    /// Row limit handed to the daemon for the main search query.
    pub max_matches: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: 0,
            text_excludes_odd_headers: false,
            max_uncommitted: 20,
            max_parts_size: 4 * 1024 * 1024,
            max_matches: 1000,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}
