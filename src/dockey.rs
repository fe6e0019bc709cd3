//! Document key codec
//!
//! Every indexed message is identified inside the daemon by an opaque
//! string of the form `<mailbox>.<uidvalidity>.<uid>`, e.g.
//! `user.cassandane.1320711192.196715`.  Mailbox names may themselves
//! contain the separator, so decoding strips the two rightmost fields
//! and treats whatever is left as the mailbox name.

use crate::error::{Error, Result};
use crate::types::Uid;

/// Composite identity of an indexed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey {
    pub mailbox: String,
    pub uidvalidity: u32,
    pub uid: Uid,
}

impl DocumentKey {
    pub fn new(mailbox: impl Into<String>, uidvalidity: u32, uid: Uid) -> Self {
        Self {
            mailbox: mailbox.into(),
            uidvalidity,
            uid,
        }
    }

    /// Serialize to the daemon's key string.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a key string coming back from the daemon.
    pub fn decode(key: &str) -> Result<Self> {
        let malformed = || Error::MalformedKey(key.to_string());

        let (rest, uid) = key.rsplit_once('.').ok_or_else(malformed)?;
        let (mailbox, uidvalidity) = rest.rsplit_once('.').ok_or_else(malformed)?;

        let uid: Uid = uid.parse().map_err(|_| malformed())?;
        let uidvalidity: u32 = uidvalidity.parse().map_err(|_| malformed())?;

        Ok(Self {
            mailbox: mailbox.to_string(),
            uidvalidity,
            uid,
        })
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.mailbox, self.uidvalidity, self.uid)
    }
}
