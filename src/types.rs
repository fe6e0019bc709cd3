//! Core types used throughout the adapter

use serde::{Deserialize, Serialize};

/// Message UID (unique within a mailbox generation)
pub type Uid = u32;

/// Mailbox name
pub type MailboxName = String;

/// Name of the Sphinx realtime index holding message text
pub(crate) const DOC_TABLE: &str = "rt";

/// Name of the side table tracking the latest indexed uid per mailbox
pub(crate) const LATEST_TABLE: &str = "latest";

/// Column holding the document key in the realtime index
pub(crate) const KEY_COLUMN: &str = "msgkey";

/// The slice of mailbox state this adapter needs from the mail store.
///
/// `uidvalidity` distinguishes incarnations of a mailbox sharing the same
/// name, so a recreated mailbox never matches documents indexed for its
/// predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxInfo {
    pub name: MailboxName,
    pub uidvalidity: u32,
    /// Highest uid ever assigned in this mailbox.
    pub last_uid: Uid,
}

/// Searchable message fields.
///
/// Each field other than `Any` maps to one column of the realtime index.
/// `Any` means "match anywhere" and has no column of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchField {
    Any = 0,
    From = 1,
    To = 2,
    Cc = 3,
    Bcc = 4,
    Subject = 5,
    Headers = 6,
    Body = 7,
}

impl SearchField {
    /// Number of fields, including `Any`.
    pub const COUNT: usize = 8;

    pub const ALL: [SearchField; Self::COUNT] = [
        SearchField::Any,
        SearchField::From,
        SearchField::To,
        SearchField::Cc,
        SearchField::Bcc,
        SearchField::Subject,
        SearchField::Headers,
        SearchField::Body,
    ];

    /// Index table column for this field, or `None` for `Any`.
    pub fn column(self) -> Option<&'static str> {
        match self {
            SearchField::Any => None,
            SearchField::From => Some("header_from"),
            SearchField::To => Some("header_to"),
            SearchField::Cc => Some("header_cc"),
            SearchField::Bcc => Some("header_bcc"),
            SearchField::Subject => Some("header_subject"),
            SearchField::Headers => Some("headers"),
            SearchField::Body => Some("body"),
        }
    }

    /// Position of this field in part accumulators and snippet results.
    pub fn index(self) -> usize {
        self as usize
    }
}
