//! Persisted record types: requests, checklist items, lead roles.
//!
//! Identifiers are assigned by the record store; the library never invents
//! them. Enums serialize as lowercase/snake_case strings and parse back
//! case-insensitively.

pub mod item;
pub mod request;
pub mod role;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use item::{ChecklistItem, InvalidTransition, ItemPatch, ItemState, NewChecklistItem};
pub use request::{
    EmploymentType, NewRequest, Request, RequestPatch, RequestStatus, RequestType, WorkLocation,
};
pub use role::{Person, Role};

/// Store-assigned identifier of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

/// Store-assigned identifier of a checklist item record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}
