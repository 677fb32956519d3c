use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, normalize};

/// The party responsible for completing a checklist item.
///
/// Ordering follows declaration order, which is also the order activation
/// emails are composed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Supervisor,
    It,
    Security,
    Ataaps,
    Gtc,
    Dts,
}

impl Role {
    pub const ALL: [Self; 7] = [
        Self::Employee,
        Self::Supervisor,
        Self::It,
        Self::Security,
        Self::Ataaps,
        Self::Gtc,
        Self::Dts,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Supervisor => "supervisor",
            Self::It => "it",
            Self::Security => "security",
            Self::Ataaps => "ataaps",
            Self::Gtc => "gtc",
            Self::Dts => "dts",
        }
    }

    /// Heading used in rendered emails.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Employee => "Employee",
            Self::Supervisor => "Supervisor",
            Self::It => "IT",
            Self::Security => "Security",
            Self::Ataaps => "ATAAPS",
            Self::Gtc => "GTC Program Office",
            Self::Dts => "DTS",
        }
    }

    /// Employee and Supervisor resolve from the request itself; every other
    /// role is staffed through the lead directory.
    #[must_use]
    pub const fn is_request_party(self) -> bool {
        matches!(self, Self::Employee | Self::Supervisor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "role",
                got: s.to_string(),
            })
    }
}

/// A person known by display name and email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Email normalized for comparison (trimmed, lower-cased).
    #[must_use]
    pub fn email_key(&self) -> String {
        normalize(&self.email)
    }
}
