//! Participant identity
//!
//! Chat transports hand us numeric ids. Everything else about a participant
//! (names, handle, language) is display metadata and never takes part in
//! equality.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::num::ParseIntError;
use std::str::FromStr;

/// Opaque numeric id of a chat participant (user or worker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self(i64::from(id))
    }
}

/// Optional display metadata for a participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Handle without the leading `@`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Preferred language code as reported by the transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl UserProfile {
    /// First name if known, otherwise the handle, otherwise "unknown"
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("unknown")
    }

    /// The handle with an `@` prefix, or "-" when there is none
    pub fn handle(&self) -> String {
        match &self.username {
            Some(name) => format!("@{}", name),
            None => "-".to_string(),
        }
    }
}

/// A participant: id plus display metadata. Equality and hashing use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    #[serde(default)]
    pub profile: UserProfile,
}

impl UserRef {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            profile: UserProfile::default(),
        }
    }

    pub fn with_profile(id: impl Into<UserId>, profile: UserProfile) -> Self {
        Self {
            id: id.into(),
            profile,
        }
    }
}

impl PartialEq for UserRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UserRef {}

impl Hash for UserRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq<UserId> for UserRef {
    fn eq(&self, other: &UserId) -> bool {
        self.id == *other
    }
}

impl Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
