//! Request categories and their routing table
//!
//! Every category-dependent decision (staff room, deep-link prefix, relay
//! prefixes, allowed media) is looked up here instead of being branched on
//! at the call site. Handoffs are endings that only notify a room and never
//! queue a request.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The kind of help a user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Medical,
    Social,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 2] = [RequestCategory::Medical, RequestCategory::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Social => "social",
        }
    }
}

impl Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A triage ending passed on to a staff room without queueing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handoff {
    /// Someone offering to help
    NewMembers,
}

impl Handoff {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMembers => "new_members",
        }
    }
}

impl Display for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of non-text messages a pairing may forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Sticker,
    Audio,
    Voice,
}

/// Which media kinds are forwarded inside a category's conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPolicy {
    #[serde(default = "default_true")]
    pub photos: bool,

    /// Stickers and animations
    #[serde(default = "default_true")]
    pub stickers: bool,

    /// Voice notes and audio files
    #[serde(default = "default_true")]
    pub voice: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            photos: true,
            stickers: true,
            voice: true,
        }
    }
}

impl MediaPolicy {
    pub fn allows(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Photo => self.photos,
            MediaKind::Sticker => self.stickers,
            MediaKind::Audio | MediaKind::Voice => self.voice,
        }
    }
}

/// Destination and presentation for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRoute {
    /// Staff room identifier handed to the transport
    pub room: String,

    /// Human readable room name used in replies to the user
    pub room_label: String,

    /// Prefix of deep-link tokens, e.g. `doctor` in `doctor_42`
    pub token_prefix: String,

    /// Prepended to text a worker sends to the user
    pub worker_prefix: String,

    /// Prepended to text a user sends to the worker
    pub user_prefix: String,

    #[serde(default)]
    pub media: MediaPolicy,
}

/// Room a handoff is posted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRoute {
    pub room: String,
    pub room_label: String,
}

/// Explicit category → route mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    #[serde(default = "CategoryTable::default_medical")]
    pub medical: CategoryRoute,

    #[serde(default = "CategoryTable::default_social")]
    pub social: CategoryRoute,

    #[serde(default = "CategoryTable::default_new_members")]
    pub new_members: HandoffRoute,
}

impl CategoryTable {
    pub fn route(&self, category: RequestCategory) -> &CategoryRoute {
        match category {
            RequestCategory::Medical => &self.medical,
            RequestCategory::Social => &self.social,
        }
    }

    pub fn route_mut(&mut self, category: RequestCategory) -> &mut CategoryRoute {
        match category {
            RequestCategory::Medical => &mut self.medical,
            RequestCategory::Social => &mut self.social,
        }
    }

    pub fn handoff(&self, handoff: Handoff) -> &HandoffRoute {
        match handoff {
            Handoff::NewMembers => &self.new_members,
        }
    }

    pub fn handoff_mut(&mut self, handoff: Handoff) -> &mut HandoffRoute {
        match handoff {
            Handoff::NewMembers => &mut self.new_members,
        }
    }

    /// Reverse lookup used when parsing deep-link tokens
    pub fn category_for_prefix(&self, prefix: &str) -> Option<RequestCategory> {
        RequestCategory::ALL
            .into_iter()
            .find(|category| self.route(*category).token_prefix == prefix)
    }

    fn default_medical() -> CategoryRoute {
        CategoryRoute {
            room: "doctors".to_string(),
            room_label: "doctor's room".to_string(),
            token_prefix: "doctor".to_string(),
            worker_prefix: "👨‍⚕️: ".to_string(),
            user_prefix: "👤: ".to_string(),
            media: MediaPolicy::default(),
        }
    }

    fn default_social() -> CategoryRoute {
        CategoryRoute {
            room: "psychologists".to_string(),
            room_label: "psychologists' room".to_string(),
            token_prefix: "psychologist".to_string(),
            worker_prefix: "🧑‍💼: ".to_string(),
            user_prefix: "👤: ".to_string(),
            media: MediaPolicy::default(),
        }
    }

    fn default_new_members() -> HandoffRoute {
        HandoffRoute {
            room: "new_members".to_string(),
            room_label: "new members' room".to_string(),
        }
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            medical: Self::default_medical(),
            social: Self::default_social(),
            new_members: Self::default_new_members(),
        }
    }
}
