//! Carebridge Core - triage and conversation routing
//!
//! This crate provides the question-graph driven triage walker, the
//! pending request queue and the worker/user pairing registry, tied
//! together by a single routing facade that chat transports call into.

pub mod catalog;
pub mod category;
pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod notify;
pub mod pairing;
pub mod queue;
pub mod router;
pub mod sweep;
pub mod token;
pub mod triage;

pub use catalog::StringCatalog;
pub use category::{
    CategoryRoute, CategoryTable, Handoff, HandoffRoute, MediaKind, MediaPolicy, RequestCategory,
};
pub use config::CarebridgeConfig;
pub use error::{CoreError, Result};
pub use graph::{NodeId, QuestionGraph};
pub use id::{UserId, UserProfile, UserRef};
pub use notify::{NotifyError, StaffNotifier};
pub use pairing::{AssignError, Pairing, PairingRegistry, Role};
pub use queue::{AlreadyWaiting, RequestQueue, RequestRecord};
pub use router::{
    AdmissionError, Cancellation, CaseStatus, ConversationRouter, IntakeOutcome, MediaRelay,
    RelayedMessage,
};
pub use sweep::spawn_stale_sweep;
pub use token::{DeepLinkToken, TokenError};
pub use triage::{Question, TriageSession, TriageSummary, TriageWalker, WalkerOutcome};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        AdmissionError, AssignError, CarebridgeConfig, CaseStatus, ConversationRouter, CoreError,
        DeepLinkToken, IntakeOutcome, MediaKind, MediaRelay, Question, RequestCategory, Result,
        StaffNotifier, UserId, UserProfile, UserRef, WalkerOutcome,
    };
}
