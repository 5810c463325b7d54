//! Staff room notifications
//!
//! The core decides what staff rooms are told; delivering the text is the
//! transport's job, behind [`StaffNotifier`].

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::category::{Handoff, RequestCategory};
use crate::id::UserProfile;
use crate::queue::RequestRecord;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("Failed to notify room '{room}': {message}")]
#[diagnostic(code(carebridge_core::notify_failed))]
pub struct NotifyError {
    pub room: String,
    pub message: String,
}

/// Delivers text to a staff room
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StaffNotifier: Send + Sync {
    async fn notify(&self, room: &str, text: &str) -> Result<(), NotifyError>;
}

/// Announcement posted to a staff room when a user asks for help
pub fn help_request_notice(
    category: RequestCategory,
    profile: &UserProfile,
    description: &str,
) -> String {
    let headline = match category {
        RequestCategory::Medical => "A user requested medical help!",
        RequestCategory::Social => "A user wants to talk!",
    };
    format!(
        "{headline}\n\nName: {}\nUsername: {}\nCase description: {description}",
        profile.display_name(),
        profile.handle()
    )
}

/// Announcement posted when a triage ends in a handoff
pub fn handoff_notice(handoff: Handoff, profile: &UserProfile, description: &str) -> String {
    let headline = match handoff {
        Handoff::NewMembers => "A user wants to help:",
    };
    format!(
        "{headline}\n\nName: {}\nUsername: {}\nCase description: {description}",
        profile.display_name(),
        profile.handle()
    )
}

/// Reminder about a request that has waited too long
pub fn stale_notice(record: &RequestRecord, threshold_minutes: i64) -> String {
    format!(
        "User {} ({}) is waiting for > {} minutes!",
        record.user.profile.display_name(),
        record.user.profile.handle(),
        threshold_minutes
    )
}
