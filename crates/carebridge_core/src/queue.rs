//! Pending help requests
//!
//! At most one request per user id. Records are created when a user finishes
//! triage and leave the queue when a worker claims them or the user cancels.

use chrono::{DateTime, Duration, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::RequestCategory;
use crate::id::{UserId, UserRef};

/// A user waiting for a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub user: UserRef,
    pub category: RequestCategory,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn waiting_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("User {user_id} is already waiting")]
#[diagnostic(
    code(carebridge_core::already_waiting),
    help("Close the pending request before submitting a new one")
)]
pub struct AlreadyWaiting {
    pub user_id: UserId,
}

/// FIFO of pending requests
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    requests: Vec<RequestRecord>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        user: UserRef,
        category: RequestCategory,
    ) -> Result<&RequestRecord, AlreadyWaiting> {
        self.submit_at(user, category, Utc::now())
    }

    pub fn submit_at(
        &mut self,
        user: UserRef,
        category: RequestCategory,
        created_at: DateTime<Utc>,
    ) -> Result<&RequestRecord, AlreadyWaiting> {
        if self.contains(user.id) {
            return Err(AlreadyWaiting { user_id: user.id });
        }
        self.requests.push(RequestRecord {
            user,
            category,
            created_at,
        });
        Ok(&self.requests[self.requests.len() - 1])
    }

    pub fn peek(&self, user_id: UserId) -> Option<&RequestRecord> {
        self.requests.iter().find(|req| req.user.id == user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.peek(user_id).is_some()
    }

    /// Remove the request of `user_id`; a no-op if there is none
    pub fn close(&mut self, user_id: UserId) -> Option<RequestRecord> {
        let index = self
            .requests
            .iter()
            .position(|req| req.user.id == user_id)?;
        Some(self.requests.remove(index))
    }

    pub fn stale(&self, threshold: Duration) -> Vec<RequestRecord> {
        self.stale_at(Utc::now(), threshold)
    }

    /// Requests that have waited at least `threshold` at time `now`
    pub fn stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<RequestRecord> {
        self.requests
            .iter()
            .filter(|req| req.waiting_for(now) >= threshold)
            .cloned()
            .collect()
    }

    /// Requests in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &RequestRecord> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
