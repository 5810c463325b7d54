//! Active worker ↔ user conversations
//!
//! Every id appears in at most one pairing, on either side. Creating a
//! pairing consumes the user's pending request.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::category::RequestCategory;
use crate::id::{UserId, UserRef};
use crate::queue::RequestQueue;

/// Concurrent pairings allowed when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 100;

/// Side of a pairing a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Worker,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub worker: UserRef,
    pub user: UserRef,
    pub category: RequestCategory,
    pub started_at: DateTime<Utc>,
}

impl Pairing {
    pub fn involves(&self, id: UserId) -> bool {
        self.worker.id == id || self.user.id == id
    }

    pub fn role_of(&self, id: UserId) -> Option<Role> {
        if self.worker.id == id {
            Some(Role::Worker)
        } else if self.user.id == id {
            Some(Role::User)
        } else {
            None
        }
    }

    /// The other side of the conversation
    pub fn peer_of(&self, id: UserId) -> Option<&UserRef> {
        match self.role_of(id)? {
            Role::Worker => Some(&self.user),
            Role::User => Some(&self.worker),
        }
    }
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error("Worker {user_id} cannot take their own request")]
    #[diagnostic(
        code(carebridge_core::self_assignment),
        help("Another worker has to claim this request")
    )]
    SelfAssignment { user_id: UserId },

    #[error("Worker {worker_id} cannot take another conversation")]
    #[diagnostic(
        code(carebridge_core::worker_busy),
        help("End the current conversation first, or wait until capacity frees up")
    )]
    WorkerBusy { worker_id: UserId },

    #[error("Worker {worker_id} is waiting for help themselves")]
    #[diagnostic(
        code(carebridge_core::worker_waiting),
        help("Withdraw the pending request with /cancel before taking a case")
    )]
    WorkerWaiting { worker_id: UserId },

    #[error("No pending request for user {user_id}")]
    #[diagnostic(
        code(carebridge_core::no_such_request),
        help("The request was already claimed or closed")
    )]
    NoSuchRequest { user_id: UserId },

    #[error("User {user_id} is already in a conversation")]
    #[diagnostic(code(carebridge_core::user_busy))]
    UserBusy { user_id: UserId },
}

#[derive(Debug, Clone)]
pub struct PairingRegistry {
    pairings: Vec<Pairing>,
    limit: usize,
}

impl Default for PairingRegistry {
    fn default() -> Self {
        Self::with_limit(DEFAULT_CAPACITY)
    }
}

impl PairingRegistry {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pairings: Vec::new(),
            limit,
        }
    }

    /// Pair `worker` with the user behind a pending request, consuming that request.
    ///
    /// Checks run in order: self assignment, worker already paired or capacity
    /// reached, worker has a pending request, missing request, user already
    /// paired. An id is therefore never queued and paired at the same time.
    pub fn assign(
        &mut self,
        queue: &mut RequestQueue,
        worker: UserRef,
        user_id: UserId,
    ) -> Result<Pairing, AssignError> {
        if worker.id == user_id {
            return Err(AssignError::SelfAssignment { user_id });
        }
        if self.lookup(worker.id).is_some() || self.capacity_reached() {
            return Err(AssignError::WorkerBusy {
                worker_id: worker.id,
            });
        }
        if queue.contains(worker.id) {
            return Err(AssignError::WorkerWaiting {
                worker_id: worker.id,
            });
        }
        if !queue.contains(user_id) {
            return Err(AssignError::NoSuchRequest { user_id });
        }
        if self.lookup(user_id).is_some() {
            return Err(AssignError::UserBusy { user_id });
        }

        let Some(request) = queue.close(user_id) else {
            return Err(AssignError::NoSuchRequest { user_id });
        };
        let pairing = Pairing {
            worker,
            user: request.user,
            category: request.category,
            started_at: Utc::now(),
        };
        info!(
            worker_id = %pairing.worker.id,
            user_id = %pairing.user.id,
            category = %pairing.category,
            active = self.pairings.len() + 1,
            "Pairing created"
        );
        self.pairings.push(pairing.clone());
        Ok(pairing)
    }

    /// The pairing `id` takes part in, on either side
    pub fn lookup(&self, id: UserId) -> Option<&Pairing> {
        self.pairings.iter().find(|p| p.involves(id))
    }

    /// Remove the pairing `id` takes part in; a no-op if there is none
    pub fn end(&mut self, id: UserId) -> Option<Pairing> {
        let index = self.pairings.iter().position(|p| p.involves(id))?;
        let pairing = self.pairings.remove(index);
        info!(
            ended_by = %id,
            worker_id = %pairing.worker.id,
            user_id = %pairing.user.id,
            "Pairing ended"
        );
        Some(pairing)
    }

    pub fn capacity_reached(&self) -> bool {
        self.pairings.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pairing> {
        self.pairings.iter()
    }

    pub fn len(&self) -> usize {
        self.pairings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}
