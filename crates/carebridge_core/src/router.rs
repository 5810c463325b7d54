//! Routing facade
//!
//! [`ConversationRouter`] is the only thing a transport talks to. It owns the
//! request queue and the pairing registry behind a single lock, so admission
//! checks and the mutation that follows them happen atomically. Triage
//! sessions are per user and live in their own concurrent map.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use miette::Diagnostic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    Result,
    catalog::StringCatalog,
    category::{CategoryTable, MediaKind, RequestCategory},
    config::CarebridgeConfig,
    graph::QuestionGraph,
    id::{UserId, UserProfile, UserRef},
    pairing::{AssignError, Pairing, PairingRegistry, Role},
    queue::{AlreadyWaiting, RequestQueue, RequestRecord},
    token::DeepLinkToken,
    triage::{Question, TriageSession, TriageWalker, WalkerOutcome},
};

/// Why a user may not start triage or submit a request
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("All {limit} conversation slots are taken")]
    #[diagnostic(
        code(carebridge_core::capacity_reached),
        help("New users are accepted again once a conversation ends")
    )]
    CapacityReached { limit: usize },

    #[error("User {user_id} is already in a conversation")]
    #[diagnostic(
        code(carebridge_core::in_conversation),
        help("The conversation has to be ended with /stop first")
    )]
    InConversation { user_id: UserId },

    #[error(transparent)]
    #[diagnostic(transparent)]
    AlreadyWaiting(#[from] AlreadyWaiting),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Rejected(AdmissionError),
    FirstQuestion(Question),
}

/// Text to deliver to the other side of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedMessage {
    pub recipient: UserId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRelay {
    /// The conversation's category does not forward this kind of media
    Forbidden,
    Forward {
        recipient: UserId,
        /// Text sent ahead of the media itself
        announce: Option<String>,
    },
}

/// Where a user's case stands from a worker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Waiting,
    Assigned,
    Closed,
}

/// What a cancellation removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cancellation {
    pub triage_dropped: bool,
    pub request: Option<RequestRecord>,
}

impl Cancellation {
    pub fn is_empty(&self) -> bool {
        !self.triage_dropped && self.request.is_none()
    }
}

#[derive(Debug, Default)]
struct RoutingState {
    queue: RequestQueue,
    pairings: PairingRegistry,
}

impl RoutingState {
    fn admit(&self, user_id: UserId) -> std::result::Result<(), AdmissionError> {
        if self.pairings.capacity_reached() {
            return Err(AdmissionError::CapacityReached {
                limit: self.pairings.limit(),
            });
        }
        if self.pairings.lookup(user_id).is_some() {
            return Err(AdmissionError::InConversation { user_id });
        }
        if self.queue.contains(user_id) {
            return Err(AlreadyWaiting { user_id }.into());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConversationRouter {
    state: Mutex<RoutingState>,
    sessions: DashMap<UserId, TriageSession>,
    walker: TriageWalker,
    categories: CategoryTable,
}

impl ConversationRouter {
    pub fn new(walker: TriageWalker, categories: CategoryTable, capacity: usize) -> Self {
        Self {
            state: Mutex::new(RoutingState {
                queue: RequestQueue::new(),
                pairings: PairingRegistry::with_limit(capacity),
            }),
            sessions: DashMap::new(),
            walker,
            categories,
        }
    }

    /// Load the question graph and catalogs named in `config` and build a router
    pub async fn from_config(config: &CarebridgeConfig) -> Result<Self> {
        let graph = QuestionGraph::load(&config.triage.graph_path).await?;
        let catalog = StringCatalog::load_dir(&config.triage.strings_dir).await?;
        let walker = TriageWalker::new(
            Arc::new(graph),
            Arc::new(catalog),
            config.triage.settings(),
        )?;

        info!(
            capacity = config.routing.capacity,
            questions = walker.graph().len(),
            "Conversation router ready"
        );
        Ok(Self::new(
            walker,
            config.categories.clone(),
            config.routing.capacity,
        ))
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn walker(&self) -> &TriageWalker {
        &self.walker
    }

    // Intake

    /// Admit a user and ask the first triage question.
    ///
    /// Starting again while a triage is running restarts it.
    pub fn start_intake(&self, user_id: UserId, language: Option<&str>) -> IntakeOutcome {
        if let Err(reason) = self.state.lock().admit(user_id) {
            info!(user_id = %user_id, reason = %reason, "Intake rejected");
            return IntakeOutcome::Rejected(reason);
        }

        let (session, question) = self.walker.start(language);
        if self.sessions.insert(user_id, session).is_some() {
            debug!(user_id = %user_id, "Restarted triage");
        }
        IntakeOutcome::FirstQuestion(question)
    }

    /// Feed a triage answer; `None` when the user has no triage running.
    ///
    /// The session is dropped once the walk completes.
    pub fn submit_triage_answer(&self, user_id: UserId, text: &str) -> Option<WalkerOutcome> {
        let outcome = {
            let mut session = self.sessions.get_mut(&user_id)?;
            self.walker.advance(&mut session, text)
        };

        if let WalkerOutcome::Completed(summary) = &outcome {
            self.sessions.remove(&user_id);
            info!(
                user_id = %user_id,
                terminal = %summary.terminal,
                category = ?summary.category,
                "Triage finished"
            );
        }
        Some(outcome)
    }

    pub fn has_triage_session(&self, user_id: UserId) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Queue a help request and hand back the token a worker claims it with
    pub fn request_help(
        &self,
        user_id: UserId,
        profile: UserProfile,
        category: RequestCategory,
    ) -> std::result::Result<DeepLinkToken, AdmissionError> {
        let mut state = self.state.lock();
        state.admit(user_id)?;
        let record = state
            .queue
            .submit(UserRef::with_profile(user_id, profile), category)?;

        info!(
            user_id = %record.user.id,
            category = %record.category,
            "Help request submitted"
        );
        Ok(DeepLinkToken::new(category, user_id))
    }

    /// Drop the user's triage session and pending request, whichever exist
    pub fn cancel(&self, user_id: UserId) -> Cancellation {
        let triage_dropped = self.sessions.remove(&user_id).is_some();
        let request = self.state.lock().queue.close(user_id);

        let cancellation = Cancellation {
            triage_dropped,
            request,
        };
        if !cancellation.is_empty() {
            info!(
                user_id = %user_id,
                triage = cancellation.triage_dropped,
                request = cancellation.request.is_some(),
                "Cancelled"
            );
        }
        cancellation
    }

    // Conversations

    /// Pair `worker` with the user named by `token`.
    ///
    /// A triage the worker had running is dropped, so their messages are
    /// relayed from then on.
    pub fn claim(
        &self,
        worker: UserRef,
        token: &DeepLinkToken,
    ) -> std::result::Result<Pairing, AssignError> {
        let pairing = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.pairings.assign(&mut state.queue, worker, token.user_id)?
        };

        if self.sessions.remove(&pairing.worker.id).is_some() {
            debug!(worker_id = %pairing.worker.id, "Dropped worker's triage on claim");
        }
        Ok(pairing)
    }

    /// Prefix `text` for the other side of the sender's conversation
    pub fn relay(&self, sender: UserId, text: &str) -> Option<RelayedMessage> {
        let state = self.state.lock();
        let pairing = state.pairings.lookup(sender)?;
        let route = self.categories.route(pairing.category);
        let (recipient, prefix) = match pairing.role_of(sender)? {
            Role::Worker => (pairing.user.id, &route.worker_prefix),
            Role::User => (pairing.worker.id, &route.user_prefix),
        };

        Some(RelayedMessage {
            recipient,
            text: format!("{prefix}{text}"),
        })
    }

    /// Decide whether a media message is forwarded to the other side
    pub fn relay_media(&self, sender: UserId, kind: MediaKind) -> Option<MediaRelay> {
        let state = self.state.lock();
        let pairing = state.pairings.lookup(sender)?;
        let route = self.categories.route(pairing.category);
        if !route.media.allows(kind) {
            debug!(
                sender = %sender,
                kind = ?kind,
                category = %pairing.category,
                "Media not forwarded"
            );
            return Some(MediaRelay::Forbidden);
        }

        let (recipient, prefix) = match pairing.role_of(sender)? {
            Role::Worker => (pairing.user.id, &route.worker_prefix),
            Role::User => (pairing.worker.id, &route.user_prefix),
        };
        let announce = (kind == MediaKind::Sticker).then(|| format!("{prefix}sent a sticker"));
        Some(MediaRelay::Forward {
            recipient,
            announce,
        })
    }

    /// End the participant's conversation, returning the other side
    pub fn end(&self, participant: UserId) -> Option<UserId> {
        let pairing = self.state.lock().pairings.end(participant)?;
        pairing.peer_of(participant).map(|peer| peer.id)
    }

    pub fn case_status(&self, user_id: UserId) -> CaseStatus {
        let state = self.state.lock();
        if state.queue.contains(user_id) {
            CaseStatus::Waiting
        } else if state.pairings.lookup(user_id).is_some() {
            CaseStatus::Assigned
        } else {
            CaseStatus::Closed
        }
    }

    // Queries

    /// Requests that have waited at least `threshold`
    pub fn sweep_stale(&self, threshold: Duration) -> Vec<RequestRecord> {
        self.sweep_stale_at(Utc::now(), threshold)
    }

    pub fn sweep_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<RequestRecord> {
        self.state.lock().queue.stale_at(now, threshold)
    }

    pub fn pending_requests(&self) -> Vec<RequestRecord> {
        self.state.lock().queue.iter().cloned().collect()
    }

    pub fn active_pairings(&self) -> Vec<Pairing> {
        self.state.lock().pairings.iter().cloned().collect()
    }

    pub fn capacity_reached(&self) -> bool {
        self.state.lock().pairings.capacity_reached()
    }

    pub fn is_user_waiting(&self, user_id: UserId) -> bool {
        self.state.lock().queue.contains(user_id)
    }

    pub fn has_active_conversation(&self, user_id: UserId) -> bool {
        self.state.lock().pairings.lookup(user_id).is_some()
    }
}
