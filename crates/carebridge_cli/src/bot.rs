//! Console chat bot
//!
//! Turns one inbound line (`<user id> <text>`) into the messages the bot
//! sends back. Staff room announcements go through the [`StaffNotifier`].

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use carebridge_core::{
    AdmissionError, AssignError, CaseStatus, ConversationRouter, DeepLinkToken, Handoff,
    IntakeOutcome, MediaKind, MediaRelay, Question, RequestCategory, StaffNotifier, TriageSummary,
    UserId, UserProfile, UserRef, WalkerOutcome,
    notify::{handoff_notice, help_request_notice},
};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, warn};

const GREETING: &str = "Hello there. Thank you for contacting Carebridge.";
const QUEUE_FULL: &str = "Hello there. Sorry but the queue of waiting users is currently just \
too long. In order to prevent users from becoming frustrated, because of long waiting times, we \
decided to not accept new users for now. Please try again soon. Bye.";
const ALREADY_CHATTING: &str = "You are already having a conversation. You can end it with /stop.";
const ALREADY_WAITING: &str =
    "You are already waiting for an answer. Please be patient. We'll handle your request soon.";
const CANCELLED: &str = "Bye! I hope we can talk again some day.";
const FAREWELL: &str = "Okay, please tell your friends about Carebridge!";
const DESCRIBE: &str = "Please tell us a little more about your situation.";
const CASE_ASSIGNED: &str = "Case assigned to you! You are now connected to the patient!";
const HELPER_FOUND: &str = "Hey, we found someone who can help you. You are now connected to \
them - simply send your messages in here.";
const WORKER_BUSY: &str = "Sorry, you are already in a conversation. Please use /stop to end it, \
before starting a new one.";
const WORKER_WAITING: &str = "Sorry, you are waiting for help yourself. Please use /cancel to \
withdraw your request, before taking over a case.";
const NO_FREE_SLOT: &str = "Sorry, all conversation slots are taken right now. Please try again \
once a conversation has ended.";
const CASE_TAKEN: &str = "Sorry, but this case is assigned to someone else!";
const CASE_CLOSED: &str = "Sorry, but this case is already closed!";
const SELF_CLAIM: &str =
    "You can't talk to yourself! Please wait for someone else to take over your case.";
const UNKNOWN_LINK: &str = "Sorry, I don't recognise that link.";
const ENDED: &str = "I ended the conversation!";
const PEER_ENDED: &str = "Your opponent ended the conversation!";
const FORBIDDEN_MEDIA: &str = "Sorry, I can't handle that type of messages!";

/// A message the bot sends to a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text { to: UserId, text: String },
    Media { to: UserId, kind: MediaKind },
}

impl Outbound {
    fn text(to: UserId, text: impl Into<String>) -> Self {
        Self::Text {
            to,
            text: text.into(),
        }
    }
}

impl Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { to, text } => write!(f, "-> user {to}: {text}"),
            Self::Media { to, kind } => write!(f, "-> user {to}: [{kind:?}]"),
        }
    }
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("Empty line")]
    #[diagnostic(code(carebridge_cli::empty_line))]
    Empty,

    #[error("'{0}' does not start with a user id")]
    #[diagnostic(
        code(carebridge_cli::missing_user_id),
        help("Lines look like `<user id> <text>`, e.g. `42 /start`")
    )]
    MissingUserId(String),
}

/// Split `<user id> <text>`
pub fn parse_line(line: &str) -> Result<(UserId, &str), LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineError::Empty);
    }
    let (id, text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let id = id
        .parse::<UserId>()
        .map_err(|_| LineError::MissingUserId(line.to_string()))?;
    Ok((id, text.trim()))
}

/// Where a description collected after triage is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    /// Queued as a help request and announced to the category's room
    Request(RequestCategory),
    /// Only announced; nothing is queued
    Handoff(Handoff),
}

/// Triage finished; waiting for the free-text description
#[derive(Debug, Clone)]
struct PendingDescription {
    destination: Destination,
    summary: TriageSummary,
}

pub struct ConsoleBot {
    router: Arc<ConversationRouter>,
    notifier: Arc<dyn StaffNotifier>,
    describing: HashMap<UserId, PendingDescription>,
}

impl ConsoleBot {
    pub fn new(router: Arc<ConversationRouter>, notifier: Arc<dyn StaffNotifier>) -> Self {
        Self {
            router,
            notifier,
            describing: HashMap::new(),
        }
    }

    /// Handle one message from `user`
    pub async fn handle(&mut self, user: UserId, text: &str) -> Vec<Outbound> {
        debug!(user_id = %user, text, "Inbound message");
        match text.split_once(char::is_whitespace) {
            Some(("/start", token)) => self.claim(user, token.trim()),
            _ => match text {
                "/start" => self.welcome(user),
                "/stop" => self.stop(user),
                "/cancel" => self.cancel(user),
                "/photo" => self.media(user, MediaKind::Photo),
                "/sticker" => self.media(user, MediaKind::Sticker),
                "/audio" => self.media(user, MediaKind::Audio),
                "/voice" => self.media(user, MediaKind::Voice),
                _ => self.text(user, text).await,
            },
        }
    }

    fn welcome(&mut self, user: UserId) -> Vec<Outbound> {
        self.describing.remove(&user);
        match self.router.start_intake(user, None) {
            IntakeOutcome::FirstQuestion(question) => vec![
                Outbound::text(user, GREETING),
                Outbound::text(user, render(&question)),
            ],
            IntakeOutcome::Rejected(reason) => vec![Outbound::text(user, admission_text(&reason))],
        }
    }

    fn claim(&mut self, worker: UserId, token: &str) -> Vec<Outbound> {
        let token = match DeepLinkToken::parse(token, self.router.categories()) {
            Ok(token) => token,
            Err(e) => {
                debug!(worker_id = %worker, error = %e, "Rejected deep link");
                return vec![Outbound::text(worker, UNKNOWN_LINK)];
            }
        };

        match self.router.claim(UserRef::new(worker), &token) {
            Ok(pairing) => {
                self.describing.remove(&worker);
                vec![
                    Outbound::text(worker, CASE_ASSIGNED),
                    Outbound::text(pairing.user.id, HELPER_FOUND),
                ]
            }
            Err(AssignError::SelfAssignment { .. }) => vec![Outbound::text(worker, SELF_CLAIM)],
            Err(AssignError::WorkerWaiting { .. }) => vec![Outbound::text(worker, WORKER_WAITING)],
            Err(AssignError::WorkerBusy { .. }) => {
                let text = if self.router.has_active_conversation(worker) {
                    WORKER_BUSY
                } else {
                    NO_FREE_SLOT
                };
                vec![Outbound::text(worker, text)]
            }
            Err(AssignError::NoSuchRequest { user_id } | AssignError::UserBusy { user_id }) => {
                let text = match self.router.case_status(user_id) {
                    CaseStatus::Assigned => CASE_TAKEN,
                    CaseStatus::Waiting | CaseStatus::Closed => CASE_CLOSED,
                };
                vec![Outbound::text(worker, text)]
            }
        }
    }

    fn stop(&mut self, user: UserId) -> Vec<Outbound> {
        match self.router.end(user) {
            Some(peer) => vec![
                Outbound::text(user, ENDED),
                Outbound::text(peer, PEER_ENDED),
            ],
            None => Vec::new(),
        }
    }

    fn cancel(&mut self, user: UserId) -> Vec<Outbound> {
        self.describing.remove(&user);
        self.router.cancel(user);
        vec![Outbound::text(user, CANCELLED)]
    }

    fn media(&mut self, user: UserId, kind: MediaKind) -> Vec<Outbound> {
        match self.router.relay_media(user, kind) {
            Some(MediaRelay::Forward {
                recipient,
                announce,
            }) => announce
                .map(|text| Outbound::text(recipient, text))
                .into_iter()
                .chain(std::iter::once(Outbound::Media {
                    to: recipient,
                    kind,
                }))
                .collect(),
            Some(MediaRelay::Forbidden) => vec![Outbound::text(user, FORBIDDEN_MEDIA)],
            None => Vec::new(),
        }
    }

    async fn text(&mut self, user: UserId, text: &str) -> Vec<Outbound> {
        if let Some(pending) = self.describing.remove(&user) {
            return match pending.destination {
                Destination::Request(category) => {
                    self.forward(user, category, &pending.summary, text).await
                }
                Destination::Handoff(handoff) => self.hand_off(user, handoff, text).await,
            };
        }

        if let Some(outcome) = self.router.submit_triage_answer(user, text) {
            return match outcome {
                WalkerOutcome::Reprompt(question) | WalkerOutcome::NextQuestion(question) => {
                    vec![Outbound::text(user, render(&question))]
                }
                WalkerOutcome::Completed(summary) => self.finish_triage(user, summary),
            };
        }

        match self.router.relay(user, text) {
            Some(message) => vec![Outbound::text(message.recipient, message.text)],
            None => Vec::new(),
        }
    }

    fn finish_triage(&mut self, user: UserId, summary: TriageSummary) -> Vec<Outbound> {
        let destination = match (summary.category, summary.handoff) {
            (Some(category), _) => Destination::Request(category),
            (None, Some(handoff)) => Destination::Handoff(handoff),
            (None, None) => {
                let text = summary.closing.unwrap_or_else(|| FAREWELL.to_string());
                return vec![Outbound::text(user, text)];
            }
        };

        let text = summary.closing.clone().unwrap_or_else(|| DESCRIBE.to_string());
        self.describing.insert(
            user,
            PendingDescription {
                destination,
                summary,
            },
        );
        vec![Outbound::text(user, text)]
    }

    /// Queue the request and announce it in the category's staff room
    async fn forward(
        &self,
        user: UserId,
        category: RequestCategory,
        summary: &TriageSummary,
        description: &str,
    ) -> Vec<Outbound> {
        let profile = UserProfile::default();
        let token = match self.router.request_help(user, profile.clone(), category) {
            Ok(token) => token,
            Err(reason) => return vec![Outbound::text(user, admission_text(&reason))],
        };

        let categories = self.router.categories();
        let route = categories.route(category);
        let notice = format!(
            "{}\n\n{}\n\nAssign case to me: /start {}",
            help_request_notice(category, &profile, description),
            summary.text,
            token.encode(categories)
        );
        if let Err(e) = self.notifier.notify(&route.room, &notice).await {
            warn!(
                user_id = %user,
                room = %route.room,
                error = %e,
                "Failed to announce help request"
            );
        }

        vec![Outbound::text(
            user,
            format!("Forwarded your request to the {}!", route.room_label),
        )]
    }

    /// Announce the description in the handoff room without queueing anything
    async fn hand_off(&self, user: UserId, handoff: Handoff, description: &str) -> Vec<Outbound> {
        let route = self.router.categories().handoff(handoff);
        let notice = handoff_notice(handoff, &UserProfile::default(), description);
        if let Err(e) = self.notifier.notify(&route.room, &notice).await {
            warn!(
                user_id = %user,
                room = %route.room,
                error = %e,
                "Failed to announce handoff"
            );
        }

        vec![Outbound::text(
            user,
            format!("Forwarded your request to the {}!", route.room_label),
        )]
    }
}

fn admission_text(reason: &AdmissionError) -> &'static str {
    match reason {
        AdmissionError::CapacityReached { .. } => QUEUE_FULL,
        AdmissionError::InConversation { .. } => ALREADY_CHATTING,
        AdmissionError::AlreadyWaiting(_) => ALREADY_WAITING,
    }
}

/// Prompt followed by the options, `[Yes | No]`
fn render(question: &Question) -> String {
    format!("{} [{}]", question.prompt, question.options.join(" | "))
}
