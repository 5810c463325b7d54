use std::path::PathBuf;
use std::sync::Arc;

use carebridge_core::prelude::*;
use carebridge_core::{
    CategoryTable, Handoff, StringCatalog, TriageSummary, TriageWalker, graph::QuestionGraph,
    triage::TriageSettings,
};
use pretty_assertions::assert_eq;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

async fn bundled_router(capacity: usize) -> ConversationRouter {
    let mut config = CarebridgeConfig::default();
    config.triage.graph_path = data_dir().join("questions.json");
    config.triage.strings_dir = data_dir().join("strings");
    config.routing.capacity = capacity;
    ConversationRouter::from_config(&config).await.unwrap()
}

fn small_router(capacity: usize) -> ConversationRouter {
    let graph = QuestionGraph::from_json_str(
        r#"{
            "start": "a",
            "nodes": [{"id": "a", "prompt": "q"}, {"id": "b", "category": "medical"}],
            "edges": [{"from": "a", "to": "b", "answer": "go"}]
        }"#,
    )
    .unwrap();
    let catalog = StringCatalog::new().with_language("en", [("q", "Q?"), ("go", "Go")]);
    let walker = TriageWalker::new(
        Arc::new(graph),
        Arc::new(catalog),
        TriageSettings::default(),
    )
    .unwrap();
    ConversationRouter::new(walker, CategoryTable::default(), capacity)
}

fn walk(router: &ConversationRouter, user: UserId, answers: &[&str]) -> TriageSummary {
    let IntakeOutcome::FirstQuestion(_) = router.start_intake(user, None) else {
        panic!("intake rejected");
    };
    let mut last = None;
    for answer in answers {
        last = router.submit_triage_answer(user, answer);
        assert!(
            !matches!(last, Some(WalkerOutcome::Reprompt(_))),
            "answer {answer:?} was rejected"
        );
    }
    match last {
        Some(WalkerOutcome::Completed(summary)) => summary,
        other => panic!("triage did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn medical_walk_over_bundled_graph() {
    let router = bundled_router(100).await;
    let summary = walk(&router, UserId(1), &["No", "Yes", "Fever", "Cough", "Done"]);

    assert_eq!(summary.category, Some(RequestCategory::Medical));
    assert_eq!(
        summary.text,
        "Are you feeling Ok?: No\n\
         Oh no, I'm sorry about that! Are you having cough or fever?: Yes\n\
         Which of these do you have? Pick all that apply, then press Done.: Fever, Cough"
    );
    assert!(
        summary
            .closing
            .as_deref()
            .is_some_and(|text| text.starts_with("Dear patient"))
    );
}

#[tokio::test]
async fn every_visited_node_listed_once_in_order() {
    let router = bundled_router(100).await;
    let summary = walk(&router, UserId(1), &["No", "No", "Yes"]);

    let visited: Vec<&str> = summary.answers.iter().map(|a| a.node.as_str()).collect();
    assert_eq!(visited, vec!["feel_ok", "cough_fever", "stressed"]);
    assert_eq!(summary.category, Some(RequestCategory::Social));
}

#[tokio::test]
async fn uncategorized_terminal_ends_without_request() {
    let router = bundled_router(100).await;
    let summary = walk(&router, UserId(1), &["Yes", "No"]);
    assert_eq!(summary.category, None);
    assert_eq!(summary.handoff, None);
    assert!(!router.is_user_waiting(UserId(1)));
}

#[tokio::test]
async fn volunteer_walk_ends_in_handoff() {
    let router = bundled_router(100).await;
    let summary = walk(&router, UserId(1), &["Yes", "Yes"]);

    assert_eq!(summary.terminal.as_str(), "volunteer");
    assert_eq!(summary.handoff, Some(Handoff::NewMembers));
    assert_eq!(summary.category, None);
    assert!(
        summary
            .closing
            .as_deref()
            .is_some_and(|text| text.contains("what you would like to help with"))
    );
    assert_eq!(
        router.categories().handoff(Handoff::NewMembers).room,
        "new_members"
    );
    assert!(!router.is_user_waiting(UserId(1)));
}

#[test]
fn waiting_user_claiming_stays_only_queued() {
    let router = small_router(100);
    router
        .request_help(UserId(1), UserProfile::default(), RequestCategory::Medical)
        .unwrap();
    let other = router
        .request_help(UserId(2), UserProfile::default(), RequestCategory::Medical)
        .unwrap();

    assert_eq!(
        router.claim(UserRef::new(1), &other),
        Err(AssignError::WorkerWaiting {
            worker_id: UserId(1)
        })
    );
    assert!(router.is_user_waiting(UserId(1)));
    assert!(!router.has_active_conversation(UserId(1)));

    let own = DeepLinkToken::new(RequestCategory::Medical, UserId(1));
    router.claim(UserRef::new(9), &own).unwrap();
    assert_eq!(router.case_status(UserId(1)), CaseStatus::Assigned);
    assert_eq!(
        router
            .sweep_stale(chrono::Duration::zero())
            .iter()
            .map(|r| r.user.id)
            .collect::<Vec<_>>(),
        vec![UserId(2)]
    );
}

#[tokio::test]
async fn german_session_uses_german_labels() {
    let router = bundled_router(100).await;
    let IntakeOutcome::FirstQuestion(question) = router.start_intake(UserId(1), Some("de")) else {
        panic!("intake rejected");
    };
    assert_eq!(question.options, vec!["Ja", "Nein"]);

    router.submit_triage_answer(UserId(1), "Nein");
    router.submit_triage_answer(UserId(1), "Ja");
    let Some(WalkerOutcome::NextQuestion(q)) = router.submit_triage_answer(UserId(1), "Husten")
    else {
        panic!("expected the multichoice question again");
    };
    assert_eq!(q.options, vec!["Fieber", "Atemnot", "Kopfschmerzen", "Fertig"]);
    assert!(matches!(
        router.submit_triage_answer(UserId(1), "Fertig"),
        Some(WalkerOutcome::Completed(_))
    ));
}

#[test]
fn concurrent_duplicate_requests_create_one_record() {
    let router = small_router(100);
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                scope.spawn(|| {
                    router.request_help(
                        UserId(7),
                        UserProfile::default(),
                        RequestCategory::Medical,
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(AdmissionError::AlreadyWaiting(_))
    )));
    assert_eq!(router.pending_requests().len(), 1);
}

#[test]
fn concurrent_claims_assign_once() {
    let router = small_router(100);
    let token = router
        .request_help(UserId(1), UserProfile::default(), RequestCategory::Medical)
        .unwrap();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (100..116)
            .map(|worker| {
                let router = &router;
                scope.spawn(move || router.claim(UserRef::new(worker), &token))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(AssignError::NoSuchRequest { .. })
    )));
    assert_eq!(router.active_pairings().len(), 1);
    assert_eq!(router.case_status(UserId(1)), CaseStatus::Assigned);
}

#[test]
fn capacity_blocks_claims_and_intake() {
    let router = small_router(3);
    for user in 1..=4 {
        router
            .request_help(UserId(user), UserProfile::default(), RequestCategory::Social)
            .unwrap();
    }

    for user in 1..=3 {
        assert!(!router.capacity_reached());
        let token = DeepLinkToken::new(RequestCategory::Social, UserId(user));
        router.claim(UserRef::new(100 + user), &token).unwrap();
    }
    assert!(router.capacity_reached());

    let token = DeepLinkToken::new(RequestCategory::Social, UserId(4));
    assert_eq!(
        router.claim(UserRef::new(200), &token),
        Err(AssignError::WorkerBusy {
            worker_id: UserId(200)
        })
    );
    assert_eq!(
        router.start_intake(UserId(5), None),
        IntakeOutcome::Rejected(AdmissionError::CapacityReached { limit: 3 })
    );
    assert!(router.is_user_waiting(UserId(4)));
}

#[test]
fn self_claim_never_succeeds() {
    let router = small_router(100);
    let token = router
        .request_help(UserId(1), UserProfile::default(), RequestCategory::Medical)
        .unwrap();

    assert_eq!(
        router.claim(UserRef::new(1), &token),
        Err(AssignError::SelfAssignment { user_id: UserId(1) })
    );
    assert_eq!(router.case_status(UserId(1)), CaseStatus::Waiting);
}

#[test]
fn claimed_conversation_relays_both_ways_until_ended() {
    let router = small_router(100);
    let token = router
        .request_help(UserId(1), UserProfile::default(), RequestCategory::Medical)
        .unwrap();
    let token = DeepLinkToken::parse(&token.encode(router.categories()), router.categories())
        .unwrap();
    router.claim(UserRef::new(2), &token).unwrap();

    assert!(router.has_active_conversation(UserId(1)));
    assert_eq!(
        router.relay(UserId(1), "hi").map(|m| m.text),
        Some("👤: hi".to_string())
    );
    assert_eq!(router.end(UserId(2)), Some(UserId(1)));
    assert_eq!(router.end(UserId(2)), None);
    assert_eq!(router.relay(UserId(1), "hello?"), None);
    assert_eq!(router.case_status(UserId(1)), CaseStatus::Closed);
}
