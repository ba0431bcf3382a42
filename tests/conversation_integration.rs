//! Conversational analysis: follow-up questions, memory and ownership.

mod common;

use common::{orchestrator, request, StubAgent};
use diagnose::config::Provider;
use diagnose::orchestrator::OrchestratorError;
use diagnose::types::ConverseOutcome;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_vague_pro_message_gets_follow_up_then_answer() {
    let anthropic = StubAgent::answering(Provider::Anthropic);
    let orch = orchestrator(&[anthropic.clone()]);

    let first = orch
        .converse(&request(&orch, "u1", "pro", "my laptop won't connect"), "c-1")
        .await
        .unwrap();
    let ConverseOutcome::FollowUp(follow_up) = first else {
        panic!("expected follow-up questions, got {:?}", first);
    };
    assert_eq!(follow_up.conversation_id, "c-1");
    assert!(!follow_up.questions.is_empty());
    assert_eq!(
        follow_up.known_context.get("device_type").map(String::as_str),
        Some("laptop")
    );
    assert_eq!(anthropic.calls(), 0);

    let second = orch
        .converse(&request(&orch, "u1", "pro", "It is a Dell XPS on Windows 11"), "c-1")
        .await
        .unwrap();
    let ConverseOutcome::Answer(answer) = second else {
        panic!("expected an answer, got {:?}", second);
    };
    assert_eq!(answer.provider, "anthropic");
    assert_eq!(anthropic.calls(), 1);
}

#[tokio::test]
async fn test_follow_up_rounds_are_bounded() {
    let anthropic = StubAgent::answering(Provider::Anthropic);
    let orch = orchestrator(&[anthropic.clone()]);

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let outcome = orch
            .converse(&request(&orch, "u1", "pro", "the internet is not working"), "c-2")
            .await
            .unwrap();
        kinds.push(matches!(outcome, ConverseOutcome::FollowUp(_)));
    }
    assert_eq!(kinds, vec![true, true, false]);
    assert_eq!(anthropic.calls(), 1);
}

#[tokio::test]
async fn test_free_tier_converse_has_no_memory_or_questions() {
    let google = StubAgent::answering(Provider::Google);
    let orch = orchestrator(&[google.clone()]);

    let outcome = orch
        .converse(&request(&orch, "u1", "free", "my laptop won't connect"), "c-3")
        .await
        .unwrap();
    assert!(matches!(outcome, ConverseOutcome::Answer(_)));
    assert_eq!(google.calls(), 1);
    assert!(orch.conversations().is_empty());
}

#[tokio::test]
async fn test_conversation_of_another_caller_is_forbidden() {
    let anthropic = StubAgent::answering(Provider::Anthropic);
    let orch = orchestrator(&[anthropic.clone()]);

    orch.converse(&request(&orch, "owner", "pro", "what is a subnet mask"), "c-4")
        .await
        .unwrap();

    let err = orch
        .converse(&request(&orch, "intruder", "pro", "what is a subnet mask"), "c-4")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Forbidden { ref conversation_id } if conversation_id == "c-4"));
    assert_eq!(anthropic.calls(), 1);
    // The rejected request released its permit
    assert_eq!(orch.limiter().in_flight("intruder"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_expires_idle_conversations() {
    let anthropic = StubAgent::answering(Provider::Anthropic);
    let orch = orchestrator(&[anthropic]);

    orch.converse(&request(&orch, "u1", "pro", "explain what DNS does"), "c-5")
        .await
        .unwrap();
    assert_eq!(orch.conversations().len(), 1);

    let cancel = CancellationToken::new();
    let handle = orch.spawn_maintenance(cancel.clone());

    // Default retention is one hour, swept every minute
    tokio::time::sleep(std::time::Duration::from_secs(3600 + 120)).await;
    assert!(orch.conversations().is_empty());

    cancel.cancel();
    handle.await.unwrap();
}
