//! One chat turn end to end: stream, accumulate, persist

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{model, refused_url, ScriptedBackend};
use streamchat_core::{
    CancellationSignal, Conversation, ModelCatalog, OllamaBackend, Role, SessionStore,
    StreamPhase, StreamingChatOrchestrator, ThinkingMarkerRegistry, Transcript, Turn,
};

fn temp_store() -> (tempfile::TempDir, SessionStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    (dir, store)
}

#[tokio::test]
async fn test_exchange_streams_and_saves() {
    let (_dir, store) = temp_store();
    let backend = ScriptedBackend::new(["Paris", " is the capital."]);
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(backend.clone()));

    let mut conversation = Conversation::new();
    let mut seen = Vec::new();
    let outcome = conversation
        .exchange(
            &orchestrator,
            Some(model("gemma3:1b")),
            &store,
            "  What is the capital of France?  ",
            CancellationSignal::new(),
            |fragment| seen.push(fragment.to_string()),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.phase, StreamPhase::Completed);
    assert_eq!(outcome.content, "Paris is the capital.");
    assert_eq!(seen, vec!["Paris".to_string(), " is the capital.".to_string()]);

    // The request carries the history without the placeholder turn
    let requests = backend.requests();
    assert_eq!(
        requests[0].0,
        Transcript::from(vec![Turn::user("What is the capital of France?")])
    );

    let expected = Transcript::from(vec![
        Turn::user("What is the capital of France?"),
        Turn::assistant("Paris is the capital."),
    ]);
    assert_eq!(conversation.transcript(), &expected);
    assert_eq!(store.load(conversation.id()).await, expected);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let (_dir, store) = temp_store();
    let backend = ScriptedBackend::new(["unused"]);
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(backend.clone()));

    let mut conversation = Conversation::new();
    let outcome = conversation
        .exchange(
            &orchestrator,
            Some(model("gemma3:1b")),
            &store,
            "   \n",
            CancellationSignal::new(),
            |_| {},
        )
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(conversation.transcript().is_empty());
    assert!(backend.requests().is_empty());
    assert!(!store.exists(conversation.id()).await);
}

#[tokio::test]
async fn test_connection_refused_is_saved_as_reply() {
    let (_dir, store) = temp_store();
    let url = refused_url();
    let backend = Arc::new(OllamaBackend::new(url.clone()));
    let catalog = ModelCatalog::discover(backend.as_ref(), Some("gemma3:1b")).await;
    let orchestrator =
        StreamingChatOrchestrator::new(ThinkingMarkerRegistry::builtin()).with_backend(backend);

    let mut conversation = Conversation::new();
    let mut fragments = Vec::new();
    let outcome = conversation
        .exchange(
            &orchestrator,
            catalog.current(),
            &store,
            "Hello?",
            CancellationSignal::new(),
            |fragment| fragments.push(fragment.to_string()),
        )
        .await
        .unwrap()
        .unwrap();

    let expected = format!("Error: Could not connect to Ollama at {url}/api/chat. Is it running?");
    assert_eq!(fragments, vec![expected.clone()]);
    assert_eq!(outcome.phase, StreamPhase::Failed);

    let saved = store.load(conversation.id()).await;
    assert_eq!(saved.len(), 2);
    assert_eq!(saved.last().unwrap().role, Role::Assistant);
    assert_eq!(saved.last().unwrap().content, expected);
}

#[tokio::test]
async fn test_cancelled_turn_keeps_partial_reply() {
    let (_dir, store) = temp_store();
    let backend = ScriptedBackend::new(["Once", " upon", " a", " time"]);
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(backend));

    let cancel = CancellationSignal::new();
    let trigger = cancel.clone();
    let mut count = 0;
    let mut conversation = Conversation::new();
    let outcome = conversation
        .exchange(
            &orchestrator,
            Some(model("gemma3:1b")),
            &store,
            "Tell me a story",
            cancel,
            |_| {
                count += 1;
                if count == 2 {
                    trigger.cancel();
                }
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.phase, StreamPhase::Cancelled);
    assert_eq!(outcome.content, "Once upon\n\n[Response was stopped early]");
    assert_eq!(
        store.load(conversation.id()).await.last().unwrap().content,
        outcome.content
    );
}

#[tokio::test]
async fn test_resume_continues_history() {
    let (_dir, store) = temp_store();
    let backend = ScriptedBackend::new(["Sure."]);
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(backend.clone()));

    let mut first = Conversation::new();
    first
        .exchange(
            &orchestrator,
            Some(model("gemma3:1b")),
            &store,
            "Remember the number 7",
            CancellationSignal::new(),
            |_| {},
        )
        .await
        .unwrap();

    let mut resumed = Conversation::resume(&store, first.id().clone()).await;
    assert_eq!(resumed.transcript(), first.transcript());

    resumed
        .exchange(
            &orchestrator,
            Some(model("gemma3:1b")),
            &store,
            "What was it?",
            CancellationSignal::new(),
            |_| {},
        )
        .await
        .unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].0,
        Transcript::from(vec![
            Turn::user("Remember the number 7"),
            Turn::assistant("Sure."),
            Turn::user("What was it?"),
        ])
    );
    assert_eq!(store.load(resumed.id()).await.len(), 4);
}

#[tokio::test]
async fn test_model_switch_applies_to_next_turn() {
    let (_dir, store) = temp_store();
    let backend = ScriptedBackend::new(["ok"]).with_models(&["gemma3:1b", "qwen3:4b"]);
    let catalog = ModelCatalog::discover(&backend, Some("gemma3:1b")).await;
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(backend.clone()));
    let mut conversation = Conversation::new();

    for text in ["one", "two"] {
        conversation
            .exchange(
                &orchestrator,
                catalog.current(),
                &store,
                text,
                CancellationSignal::new(),
                |_| {},
            )
            .await
            .unwrap();
        catalog.select("qwen3:4b").unwrap();
    }

    let models: Vec<String> = backend.requests().into_iter().map(|(_, m)| m.name).collect();
    assert_eq!(models, vec!["gemma3:1b".to_string(), "qwen3:4b".to_string()]);
}
