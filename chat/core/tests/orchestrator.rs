//! Streaming orchestrator behaviour against a scripted backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;

use common::{model, ScriptedBackend};
use streamchat_core::{
    CancellationSignal, ChatError, OpenAiBackend, ResponseStream, StreamPhase,
    StreamingChatOrchestrator, ThinkingMarkerRegistry, ThinkingMarkerSpec, Transcript, Turn,
};

fn orchestrator_for(
    backend: &ScriptedBackend,
    markers: ThinkingMarkerRegistry,
) -> StreamingChatOrchestrator {
    StreamingChatOrchestrator::new(markers).with_backend(Arc::new(backend.clone()))
}

fn history() -> Transcript {
    Transcript::from(vec![Turn::user("Hello?")])
}

async fn collect(stream: &mut ResponseStream) -> Vec<String> {
    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment);
    }
    fragments
}

#[tokio::test]
async fn test_thinking_region_rewritten_across_chunks() {
    let backend = ScriptedBackend::new(["Hello <think", ">thinking... </thi", "nk> world"]);
    let markers = ThinkingMarkerRegistry::from_entries([(
        "deepseek-r1".to_string(),
        ThinkingMarkerSpec::think_tags().with_replacements("🤔 [...] ", "💡"),
    )]);
    let orchestrator = orchestrator_for(&backend, markers);

    let mut stream = orchestrator.respond(
        &history(),
        Some(model("deepseek-r1:1.5b")),
        CancellationSignal::new(),
    );
    let text = collect(&mut stream).await.concat();

    assert_eq!(text, "Hello 🤔 [...] thinking... 💡 world");
    assert_eq!(stream.phase(), StreamPhase::Completed);
}

#[tokio::test]
async fn test_unknown_model_passes_through() {
    let chunks = ["<think>", "raw", "</think>", " text"];
    let backend = ScriptedBackend::new(chunks);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::builtin());

    let mut stream =
        orchestrator.respond(&history(), Some(model("llama3:8b")), CancellationSignal::new());
    let fragments = collect(&mut stream).await;

    assert_eq!(fragments, chunks.map(String::from).to_vec());
}

#[tokio::test]
async fn test_request_carries_history_and_model() {
    let backend = ScriptedBackend::new(["ok"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let transcript = Transcript::from(vec![
        Turn::system("Be brief"),
        Turn::user("Hi"),
        Turn::assistant("Hello"),
        Turn::user("Again"),
    ]);

    let mut stream =
        orchestrator.respond(&transcript, Some(model("gemma3:1b")), CancellationSignal::new());
    collect(&mut stream).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, transcript);
    assert_eq!(requests[0].1.name, "gemma3:1b");
}

#[tokio::test]
async fn test_nothing_requested_until_polled() {
    let backend = ScriptedBackend::new(["ok"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());

    let stream = orchestrator.respond(&history(), Some(model("gemma3:1b")), CancellationSignal::new());
    assert_eq!(backend.pulled(), 0);
    drop(stream);
    assert_eq!(backend.pulled(), 0);
}

#[tokio::test]
async fn test_cancel_after_two_of_five_fragments() {
    let backend = ScriptedBackend::new(["one ", "two ", "three ", "four ", "five"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let cancel = CancellationSignal::new();

    let mut stream = orchestrator.respond(&history(), Some(model("gemma3:1b")), cancel.clone());
    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment);
        if fragments.len() == 2 {
            cancel.cancel();
        }
    }

    assert_eq!(fragments.concat(), "one two \n\n[Response was stopped early]");
    assert_eq!(backend.pulled(), 2);
    assert_eq!(stream.phase(), StreamPhase::Cancelled);
}

#[tokio::test]
async fn test_cancel_flushes_held_delimiter_prefix_first() {
    let backend = ScriptedBackend::new(["Hi <thi", "nk>never seen"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::builtin());
    let cancel = CancellationSignal::new();

    let mut stream = orchestrator.respond(&history(), Some(model("qwen3:4b")), cancel.clone());
    let first = stream.next().await.unwrap();
    assert_eq!(first, "Hi ");
    cancel.cancel();

    let rest = collect(&mut stream).await;
    assert_eq!(
        rest,
        vec![
            "<thi".to_string(),
            "\n\n[Response was stopped early]".to_string()
        ]
    );
}

#[tokio::test]
async fn test_cancel_while_waiting_on_backend() {
    let backend = ScriptedBackend::new(["partial"]).then_hang();
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let cancel = CancellationSignal::new();

    let mut stream = orchestrator.respond(&history(), Some(model("gemma3:1b")), cancel.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let fragments = tokio::time::timeout(Duration::from_secs(5), collect(&mut stream))
        .await
        .expect("cancellation should end a stalled stream");
    canceller.await.unwrap();

    assert_eq!(
        fragments,
        vec![
            "partial".to_string(),
            "\n\n[Response was stopped early]".to_string()
        ]
    );
    assert_eq!(stream.phase(), StreamPhase::Cancelled);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let backend = ScriptedBackend::new(["never"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let cancel = CancellationSignal::new();
    cancel.cancel();

    let mut stream = orchestrator.respond(&history(), Some(model("gemma3:1b")), cancel);
    let fragments = collect(&mut stream).await;

    assert_eq!(fragments, vec!["\n\n[Response was stopped early]".to_string()]);
    assert_eq!(backend.pulled(), 0);
}

#[tokio::test]
async fn test_connectivity_error_is_sole_fragment() {
    let backend = ScriptedBackend::failing(ChatError::Connectivity {
        backend: "Ollama".to_string(),
        endpoint: "http://localhost:11434/api/chat".to_string(),
    });
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::builtin());

    let mut stream =
        orchestrator.respond(&history(), Some(model("gemma3:1b")), CancellationSignal::new());
    let fragments = collect(&mut stream).await;

    assert_eq!(
        fragments,
        vec![
            "Error: Could not connect to Ollama at http://localhost:11434/api/chat. Is it running?"
                .to_string()
        ]
    );
    assert_eq!(stream.phase(), StreamPhase::Failed);
}

#[tokio::test]
async fn test_framing_error_keeps_earlier_content() {
    let backend = ScriptedBackend::with_results(vec![
        Ok("The answer".to_string()),
        Ok(" is".to_string()),
        Err(ChatError::Framing {
            backend: "Ollama".to_string(),
            detail: "expected value at line 1 column 1".to_string(),
        }),
        Ok(" unreachable".to_string()),
    ]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());

    let mut stream =
        orchestrator.respond(&history(), Some(model("gemma3:1b")), CancellationSignal::new());
    let fragments = collect(&mut stream).await;

    assert_eq!(
        fragments.concat(),
        "The answer is\n\nError: Unexpected response format from Ollama."
    );
    assert_eq!(stream.phase(), StreamPhase::Failed);
}

#[tokio::test]
async fn test_unexpected_failure_rendering() {
    let transport = ChatError::Transport {
        backend: "Ollama".to_string(),
        detail: "connection reset by peer".to_string(),
    };

    let backend = ScriptedBackend::failing(transport.clone());
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let mut stream =
        orchestrator.respond(&history(), Some(model("gemma3:1b")), CancellationSignal::new());
    assert_eq!(
        collect(&mut stream).await,
        vec!["An error occurred: Ollama stream failed: connection reset by peer".to_string()]
    );

    let backend = ScriptedBackend::with_results(vec![Ok("Partial".to_string()), Err(transport)]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::empty());
    let mut stream =
        orchestrator.respond(&history(), Some(model("gemma3:1b")), CancellationSignal::new());
    assert_eq!(
        collect(&mut stream).await.concat(),
        "Partial\n\n[Error: Ollama stream failed: connection reset by peer]"
    );
}

#[tokio::test]
async fn test_unterminated_region_flushed_at_end() {
    let backend = ScriptedBackend::new(["<think>still going", " and </thi"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::builtin());

    let mut stream =
        orchestrator.respond(&history(), Some(model("deepseek-r1:7b")), CancellationSignal::new());
    let text = collect(&mut stream).await.concat();

    assert_eq!(text, "🤔 [Thinking...] still going and </thi");
    assert_eq!(stream.phase(), StreamPhase::Completed);
}

#[tokio::test]
async fn test_missing_api_key_fails_before_request() {
    let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::empty())
        .with_backend(Arc::new(OpenAiBackend::new("http://127.0.0.1:9", None)));
    let model = streamchat_core::ModelDescriptor::new("gpt-4o", streamchat_core::BackendKind::OpenAi);

    let mut stream = orchestrator.respond(&history(), Some(model), CancellationSignal::new());
    let fragments = collect(&mut stream).await;

    assert_eq!(fragments, vec!["Error: OPENAI_API_KEY is not set".to_string()]);
    assert_eq!(stream.phase(), StreamPhase::Failed);
}

#[tokio::test]
async fn test_concurrent_turns_are_independent() {
    let backend = ScriptedBackend::new(["<think>a</think>", "b"]);
    let orchestrator = orchestrator_for(&backend, ThinkingMarkerRegistry::builtin());

    let cancelled = CancellationSignal::new();
    cancelled.cancel();

    let mut first =
        orchestrator.respond(&history(), Some(model("qwq:32b")), CancellationSignal::new());
    let mut second = orchestrator.respond(&history(), Some(model("qwq:32b")), cancelled);

    let (a, b) = tokio::join!(collect(&mut first), collect(&mut second));

    assert_eq!(
        a.concat(),
        "🤔 [Thinking...] a [...done thinking] 💡 b"
    );
    assert_eq!(b.concat(), "\n\n[Response was stopped early]");
}
