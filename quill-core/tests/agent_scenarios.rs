//! End-to-end turns against a scripted provider: no network, real loop,
//! real tools, real session store.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use quill_core::agent::{Agent, AgentEvent, TurnOutcome};
use quill_core::config::AgentConfig;
use quill_core::config::ApprovalMode;
use quill_core::llm::content::{Content, FunctionCall, Part, Role};
use quill_core::llm::provider::LLMProvider;
use quill_core::llm::request::LLMRequest;
use quill_core::llm::response::{FinishReason, LLMResponse, LLMStream};
use quill_core::llm::LLMError;
use quill_core::session::{EventAuthor, InMemorySessionStore, SessionStore};
use quill_core::tools::builtin_registry;

/// Pops one pre-scripted response per model invocation. Streams the text of
/// each response as a single partial chunk first, like a real backend.
struct ScriptedProvider {
    responses: Mutex<Vec<LLMResponse>>,
}

impl ScriptedProvider {
    fn new(mut responses: Vec<LLMResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
        }
    }

    fn text(text: &str) -> LLMResponse {
        LLMResponse::completed(Content::model_text(text), FinishReason::Stop)
    }

    fn call(name: &str, id: &str, args: serde_json::Value) -> LLMResponse {
        LLMResponse::completed(
            Content::new(
                Role::Model,
                vec![Part::FunctionCall {
                    call: FunctionCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        args,
                    },
                }],
            ),
            FinishReason::Stop,
        )
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _request: LLMRequest,
        _cancel: CancellationToken,
    ) -> Result<LLMResponse, LLMError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| LLMError::Provider("script exhausted".to_string()))
    }

    async fn stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream, LLMError> {
        let response = self.generate(request, cancel).await?;
        let stream = try_stream! {
            let text = response.content.joined_text();
            if !text.is_empty() {
                yield LLMResponse::partial_text(text);
            }
            yield response;
        };
        Ok(Box::pin(stream))
    }

    fn supported_models(&self) -> Vec<String> {
        vec!["scripted-1".to_string()]
    }
}

/// Streams forever until cancelled.
struct HangingProvider;

#[async_trait]
impl LLMProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(
        &self,
        _request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, LLMError> {
        cancel.cancelled().await;
        Err(LLMError::Cancelled)
    }

    async fn stream(
        &self,
        _request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream, LLMError> {
        let stream = try_stream! {
            yield LLMResponse::partial_text("starting");
            cancel.cancelled().await;
            Err::<(), _>(LLMError::Cancelled)?;
            // Unreachable; the error above ends the stream.
            yield LLMResponse::partial_text("");
        };
        Ok(Box::pin(stream))
    }

    fn supported_models(&self) -> Vec<String> {
        vec!["hanging-1".to_string()]
    }
}

async fn agent_with(
    provider: Box<dyn LLMProvider>,
    workspace: &std::path::Path,
) -> (Agent, Arc<quill_core::session::Session>) {
    let store = InMemorySessionStore::new();
    let session = store.create("tester", "scenario").await.unwrap();
    let agent = Agent::new(
        provider,
        "scripted-1",
        Arc::new(builtin_registry()),
        session.clone(),
        workspace.to_path_buf(),
    )
    .with_config(AgentConfig {
        approval: ApprovalMode::Never,
        ..AgentConfig::default()
    });
    (agent, session)
}

#[tokio::test]
async fn simple_qa_without_tools() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = ScriptedProvider::new(vec![ScriptedProvider::text("4")]);
    let (agent, session) = agent_with(Box::new(provider), tmp.path()).await;

    let outcome = agent
        .run_turn("What is 2+2?", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            text: "4".to_string()
        }
    );

    let events = session.events_raw().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].author, EventAuthor::User);
    assert_eq!(events[1].author, EventAuthor::Model);
    assert_eq!(events[1].content.joined_text(), "4");
    assert!(!events[1].content.has_function_calls());
    // Both events belong to the same invocation.
    assert_eq!(events[0].invocation_id, events[1].invocation_id);
}

#[tokio::test]
async fn single_read_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("hello.txt"), "hi\n").unwrap();

    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::call("read_file", "call_1", json!({"path": "hello.txt"})),
        ScriptedProvider::text("The file says: hi"),
    ]);
    let (agent, session) = agent_with(Box::new(provider), tmp.path()).await;

    let outcome = agent
        .run_turn("Show me hello.txt", CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let events = session.events_raw().await;
    // user, model(call), tool responses, model(text).
    assert_eq!(events.len(), 4);

    let call_event = &events[1];
    let calls: Vec<_> = call_event.content.function_calls().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "read_file");
    assert_eq!(calls[0].args["path"], "hello.txt");

    let response_event = &events[2];
    assert_eq!(response_event.content.role, Role::User);
    let response = response_event.content.parts[0]
        .as_function_response()
        .unwrap();
    assert_eq!(response.id, "call_1");
    assert_eq!(response.response["content"], "hi\n");
    assert_eq!(response.response["total_lines"], 2);

    assert_eq!(events[3].content.joined_text(), "The file says: hi");
}

#[tokio::test]
async fn write_size_guard_then_retry() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("big.go"), "x".repeat(5000)).unwrap();

    let small = "y".repeat(300);
    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::call(
            "write_file",
            "call_1",
            json!({"path": "big.go", "content": small, "allow_size_reduce": false}),
        ),
        ScriptedProvider::call(
            "write_file",
            "call_2",
            json!({"path": "big.go", "content": "y".repeat(300), "allow_size_reduce": true}),
        ),
        ScriptedProvider::text("done"),
    ]);
    let (agent, session) = agent_with(Box::new(provider), tmp.path()).await;

    agent
        .run_turn("shrink big.go", CancellationToken::new())
        .await
        .unwrap();

    let events = session.events_raw().await;
    let first_response = events[2].content.parts[0].as_function_response().unwrap();
    assert_eq!(first_response.response["error"], "SizeReductionRefused");
    let message = first_response.response["message"].as_str().unwrap();
    assert!(message.contains("5000"));
    assert!(message.contains("300"));
    assert!(message.contains("94.0%"));

    let second_response = events[4].content.parts[0].as_function_response().unwrap();
    assert_eq!(second_response.response["success"], true);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("big.go")).unwrap().len(),
        300
    );
}

#[tokio::test]
async fn unknown_tool_synthesises_error_response() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::call("imaginary_tool", "call_1", json!({})),
        ScriptedProvider::text("understood"),
    ]);
    let (agent, session) = agent_with(Box::new(provider), tmp.path()).await;

    let outcome = agent
        .run_turn("use the imaginary tool", CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let events = session.events_raw().await;
    let response = events[2].content.parts[0].as_function_response().unwrap();
    assert!(
        response.response["message"]
            .as_str()
            .unwrap()
            .contains("tool not found")
    );
}

#[tokio::test]
async fn max_steps_terminates_runaway_turn() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("f.txt"), "x\n").unwrap();

    // 51 consecutive tool-call responses; the 51st is never executed.
    let mut responses: Vec<LLMResponse> = (0..51)
        .map(|i| {
            ScriptedProvider::call(
                "read_file",
                &format!("call_{i}"),
                json!({"path": "f.txt"}),
            )
        })
        .collect();
    responses.push(ScriptedProvider::text("never reached"));

    let provider = ScriptedProvider::new(responses);
    let (agent, _session) = agent_with(Box::new(provider), tmp.path()).await;

    let outcome = agent
        .run_turn("loop forever", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::MaxStepsReached);
}

#[tokio::test]
async fn rejection_surfaces_user_rejected_payload() {
    struct RejectAll;

    #[async_trait]
    impl quill_core::agent::ApprovalHandler for RejectAll {
        async fn confirm(&self, _request: &quill_core::agent::ApprovalRequest) -> bool {
            false
        }
    }

    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("f.txt"), "keep me\n").unwrap();

    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::call(
            "write_file",
            "call_1",
            json!({"path": "f.txt", "content": "overwritten"}),
        ),
        ScriptedProvider::text("ok, leaving it alone"),
    ]);

    let store = InMemorySessionStore::new();
    let session = store.create("tester", "approval").await.unwrap();
    let agent = Agent::new(
        Box::new(provider),
        "scripted-1",
        Arc::new(builtin_registry()),
        session.clone(),
        tmp.path().to_path_buf(),
    )
    .with_config(AgentConfig {
        approval: ApprovalMode::Untrusted,
        ..AgentConfig::default()
    })
    .with_approval_handler(Arc::new(RejectAll));

    let outcome = agent
        .run_turn("overwrite f.txt", CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let events = session.events_raw().await;
    let response = events[2].content.parts[0].as_function_response().unwrap();
    assert_eq!(response.response["error"], "user rejected");
    // The file was never touched.
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("f.txt")).unwrap(),
        "keep me\n"
    );
}

#[tokio::test]
async fn cancellation_mid_stream_ends_turn_cleanly() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (agent, session) = agent_with(Box::new(HangingProvider), tmp.path()).await;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = agent.run_turn("never finishes", cancel).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));

    // Only the user event landed; no partial model event, no tool calls.
    let events = session.events_raw().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].author, EventAuthor::User);
}

#[tokio::test]
async fn streamed_text_reaches_the_sink() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = ScriptedProvider::new(vec![ScriptedProvider::text("streamed answer")]);
    let store = InMemorySessionStore::new();
    let session = store.create("tester", "sink").await.unwrap();

    let deltas: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_deltas = deltas.clone();
    let agent = Agent::new(
        Box::new(provider),
        "scripted-1",
        Arc::new(builtin_registry()),
        session,
        tmp.path().to_path_buf(),
    )
    .with_event_sink(Arc::new(move |event: &AgentEvent| {
        if let AgentEvent::Message { delta, .. } = event {
            sink_deltas.lock().unwrap().push(delta.clone());
        }
    }));

    agent
        .run_turn("say something", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(deltas.lock().unwrap().join(""), "streamed answer");
}
