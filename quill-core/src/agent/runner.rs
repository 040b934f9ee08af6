//! The agent loop: request building, streaming, tool dispatch, iteration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::compaction::{CompactionConfig, Summarizer, should_compact};
use crate::config::constants::defaults;
use crate::config::{AgentConfig, ApprovalMode};
use crate::llm::content::{Content, FunctionCall, FunctionResponse};
use crate::llm::provider::LLMProvider;
use crate::llm::request::LLMRequest;
use crate::llm::response::LLMResponse;
use crate::llm::LLMError;
use crate::session::{Event, EventAuthor, Session};
use crate::telemetry::{TokenTracker, UsageSemantics};
use crate::tools::{ToolCategory, ToolContext, ToolError, ToolRegistry};

use super::approval::{ApprovalHandler, ApprovalRequest, AutoApprove, requires_confirmation};
use super::checkpoint::CheckpointStore;
use super::events::{AgentEvent, EventSink};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model finished without further tool calls.
    Completed { text: String },
    /// The hard tool-round cap was reached.
    MaxStepsReached,
    /// The ambient context was cancelled.
    Cancelled,
}

/// The orchestrator tying session, adapter, registry, and compaction
/// together. One `Agent` serves one session.
pub struct Agent {
    provider: Box<dyn LLMProvider>,
    model: String,
    registry: Arc<ToolRegistry>,
    session: Arc<Session>,
    config: AgentConfig,
    workspace_root: std::path::PathBuf,
    system_instruction: Option<String>,
    approval: Arc<dyn ApprovalHandler>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    tracker: Arc<TokenTracker>,
    compaction: CompactionConfig,
    sink: Option<EventSink>,
}

impl Agent {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        model: impl Into<String>,
        registry: Arc<ToolRegistry>,
        session: Arc<Session>,
        workspace_root: std::path::PathBuf,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            registry,
            session,
            config: AgentConfig::default(),
            workspace_root,
            system_instruction: None,
            approval: Arc::new(AutoApprove),
            checkpoints: None,
            tracker: Arc::new(TokenTracker::new()),
            compaction: CompactionConfig::default(),
            sink: None,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_approval_handler(mut self, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = handler;
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_token_tracker(mut self, tracker: Arc<TokenTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_compaction_config(mut self, config: CompactionConfig) -> Self {
        self.compaction = config;
        self
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn tracker(&self) -> &Arc<TokenTracker> {
        &self.tracker
    }

    fn session_key(&self) -> String {
        format!("{}/{}", self.session.user_id(), self.session.name())
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }

    /// Run one user turn to completion: stream the model, dispatch tool
    /// calls in order, iterate until the model stops calling tools or a
    /// terminal condition fires.
    pub async fn run_turn(
        &self,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let invocation_id = Uuid::new_v4().to_string();

        self.session
            .append_event(Event::new(
                invocation_id.clone(),
                EventAuthor::User,
                Content::user_text(user_text),
            ))
            .await;

        let mut rounds = 0usize;
        let outcome = loop {
            let response = match self.invoke_model(cancel.clone()).await {
                Ok(response) => response,
                Err(LLMError::Cancelled) => break TurnOutcome::Cancelled,
                Err(err) => {
                    self.emit(AgentEvent::Error {
                        session_id: self.session_key(),
                        timestamp: Utc::now(),
                        message: err.to_string(),
                    });
                    return Err(err).context("model request failed");
                }
            };

            if let Some(usage) = &response.usage {
                // Both built-in backends report per-request counts; a
                // cumulative backend would pass Cumulative here.
                self.tracker
                    .record(&self.session_key(), usage, UsageSemantics::PerRequest);
            }

            let calls: Vec<FunctionCall> =
                response.content.function_calls().cloned().collect();

            let mut model_event = Event::new(
                invocation_id.clone(),
                EventAuthor::Model,
                response.content.clone(),
            );
            if let Some(usage) = response.usage {
                model_event = model_event.with_usage(usage);
            }
            self.session.append_event(model_event).await;

            if calls.is_empty() {
                break TurnOutcome::Completed {
                    text: response.content.joined_text(),
                };
            }

            if rounds >= self.config.max_tool_rounds {
                warn!(
                    target: "quill::agent",
                    rounds,
                    "maximum tool-call rounds reached; terminating turn"
                );
                break TurnOutcome::MaxStepsReached;
            }
            rounds += 1;

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                if cancel.is_cancelled() {
                    break;
                }
                responses.push(self.dispatch_call(call, &cancel).await);
            }
            if cancel.is_cancelled() {
                break TurnOutcome::Cancelled;
            }

            // One user-role event carries every response, preserving call order.
            self.session
                .append_event(Event::new(
                    invocation_id.clone(),
                    EventAuthor::Tool,
                    Content::function_responses(responses),
                ))
                .await;
        };

        self.maybe_compact(cancel).await;

        self.emit(AgentEvent::Result {
            session_id: self.session_key(),
            timestamp: Utc::now(),
            outcome: match &outcome {
                TurnOutcome::Completed { .. } => "completed".to_string(),
                TurnOutcome::MaxStepsReached => "max_steps_reached".to_string(),
                TurnOutcome::Cancelled => "cancelled".to_string(),
            },
            usage: self.tracker.session_summary(&self.session_key()),
        });

        Ok(outcome)
    }

    /// Build the request from the filtered session view and stream it.
    /// Transport failures retry with exponential backoff; everything else is
    /// terminal for the turn.
    async fn invoke_model(&self, cancel: CancellationToken) -> Result<LLMResponse, LLMError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.stream_once(cancel.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < defaults::RETRY_MAX_ATTEMPTS => {
                    let delay = Duration::from_millis(
                        defaults::RETRY_BASE_DELAY_MS.saturating_mul(1 << (attempt - 1)),
                    )
                    .min(Duration::from_secs(defaults::RETRY_MAX_DELAY_SECS));
                    debug!(
                        target: "quill::agent",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transport error; retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn stream_once(&self, cancel: CancellationToken) -> Result<LLMResponse, LLMError> {
        let contents: Vec<Content> = self
            .session
            .events()
            .await
            .into_iter()
            .map(|event| event.content)
            .collect();

        let mut request = LLMRequest::new(self.model.clone(), contents)
            .with_tools(self.registry.declarations());
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }

        let mut stream = self.provider.stream(request, cancel.clone()).await?;

        let mut completed = None;
        while let Some(item) = stream.next().await {
            let response = item?;
            if response.partial {
                let delta = response.content.joined_text();
                if !delta.is_empty() {
                    self.emit(AgentEvent::Message {
                        session_id: self.session_key(),
                        timestamp: Utc::now(),
                        delta,
                    });
                }
            } else {
                completed = Some(response);
            }
        }

        completed.ok_or_else(|| {
            if cancel.is_cancelled() {
                LLMError::Cancelled
            } else {
                LLMError::Provider("stream ended without a final response".to_string())
            }
        })
    }

    /// Execute one tool call: approval gate, checkpoint hook, category
    /// deadline, panic boundary. Always produces a function response.
    async fn dispatch_call(
        &self,
        call: &FunctionCall,
        cancel: &CancellationToken,
    ) -> FunctionResponse {
        self.emit(AgentEvent::ToolUse {
            session_id: self.session_key(),
            timestamp: Utc::now(),
            call_id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
        });

        let payload = self.execute_call(call, cancel).await;

        self.emit(AgentEvent::ToolResult {
            session_id: self.session_key(),
            timestamp: Utc::now(),
            call_id: call.id.clone(),
            name: call.name.clone(),
            result: payload.clone(),
        });

        FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response: payload,
        }
    }

    async fn execute_call(&self, call: &FunctionCall, cancel: &CancellationToken) -> Value {
        let registered = match self.registry.get(&call.name) {
            Ok(registered) => registered,
            Err(_) => {
                return ToolError::invalid_input(format!("tool not found: {}", call.name))
                    .with_suggestion("call one of the declared tools by its exact name")
                    .to_value();
            }
        };

        let tool = registered.tool.clone();
        let category = tool.category();
        let mutating = tool.is_mutating();

        if requires_confirmation(self.config.approval, mutating, category) {
            let request = ApprovalRequest {
                tool: call.name.clone(),
                args: call.args.clone(),
            };
            if !self.approval.confirm(&request).await {
                return json!({"error": "user rejected"});
            }
        }

        if mutating {
            if let Some(store) = &self.checkpoints {
                if let Err(err) = store.checkpoint(&call.name).await {
                    warn!(target: "quill::agent", %err, "checkpoint hook failed");
                }
            }
        }

        let deadline = Duration::from_secs(category_deadline_secs(category, &call.args));
        let ctx = ToolContext::with_cancel(self.workspace_root.clone(), cancel.clone());
        let args = call.args.clone();
        let name = call.name.clone();

        // The spawn boundary converts tool panics into InternalError
        // responses instead of killing the process.
        let handle = tokio::spawn(async move { tool.execute(&ctx, args).await });

        let joined = tokio::time::timeout(deadline, handle).await;
        match joined {
            Err(_) => ToolError::timeout(&name, deadline.as_secs()).to_value(),
            Ok(Err(join_error)) => {
                warn!(target: "quill::agent", %join_error, tool = %name, "tool task failed");
                ToolError::internal(format!("tool '{name}' failed internally")).to_value()
            }
            Ok(Ok(Ok(output))) => output,
            Ok(Ok(Err(tool_error))) => tool_error.to_value(),
        }
    }

    /// Opportunistic compaction between turns.
    async fn maybe_compact(&self, cancel: CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let raw = self.session.events_raw().await;
        let running_tokens = self.tracker.session_total_tokens(&self.session_key());
        if !should_compact(&raw, running_tokens, &self.compaction) {
            return;
        }

        let summarizer = Summarizer::new(self.model.clone(), self.compaction.clone());
        match summarizer
            .compact(&self.session, self.provider.as_ref(), cancel)
            .await
        {
            Ok(Some(event)) => {
                debug!(
                    target: "quill::agent",
                    event_id = %event.id,
                    "appended compaction summary"
                );
            }
            Ok(None) => {}
            Err(err) => {
                // Compaction failures never break the conversation.
                warn!(target: "quill::agent", %err, "compaction failed");
            }
        }
    }
}

/// Per-category deadline. Execution tools honour a caller-supplied
/// `timeout_secs`, padded so the tool's own timeout fires first.
fn category_deadline_secs(category: ToolCategory, args: &Value) -> u64 {
    let base = category.default_timeout_secs();
    if category == ToolCategory::Execution {
        let requested = args
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(base);
        requested.max(base) + 1
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_deadline_honours_requested_timeout() {
        let args = json!({"timeout_secs": 120});
        assert_eq!(category_deadline_secs(ToolCategory::Execution, &args), 121);
        assert_eq!(
            category_deadline_secs(ToolCategory::Execution, &json!({})),
            defaults::EXEC_TOOL_TIMEOUT_SECS + 1
        );
    }

    #[test]
    fn file_and_search_deadlines_are_fixed() {
        assert_eq!(
            category_deadline_secs(ToolCategory::FileOps, &json!({})),
            defaults::FILE_TOOL_TIMEOUT_SECS
        );
        assert_eq!(
            category_deadline_secs(ToolCategory::Search, &json!({})),
            defaults::SEARCH_TOOL_TIMEOUT_SECS
        );
    }
}
