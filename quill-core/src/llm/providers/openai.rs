//! OpenAI adapter: chat completions with SSE streaming.
//!
//! OpenAI models tool results as `tool`-role messages linked by
//! `tool_call_id`, and streams tool calls as indexed argument fragments;
//! the shared builders assemble them so only complete calls surface.
//! Usage counts are per-response, with cached and reasoning tokens nested
//! in detail objects.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::constants::{models, urls};
use crate::llm::content::{Content, FunctionCall, Part, Role};
use crate::llm::error::{LLMError, format_provider_error};
use crate::llm::provider::LLMProvider;
use crate::llm::request::LLMRequest;
use crate::llm::response::{FinishReason, LLMResponse, LLMStream, UsageMetadata};

use super::shared::{SseDecoder, ToolCallAssembler};

pub struct OpenAIProvider {
    api_key: String,
    http_client: HttpClient,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, urls::OPENAI_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http_client: HttpClient::new(),
            base_url,
        }
    }

    fn handle_http_error(status: reqwest::StatusCode, error_text: &str) -> LLMError {
        let code = status.as_u16();
        if code == 401 || code == 403 {
            return LLMError::Authentication(format_provider_error(
                "openai",
                &format!("{error_text}. Check the OPENAI_API_KEY environment variable."),
            ));
        }
        if code == 429 {
            return LLMError::RateLimit;
        }
        if code == 400 {
            return LLMError::InvalidRequest(format_provider_error("openai", error_text));
        }
        LLMError::Provider(format_provider_error(
            "openai",
            &format!("HTTP {status}: {error_text}"),
        ))
    }

    fn convert_request(&self, request: &LLMRequest, stream: bool) -> Value {
        let mut messages: Vec<Value> = Vec::new();

        let mut system_texts: Vec<String> = Vec::new();
        if let Some(instruction) = &request.system_instruction {
            system_texts.push(instruction.clone());
        }
        for content in &request.contents {
            if content.role == Role::System {
                let text = content.joined_text();
                if !text.is_empty() {
                    system_texts.push(text);
                }
            }
        }
        if !system_texts.is_empty() {
            messages.push(json!({
                "role": "system",
                "content": system_texts.join("\n\n"),
            }));
        }

        for content in &request.contents {
            match content.role {
                Role::System => {}
                Role::Model => {
                    let text = content.joined_text();
                    let tool_calls: Vec<Value> = content
                        .function_calls()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.args.to_string(),
                                },
                            })
                        })
                        .collect();

                    let mut message = json!({
                        "role": "assistant",
                        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                    });
                    if !tool_calls.is_empty() {
                        message["tool_calls"] = Value::Array(tool_calls);
                    }
                    messages.push(message);
                }
                Role::User => {
                    // Function responses become individual tool-role messages;
                    // plain text stays a user message.
                    let mut user_text = String::new();
                    for part in &content.parts {
                        match part {
                            Part::Text { text } => user_text.push_str(text),
                            Part::FunctionResponse { response } => {
                                messages.push(json!({
                                    "role": "tool",
                                    "tool_call_id": response.id,
                                    "content": response.response.to_string(),
                                }));
                            }
                            Part::FunctionCall { .. } => {}
                        }
                    }
                    if !user_text.is_empty() {
                        messages.push(json!({"role": "user", "content": user_text}));
                    }
                }
            }
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": ensure_required_field(tool.parameters.clone()),
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        if let Some(temperature) = request.generation.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.generation.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(max_tokens) = request.generation.max_output_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        }
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({"include_usage": true});
        }

        body
    }

    fn parse_usage(value: &Value) -> Option<UsageMetadata> {
        let usage = value.get("usage")?;
        if usage.is_null() {
            return None;
        }
        let prompt_tokens = usage.get("prompt_tokens")?.as_u64()?;
        let response_tokens = usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let cached_tokens = usage
            .pointer("/prompt_tokens_details/cached_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let thought_tokens = usage
            .pointer("/completion_tokens_details/reasoning_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Some(UsageMetadata {
            prompt_tokens,
            response_tokens,
            thought_tokens,
            tool_use_tokens: 0,
            cached_tokens,
            total_tokens: usage
                .get("total_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(prompt_tokens + response_tokens),
        })
    }

    fn map_finish_reason(reason: Option<&str>) -> FinishReason {
        // Tool-call completions normalise to Stop; the loop inspects parts.
        match reason {
            Some("stop") | Some("tool_calls") | None => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some(_) => FinishReason::Other,
        }
    }

    fn convert_response(value: Value) -> Result<LLMResponse, LLMError> {
        let usage = Self::parse_usage(&value);
        let choice = value
            .get("choices")
            .and_then(|choices| choices.get(0))
            .ok_or_else(|| {
                LLMError::Provider(format_provider_error("openai", "no choices in response"))
            })?;

        let message = choice.get("message").ok_or_else(|| {
            LLMError::Provider(format_provider_error("openai", "choice missing message"))
        })?;

        let mut parts = Vec::new();
        if let Some(text) = message.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                parts.push(Part::text(text));
            }
        }

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for (index, call) in calls.iter().enumerate() {
                let Some(function) = call.get("function") else { continue };
                let Some(name) = function.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{index}"));
                let args = function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| Value::Object(Default::default()));
                parts.push(Part::FunctionCall {
                    call: FunctionCall {
                        id,
                        name: name.to_string(),
                        args,
                    },
                });
            }
        }

        let finish_reason =
            Self::map_finish_reason(choice.get("finish_reason").and_then(Value::as_str));

        let mut response =
            LLMResponse::completed(Content::new(Role::Model, parts), finish_reason);
        if let Some(usage) = usage {
            response = response.with_usage(usage);
        }
        Ok(response)
    }
}

fn ensure_required_field(mut parameters: Value) -> Value {
    if let Some(object) = parameters.as_object_mut() {
        object
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    parameters
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, LLMError> {
        let body = self.convert_request(&request, false);
        let url = format!("{}/chat/completions", self.base_url);

        let send = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LLMError::Cancelled),
            result = send => result.map_err(|err| {
                LLMError::Network(format_provider_error("openai", &err.to_string()))
            })?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::handle_http_error(status, &error_text));
        }

        let value: Value = response.json().await.map_err(|err| {
            LLMError::Provider(format_provider_error(
                "openai",
                &format!("failed to parse response: {err}"),
            ))
        })?;

        Self::convert_response(value)
    }

    async fn stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream, LLMError> {
        let body = self.convert_request(&request, true);
        let url = format!("{}/chat/completions", self.base_url);

        let send = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LLMError::Cancelled),
            result = send => result.map_err(|err| {
                LLMError::Network(format_provider_error("openai", &err.to_string()))
            })?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::handle_http_error(status, &error_text));
        }

        let mut byte_stream = response.bytes_stream();

        let stream = try_stream! {
            let mut decoder = SseDecoder::new();
            let mut aggregated_text = String::new();
            let mut calls = ToolCallAssembler::new();
            let mut finish_reason = FinishReason::Stop;
            let mut usage: Option<UsageMetadata> = None;
            let mut done = false;

            while !done {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => None,
                    next = byte_stream.next() => next,
                };

                let Some(chunk) = chunk else {
                    if cancel.is_cancelled() {
                        Err::<(), _>(LLMError::Cancelled)?;
                    }
                    break;
                };
                let bytes = chunk.map_err(|err| {
                    LLMError::Network(format_provider_error("openai", &err.to_string()))
                })?;
                decoder.feed(&bytes);

                while let Some(payload) = decoder.next_payload() {
                    if payload == "[DONE]" {
                        done = true;
                        break;
                    }

                    let Ok(value) = serde_json::from_str::<Value>(&payload) else {
                        debug!(target: "quill::llm::openai", "skipping undecodable stream chunk");
                        continue;
                    };

                    if let Some(parsed) = Self::parse_usage(&value) {
                        usage = Some(parsed);
                    }

                    let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
                        continue;
                    };

                    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                        finish_reason = Self::map_finish_reason(Some(reason));
                    }

                    let Some(delta) = choice.get("delta") else { continue };

                    if let Some(text) = delta.get("content").and_then(Value::as_str) {
                        if !text.is_empty() {
                            aggregated_text.push_str(text);
                            yield LLMResponse::partial_text(text);
                        }
                    }

                    if let Some(deltas) = delta.get("tool_calls").and_then(Value::as_array) {
                        calls.absorb(deltas);
                    }
                }
            }

            let mut parts = Vec::new();
            if !aggregated_text.is_empty() {
                parts.push(Part::text(aggregated_text));
            }
            for call in calls.finish() {
                parts.push(Part::FunctionCall { call });
            }

            let mut completed =
                LLMResponse::completed(Content::new(Role::Model, parts), finish_reason);
            if let Some(usage) = usage {
                completed = completed.with_usage(usage);
            }
            yield completed;
        };

        Ok(Box::pin(stream))
    }

    fn supported_models(&self) -> Vec<String> {
        models::openai::SUPPORTED_MODELS
            .iter()
            .map(|id| id.to_string())
            .collect()
    }
}
