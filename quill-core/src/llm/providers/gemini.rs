//! Gemini adapter: generateContent / streamGenerateContent.
//!
//! Gemini converses with `user`/`model` roles only; the system instruction
//! travels out-of-band, function responses are user-role `functionResponse`
//! parts, and usage metadata is reported per response (not cumulative).

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::constants::{models, urls};
use crate::llm::content::{Content, FunctionCall, FunctionResponse, Part, Role};
use crate::llm::error::{LLMError, format_provider_error};
use crate::llm::provider::LLMProvider;
use crate::llm::request::LLMRequest;
use crate::llm::response::{FinishReason, LLMResponse, LLMStream, UsageMetadata};

use super::shared::SseDecoder;

pub struct GeminiProvider {
    api_key: String,
    http_client: HttpClient,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireToolGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    role: String,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "functionCall")]
    FunctionCall { name: String, args: Value },
    #[serde(rename = "functionResponse")]
    FunctionResponse { name: String, response: Value },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolGroup {
    function_declarations: Vec<WireFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct WireSystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
    #[serde(default)]
    tool_use_prompt_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl From<WireUsage> for UsageMetadata {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_token_count,
            response_tokens: usage.candidates_token_count,
            thought_tokens: usage.thoughts_token_count,
            tool_use_tokens: usage.tool_use_prompt_token_count,
            cached_tokens: usage.cached_content_token_count,
            total_tokens: usage.total_token_count,
        }
    }
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, urls::GEMINI_API_BASE.to_string())
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
                "gemini",
                &format!(
                    "{error_text}. Check the GOOGLE_API_KEY or GEMINI_API_KEY environment variable."
                ),
            ));
        }
        if code == 429 {
            return LLMError::RateLimit;
        }
        if code == 400 {
            return LLMError::InvalidRequest(format_provider_error("gemini", error_text));
        }
        LLMError::Provider(format_provider_error(
            "gemini",
            &format!("HTTP {status}: {error_text}"),
        ))
    }

    fn convert_request(&self, request: &LLMRequest) -> WireRequest {
        let mut system_texts: Vec<String> = Vec::new();
        if let Some(instruction) = &request.system_instruction {
            system_texts.push(instruction.clone());
        }

        let mut contents = Vec::new();
        for content in &request.contents {
            if content.role == Role::System {
                let text = content.joined_text();
                if !text.is_empty() {
                    system_texts.push(text);
                }
                continue;
            }

            let mut parts = Vec::new();
            for part in &content.parts {
                match part {
                    Part::Text { text } => {
                        if !text.is_empty() {
                            parts.push(WirePart::Text(text.clone()));
                        }
                    }
                    Part::FunctionCall { call } => {
                        parts.push(WirePart::FunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        });
                    }
                    Part::FunctionResponse { response } => {
                        parts.push(WirePart::FunctionResponse {
                            name: response.name.clone(),
                            response: json!({
                                "name": response.name,
                                "content": response.response,
                            }),
                        });
                    }
                }
            }

            if !parts.is_empty() {
                contents.push(WireContent {
                    role: match content.role {
                        Role::Model => "model".to_string(),
                        _ => "user".to_string(),
                    },
                    parts,
                });
            }
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![WireToolGroup {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|tool| WireFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: ensure_required_field(tool.parameters.clone()),
                    })
                    .collect(),
            }])
        };

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.generation.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.generation.top_p {
            generation_config.insert("topP".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = request.generation.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(budget) = request.generation.thinking_budget {
            generation_config.insert(
                "thinkingConfig".to_string(),
                json!({ "thinkingBudget": budget }),
            );
        }

        WireRequest {
            contents,
            tools,
            system_instruction: if system_texts.is_empty() {
                None
            } else {
                Some(WireSystemInstruction {
                    parts: vec![WirePart::Text(system_texts.join("\n\n"))],
                })
            },
            generation_config: if generation_config.is_empty() {
                None
            } else {
                Some(Value::Object(generation_config))
            },
        }
    }

    fn convert_candidate(
        candidate: WireCandidate,
        call_counter: &mut usize,
    ) -> (Vec<Part>, FinishReason) {
        let mut parts = Vec::new();
        if let Some(content) = candidate.content {
            for part in content.parts {
                match part {
                    WirePart::Text(text) => parts.push(Part::Text { text }),
                    WirePart::FunctionCall { name, args } => {
                        let id = format!("call_{}", *call_counter);
                        *call_counter += 1;
                        parts.push(Part::FunctionCall {
                            call: FunctionCall { id, name, args },
                        });
                    }
                    WirePart::FunctionResponse { .. } => {
                        // Echoed tool responses are dropped to avoid duplicating output.
                    }
                }
            }
        }

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some(_) => FinishReason::Other,
        };
        (parts, finish_reason)
    }

    fn convert_response(response: WireResponse) -> Result<LLMResponse, LLMError> {
        let usage = response.usage_metadata.map(UsageMetadata::from);
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            LLMError::Provider(format_provider_error("gemini", "no candidate in response"))
        })?;

        let mut call_counter = 0usize;
        let (parts, finish_reason) = Self::convert_candidate(candidate, &mut call_counter);

        let mut result =
            LLMResponse::completed(Content::new(Role::Model, parts), finish_reason);
        if let Some(usage) = usage {
            result = result.with_usage(usage);
        }
        Ok(result)
    }
}

/// Gemini rejects declarations whose schema omits `required`; normalise to
/// an explicit empty list.
fn ensure_required_field(mut parameters: Value) -> Value {
    if let Some(object) = parameters.as_object_mut() {
        object
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    parameters
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, LLMError> {
        let wire_request = self.convert_request(&request);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let send = self.http_client.post(&url).json(&wire_request).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LLMError::Cancelled),
            result = send => result.map_err(|err| {
                LLMError::Network(format_provider_error("gemini", &err.to_string()))
            })?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::handle_http_error(status, &error_text));
        }

        let wire_response: WireResponse = response.json().await.map_err(|err| {
            LLMError::Provider(format_provider_error(
                "gemini",
                &format!("failed to parse response: {err}"),
            ))
        })?;

        Self::convert_response(wire_response)
    }

    async fn stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream, LLMError> {
        let wire_request = self.convert_request(&request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, request.model, self.api_key
        );

        let send = self.http_client.post(&url).json(&wire_request).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LLMError::Cancelled),
            result = send => result.map_err(|err| {
                LLMError::Network(format_provider_error("gemini", &err.to_string()))
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
            let mut final_parts: Vec<Part> = Vec::new();
            let mut aggregated_text = String::new();
            let mut finish_reason = FinishReason::Stop;
            let mut usage: Option<UsageMetadata> = None;
            let mut call_counter = 0usize;

            loop {
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
                    LLMError::Network(format_provider_error("gemini", &err.to_string()))
                })?;
                decoder.feed(&bytes);

                while let Some(payload) = decoder.next_payload() {
                    let Ok(wire) = serde_json::from_str::<WireResponse>(&payload) else {
                        debug!(target: "quill::llm::gemini", "skipping undecodable stream chunk");
                        continue;
                    };

                    if let Some(wire_usage) = wire.usage_metadata {
                        usage = Some(UsageMetadata::from(wire_usage));
                    }

                    for candidate in wire.candidates {
                        let (parts, reason) =
                            Self::convert_candidate(candidate, &mut call_counter);
                        if reason != FinishReason::Stop {
                            finish_reason = reason;
                        }
                        for part in parts {
                            match part {
                                Part::Text { text } => {
                                    aggregated_text.push_str(&text);
                                    yield LLMResponse::partial_text(text);
                                }
                                other => final_parts.push(other),
                            }
                        }
                    }
                }
            }

            let mut parts = Vec::new();
            if !aggregated_text.is_empty() {
                parts.push(Part::text(aggregated_text));
            }
            parts.extend(final_parts);

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
        models::google::SUPPORTED_MODELS
            .iter()
            .map(|id| id.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::request::ToolDeclaration;

    fn provider() -> GeminiProvider {
        GeminiProvider::new("test-key".to_string())
    }

    #[test]
    fn request_hoists_system_contents() {
        let request = LLMRequest::new(
            models::google::GEMINI_2_5_FLASH,
            vec![
                Content::system_text("project context"),
                Content::user_text("hello"),
            ],
        )
        .with_system_instruction("be terse");

        let wire = provider().convert_request(&request);
        assert_eq!(wire.contents.len(), 1);
        assert_eq!(wire.contents[0].role, "user");
        let instruction = wire.system_instruction.unwrap();
        match &instruction.parts[0] {
            WirePart::Text(text) => {
                assert!(text.contains("be terse"));
                assert!(text.contains("project context"));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn request_maps_function_responses_to_user_role() {
        let request = LLMRequest::new(
            models::google::GEMINI_2_5_FLASH,
            vec![Content::function_responses(vec![FunctionResponse {
                id: "call_0".to_string(),
                name: "read_file".to_string(),
                response: json!({"content": "hi"}),
            }])],
        );

        let wire = provider().convert_request(&request);
        assert_eq!(wire.contents[0].role, "user");
        assert!(matches!(
            wire.contents[0].parts[0],
            WirePart::FunctionResponse { .. }
        ));
    }

    #[test]
    fn tool_declaration_gains_required_field() {
        let request = LLMRequest::new(
            models::google::GEMINI_2_5_FLASH,
            vec![Content::user_text("x")],
        )
        .with_tools(vec![ToolDeclaration {
            name: "list_dir".to_string(),
            description: "List a directory".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }]);

        let wire = provider().convert_request(&request);
        let declarations = &wire.tools.unwrap()[0].function_declarations;
        assert_eq!(declarations[0].parameters["required"], json!([]));
    }

    #[test]
    fn response_extracts_tool_calls_and_usage() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "let me check"},
                        {"functionCall": {"name": "read_file", "args": {"path": "a.txt"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 7,
                "totalTokenCount": 19
            }
        });

        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let response = GeminiProvider::convert_response(wire).unwrap();

        assert!(response.turn_complete);
        assert_eq!(response.content.joined_text(), "let me check");
        let calls: Vec<_> = response.content.function_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(response.usage.unwrap().total_tokens, 19);
    }

    #[test]
    fn max_tokens_finish_reason_is_normalised() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "partial"}]},
                "finishReason": "MAX_TOKENS"
            }]
        });
        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let response = GeminiProvider::convert_response(wire).unwrap();
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
    }
}
