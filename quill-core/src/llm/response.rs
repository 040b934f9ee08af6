//! Universal response surface for provider adapters.

use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::content::Content;
use super::error::LLMError;

/// Normalised stop cause. Tool-call completions map to `Stop`; the loop
/// detects tool calls by part type, not by finish reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    #[default]
    Stop,
    MaxTokens,
    Other,
}

/// Token accounting reported by the backend for one response.
///
/// Some backends report cumulative counts across an API session; the token
/// tracker is responsible for converting those into per-invocation deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    #[serde(default)]
    pub thought_tokens: u64,
    #[serde(default)]
    pub tool_use_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    pub total_tokens: u64,
}

/// One streamed response chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub content: Content,
    /// True for every intermediate chunk; the final chunk is `false`.
    pub partial: bool,
    /// True only on the final chunk of an invocation.
    pub turn_complete: bool,
    pub finish_reason: FinishReason,
    pub usage: Option<UsageMetadata>,
}

impl LLMResponse {
    pub fn partial_text(delta: impl Into<String>) -> Self {
        Self {
            content: Content::model_text(delta),
            partial: true,
            turn_complete: false,
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    pub fn completed(content: Content, finish_reason: FinishReason) -> Self {
        Self {
            content,
            partial: false,
            turn_complete: true,
            finish_reason,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Single-use lazy response sequence. For `stream()` calls each item is a
/// partial chunk until the final one; `generate()` paths yield exactly one
/// completed response.
pub type LLMStream = Pin<Box<dyn futures::Stream<Item = Result<LLMResponse, LLMError>> + Send>>;
