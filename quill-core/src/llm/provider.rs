//! Universal LLM provider abstraction.
//!
//! One adapter per backend. Adapters translate between the neutral
//! request/response vocabulary and the provider wire protocol, including
//! message-role mapping, tool-schema translation, and streamed tool-call
//! accumulation.
//!
//! Role mapping differs per backend: Gemini converses with `user`/`model`
//! roles and takes the system instruction out-of-band; OpenAI uses
//! `system`/`user`/`assistant`/`tool` with `tool_call_id` linking results to
//! calls. Function responses are user-role in the neutral model and each
//! adapter maps them to whatever its backend expects.

use async_stream::try_stream;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::LLMError;
use super::request::LLMRequest;
use super::response::{LLMResponse, LLMStream};

/// Contract implemented by every backend adapter.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Concrete backend name, e.g. "gemini" or "openai".
    fn name(&self) -> &str;

    /// One-shot completion. Accumulates internally and returns a single
    /// completed response.
    async fn generate(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, LLMError>;

    /// Streaming completion. Yields partial chunks as they arrive; the
    /// final chunk has `partial=false, turn_complete=true`. The default
    /// implementation falls back to `generate`.
    async fn stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream, LLMError> {
        let response = self.generate(request, cancel).await?;
        let stream = try_stream! {
            yield response;
        };
        Ok(Box::pin(stream))
    }

    /// Model ids this adapter serves.
    fn supported_models(&self) -> Vec<String>;
}
