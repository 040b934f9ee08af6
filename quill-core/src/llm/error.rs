//! Error taxonomy for the LLM layer.

use thiserror::Error;

/// Errors surfaced by provider adapters and the surrounding loop.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Missing or rejected credentials; terminal before the first request.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network failure reaching the backend; retried with backoff.
    #[error("network error: {0}")]
    Network(String),

    /// Backend returned a rate-limit response.
    #[error("rate limit exceeded")]
    RateLimit,

    /// Request rejected by the backend as malformed; never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other non-success from the backend (safety block, server error).
    #[error("provider error: {0}")]
    Provider(String),

    /// The ambient context was cancelled mid-call.
    #[error("request cancelled")]
    Cancelled,
}

impl LLMError {
    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LLMError::Network(_))
    }
}

/// Prefix a backend error message with its provider name, matching the
/// format used in user-facing diagnostics.
pub fn format_provider_error(provider: &str, message: &str) -> String {
    format!("[{provider}] {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_retry() {
        assert!(LLMError::Network("reset".into()).is_retryable());
        assert!(!LLMError::RateLimit.is_retryable());
        assert!(!LLMError::InvalidRequest("bad".into()).is_retryable());
        assert!(!LLMError::Cancelled.is_retryable());
    }
}
