//! Small helpers for the LLM layer.

/// Rough token estimate used where the backend has not reported usage.
/// Four characters per token is the usual approximation for code-heavy text.
pub fn estimate_token_count(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}
