//! Concrete backend adapters.

mod gemini;
mod openai;
pub(crate) mod shared;

pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;

use crate::llm::error::LLMError;
use crate::llm::provider::LLMProvider;
use crate::models::Backend;

/// Build the adapter for a backend with the given credential.
pub fn create_provider(
    backend: Backend,
    api_key: String,
    base_url: Option<String>,
) -> Result<Box<dyn LLMProvider>, LLMError> {
    if api_key.trim().is_empty() {
        return Err(LLMError::Authentication(format!(
            "no API key configured for {backend}"
        )));
    }

    Ok(match backend {
        Backend::Gemini => match base_url {
            Some(url) => Box::new(GeminiProvider::with_base_url(api_key, url)),
            None => Box::new(GeminiProvider::new(api_key)),
        },
        Backend::OpenAI => match base_url {
            Some(url) => Box::new(OpenAIProvider::with_base_url(api_key, url)),
            None => Box::new(OpenAIProvider::new(api_key)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_a_credential_error() {
        let result = create_provider(Backend::Gemini, "  ".to_string(), None);
        assert!(matches!(result, Err(LLMError::Authentication(_))));
    }

    #[test]
    fn factory_builds_named_adapters() {
        let gemini = create_provider(Backend::Gemini, "k".to_string(), None).unwrap();
        assert_eq!(gemini.name(), "gemini");
        let openai = create_provider(Backend::OpenAI, "k".to_string(), None).unwrap();
        assert_eq!(openai.name(), "openai");
    }
}
