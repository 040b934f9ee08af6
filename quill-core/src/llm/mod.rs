//! Multi-provider LLM layer: neutral content model, provider trait, and
//! backend adapters.

pub mod content;
pub mod error;
pub mod provider;
pub mod providers;
pub mod request;
pub mod response;
pub mod utils;

pub use content::{Content, FunctionCall, FunctionResponse, Part, Role};
pub use error::LLMError;
pub use provider::LLMProvider;
pub use providers::{GeminiProvider, OpenAIProvider, create_provider};
pub use request::{GenerationConfig, LLMRequest, ToolDeclaration};
pub use response::{FinishReason, LLMResponse, LLMStream, UsageMetadata};
