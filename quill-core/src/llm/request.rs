//! Request shaping for provider adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;

/// A tool declaration in the neutral schema. Adapters translate this into
/// the provider's wire format, preserving parameter names, types,
/// descriptions, enums, required lists, and nested properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema for the input object. `required` is always present,
    /// an empty array when nothing is required.
    pub parameters: Value,
}

/// Generation knobs honoured where the backend supports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Token budget for model-internal reasoning, for backends that meter it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

/// Universal request handed to a [`super::LLMProvider`].
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    /// Concrete model id (already resolved; no provider prefix).
    pub model: String,
    /// Ordered conversation contents. System contents are hoisted by
    /// adapters that take the instruction out-of-band.
    pub contents: Vec<Content>,
    pub system_instruction: Option<String>,
    pub tools: Vec<ToolDeclaration>,
    pub generation: GenerationConfig,
}

impl LLMRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            ..Self::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }
}
