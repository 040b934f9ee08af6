//! Model catalogue: descriptors, provider backends, and the
//! `provider/model` resolver.

mod presets;
mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use presets::builtin_descriptors;
pub use resolver::{ModelRef, ModelResolver, ResolveError, ResolvedModel};

/// Backend serving a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gemini,
    OpenAI,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::OpenAI => "openai",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative pricing band, coarse on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Budget,
    Standard,
    Premium,
}

/// Capability flags advertised to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub tool_use: bool,
    pub long_context: bool,
}

/// Immutable description of one model, shared read-only between the
/// resolver and any request that references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable id used on the wire.
    pub id: String,
    pub display_name: String,
    pub backend: Backend,
    /// Context window in tokens.
    pub context_window: u64,
    pub capabilities: ModelCapabilities,
    pub cost_tier: CostTier,
    /// Default model for its provider.
    pub is_default: bool,
}
