//! Built-in model descriptors and their provider aliases.

use std::sync::Arc;

use crate::config::constants::models;

use super::{Backend, CostTier, ModelCapabilities, ModelDescriptor};

/// One descriptor plus the shorthand aliases that reach it. A base model may
/// be reachable through several aliases; aliases are many-to-one.
pub(super) struct PresetEntry {
    pub descriptor: Arc<ModelDescriptor>,
    pub aliases: &'static [&'static str],
}

pub(super) fn builtin_presets() -> Vec<PresetEntry> {
    vec![
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::google::GEMINI_2_5_FLASH.to_string(),
                display_name: "Gemini 2.5 Flash".to_string(),
                backend: Backend::Gemini,
                context_window: 1_048_576,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: true,
                },
                cost_tier: CostTier::Standard,
                is_default: true,
            }),
            aliases: &["flash", "gemini-flash"],
        },
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::google::GEMINI_2_5_PRO.to_string(),
                display_name: "Gemini 2.5 Pro".to_string(),
                backend: Backend::Gemini,
                context_window: 1_048_576,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: true,
                },
                cost_tier: CostTier::Premium,
                is_default: false,
            }),
            aliases: &["pro", "gemini-pro"],
        },
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::google::GEMINI_2_0_FLASH.to_string(),
                display_name: "Gemini 2.0 Flash".to_string(),
                backend: Backend::Gemini,
                context_window: 1_048_576,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: true,
                },
                cost_tier: CostTier::Budget,
                is_default: false,
            }),
            aliases: &[],
        },
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::openai::GPT_4_1.to_string(),
                display_name: "GPT-4.1".to_string(),
                backend: Backend::OpenAI,
                context_window: 1_047_576,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: true,
                },
                cost_tier: CostTier::Premium,
                is_default: true,
            }),
            aliases: &["gpt4.1"],
        },
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::openai::GPT_4_1_MINI.to_string(),
                display_name: "GPT-4.1 Mini".to_string(),
                backend: Backend::OpenAI,
                context_window: 1_047_576,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: true,
                },
                cost_tier: CostTier::Standard,
                is_default: false,
            }),
            aliases: &["mini"],
        },
        PresetEntry {
            descriptor: Arc::new(ModelDescriptor {
                id: models::openai::GPT_4O.to_string(),
                display_name: "GPT-4o".to_string(),
                backend: Backend::OpenAI,
                context_window: 128_000,
                capabilities: ModelCapabilities {
                    vision: true,
                    tool_use: true,
                    long_context: false,
                },
                cost_tier: CostTier::Standard,
                is_default: false,
            }),
            aliases: &["4o"],
        },
    ]
}

/// All built-in descriptors, in catalogue order.
pub fn builtin_descriptors() -> Vec<Arc<ModelDescriptor>> {
    builtin_presets()
        .into_iter()
        .map(|entry| entry.descriptor)
        .collect()
}
