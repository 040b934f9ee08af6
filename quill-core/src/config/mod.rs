//! Configuration loader and runtime settings.
//!
//! Everything tunable lives here; hard limits and identifiers are in
//! [`constants`]. Settings load from an optional `quill.toml` at the
//! workspace root with serde defaults filling the gaps.

pub mod constants;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use self::constants::defaults;

pub const CONFIG_FILE_NAME: &str = "quill.toml";

/// Top-level configuration for the agent runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub compaction: CompactionSettings,
}

/// Agent loop behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on tool-call rounds per user message.
    pub max_tool_rounds: usize,
    /// Confirmation policy for mutating tools.
    pub approval: ApprovalMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: defaults::MAX_TOOL_ROUNDS,
            approval: ApprovalMode::OnRequest,
        }
    }
}

/// When the loop asks the user before executing a mutating tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalMode {
    /// Confirm every mutating tool.
    Untrusted,
    /// Confirm risky tools; auto-approve read-only ones.
    OnRequest,
    /// Auto-approve everything.
    Never,
}

/// Tool execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-category deadlines, seconds.
    pub file_timeout_secs: u64,
    pub exec_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: defaults::FILE_TOOL_TIMEOUT_SECS,
            exec_timeout_secs: defaults::EXEC_TOOL_TIMEOUT_SECS,
            search_timeout_secs: defaults::SEARCH_TOOL_TIMEOUT_SECS,
        }
    }
}

/// Sliding-window compaction settings (see the compaction module for the
/// selector algorithm these feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionSettings {
    pub invocation_threshold: usize,
    pub overlap_size: usize,
    pub token_threshold: u64,
    pub safety_ratio: f64,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            invocation_threshold: defaults::COMPACTION_INVOCATION_THRESHOLD,
            overlap_size: defaults::COMPACTION_OVERLAP_SIZE,
            token_threshold: defaults::COMPACTION_TOKEN_THRESHOLD,
            safety_ratio: defaults::COMPACTION_SAFETY_RATIO,
        }
    }
}

impl QuillConfig {
    /// Load configuration from `quill.toml` in the workspace root, falling
    /// back to defaults when the file is absent.
    pub fn load_from_workspace(workspace: &Path) -> Result<Self> {
        let path = workspace.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Resolve the user-global configuration directory (`~/.quill`).
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(constants::instructions::USER_CONFIG_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_config_missing() {
        let tmp = TempDir::new().unwrap();
        let config = QuillConfig::load_from_workspace(tmp.path()).unwrap();
        assert_eq!(config.agent.max_tool_rounds, defaults::MAX_TOOL_ROUNDS);
        assert_eq!(config.agent.approval, ApprovalMode::OnRequest);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[agent]\nmax_tool_rounds = 10\napproval = \"never\"\n").unwrap();

        let config = QuillConfig::load_from_workspace(tmp.path()).unwrap();
        assert_eq!(config.agent.max_tool_rounds, 10);
        assert_eq!(config.agent.approval, ApprovalMode::Never);
        assert_eq!(
            config.compaction.invocation_threshold,
            defaults::COMPACTION_INVOCATION_THRESHOLD
        );
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "agent = not valid").unwrap();
        assert!(QuillConfig::load_from_workspace(tmp.path()).is_err());
    }
}
