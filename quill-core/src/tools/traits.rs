//! Tool contract and execution context.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::constants::defaults;
use crate::llm::request::ToolDeclaration;

use super::error::ToolError;

/// Category a tool registers under. Order here is the fixed enumeration
/// order used when declaring tools to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    FileOps,
    CodeEdit,
    Search,
    Execution,
    Workspace,
    Display,
}

impl ToolCategory {
    pub const ORDERED: [ToolCategory; 6] = [
        ToolCategory::FileOps,
        ToolCategory::CodeEdit,
        ToolCategory::Search,
        ToolCategory::Execution,
        ToolCategory::Workspace,
        ToolCategory::Display,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::FileOps => "file-ops",
            ToolCategory::CodeEdit => "code-edit",
            ToolCategory::Search => "search",
            ToolCategory::Execution => "execution",
            ToolCategory::Workspace => "workspace",
            ToolCategory::Display => "display",
        }
    }

    /// Per-category deadline applied by the loop. Execution tools may carry
    /// their own user-specified timeout on top.
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            ToolCategory::Search => defaults::SEARCH_TOOL_TIMEOUT_SECS,
            ToolCategory::Execution => defaults::EXEC_TOOL_TIMEOUT_SECS,
            _ => defaults::FILE_TOOL_TIMEOUT_SECS,
        }
    }
}

/// Ambient state handed to every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace_root: PathBuf,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(workspace_root: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            workspace_root,
            cancel,
        }
    }
}

/// Contract implemented by every tool.
///
/// Handlers return `Err(ToolError)` for expected failures; the caller turns
/// those into function-response payloads rather than raising them.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn category(&self) -> ToolCategory;

    /// Preference within a category; lower wins.
    fn priority(&self) -> u8 {
        50
    }

    /// JSON schema for the input object.
    fn parameters(&self) -> Value;

    /// JSON schema for the output object. The default covers tools whose
    /// output is free-form.
    fn output_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    /// Whether this tool writes to the workspace or spawns processes.
    /// Mutating tools go through the approval policy and checkpoint hook.
    fn is_mutating(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError>;
}

/// The neutral declaration handed to provider adapters.
pub fn declaration_for(tool: &dyn Tool) -> ToolDeclaration {
    ToolDeclaration {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters(),
    }
}

/// Deserialize tool arguments, mapping failures to `InvalidInput`.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|err| ToolError::invalid_input(format!("invalid arguments: {err}")))
}
