//! Confirmation policy for mutating tools.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ApprovalMode;
use crate::tools::ToolCategory;

/// What the user is asked to approve.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool: String,
    pub args: Value,
}

/// Decides whether a confirmation-gated tool call may proceed. The terminal
/// front-end implements this with a prompt; tests script it.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn confirm(&self, request: &ApprovalRequest) -> bool;
}

/// Approves everything; the handler used under `ApprovalMode::Never` and in
/// non-interactive runs.
pub struct AutoApprove;

#[async_trait]
impl ApprovalHandler for AutoApprove {
    async fn confirm(&self, _request: &ApprovalRequest) -> bool {
        true
    }
}

/// Whether a call to a tool needs user confirmation under the given mode.
/// Read-only tools never do. `Untrusted` confirms every mutating tool;
/// `OnRequest` confirms only execution, the riskiest category.
pub fn requires_confirmation(mode: ApprovalMode, mutating: bool, category: ToolCategory) -> bool {
    if !mutating {
        return false;
    }
    match mode {
        ApprovalMode::Untrusted => true,
        ApprovalMode::OnRequest => category == ToolCategory::Execution,
        ApprovalMode::Never => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_is_always_auto_approved() {
        for mode in [
            ApprovalMode::Untrusted,
            ApprovalMode::OnRequest,
            ApprovalMode::Never,
        ] {
            assert!(!requires_confirmation(mode, false, ToolCategory::FileOps));
        }
    }

    #[test]
    fn untrusted_confirms_every_mutating_tool() {
        assert!(requires_confirmation(
            ApprovalMode::Untrusted,
            true,
            ToolCategory::FileOps
        ));
        assert!(requires_confirmation(
            ApprovalMode::Untrusted,
            true,
            ToolCategory::CodeEdit
        ));
        assert!(requires_confirmation(
            ApprovalMode::Untrusted,
            true,
            ToolCategory::Execution
        ));
    }

    #[test]
    fn on_request_confirms_only_execution() {
        assert!(!requires_confirmation(
            ApprovalMode::OnRequest,
            true,
            ToolCategory::CodeEdit
        ));
        assert!(requires_confirmation(
            ApprovalMode::OnRequest,
            true,
            ToolCategory::Execution
        ));
    }

    #[test]
    fn never_auto_approves() {
        assert!(!requires_confirmation(
            ApprovalMode::Never,
            true,
            ToolCategory::Execution
        ));
    }
}
