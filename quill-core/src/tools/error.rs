//! Tool failure taxonomy.
//!
//! Tool errors are recovered locally: the loop wraps them as function
//! response payloads `{error, message, suggestion}` so the model can correct
//! course. Only the suggestion is advisory; kind and message are stable.

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    InvalidInput,
    FileNotFound,
    PermissionDenied,
    PathTraversal,
    PatchFailed,
    SizeReductionRefused,
    EmptyReplacement,
    ToolTimeout,
    InternalError,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::InvalidInput => "InvalidInput",
            ToolErrorKind::FileNotFound => "FileNotFound",
            ToolErrorKind::PermissionDenied => "PermissionDenied",
            ToolErrorKind::PathTraversal => "PathTraversal",
            ToolErrorKind::PatchFailed => "PatchFailed",
            ToolErrorKind::SizeReductionRefused => "SizeReductionRefused",
            ToolErrorKind::EmptyReplacement => "EmptyReplacement",
            ToolErrorKind::ToolTimeout => "ToolTimeout",
            ToolErrorKind::InternalError => "InternalError",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}: {message}", kind.as_str())]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    /// Directed at the model, e.g. "use edit_lines to shrink the file".
    pub suggestion: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidInput, message)
    }

    pub fn file_not_found(path: impl AsRef<str>) -> Self {
        Self::new(
            ToolErrorKind::FileNotFound,
            format!("file not found: {}", path.as_ref()),
        )
        .with_suggestion("check the path with list_dir or search_files")
    }

    pub fn permission_denied(path: impl AsRef<str>) -> Self {
        Self::new(
            ToolErrorKind::PermissionDenied,
            format!("permission denied: {}", path.as_ref()),
        )
    }

    pub fn path_traversal(path: impl AsRef<str>) -> Self {
        Self::new(
            ToolErrorKind::PathTraversal,
            format!(
                "path '{}' resolves outside the workspace root",
                path.as_ref()
            ),
        )
        .with_suggestion("use a path inside the workspace")
    }

    pub fn patch_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PatchFailed, message)
    }

    pub fn timeout(tool: &str, secs: u64) -> Self {
        Self::new(
            ToolErrorKind::ToolTimeout,
            format!("{tool} exceeded its {secs}s deadline"),
        )
        .with_suggestion("retry with a smaller scope or a longer timeout")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InternalError, message)
    }

    /// Classify a filesystem error for the given path.
    pub fn from_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::internal(format!("io error on {path}: {err}")),
        }
    }

    /// The payload handed back to the model.
    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.kind.as_str(),
            "message": self.message,
        });
        if let Some(suggestion) = &self.suggestion {
            payload["suggestion"] = json!(suggestion);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_kind_message_suggestion() {
        let err = ToolError::file_not_found("missing.txt");
        let value = err.to_value();
        assert_eq!(value["error"], "FileNotFound");
        assert!(value["message"].as_str().unwrap().contains("missing.txt"));
        assert!(value["suggestion"].as_str().is_some());
    }

    #[test]
    fn io_not_found_classifies() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ToolError::from_io(&io, "a.txt");
        assert_eq!(err.kind, ToolErrorKind::FileNotFound);
    }
}
