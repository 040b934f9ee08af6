//! Context-marker patch application.
//!
//! Hunks are located by `@@ <context>` markers naming semantic containers
//! (class or function lines) instead of line numbers, which keeps patches
//! valid when earlier edits have shifted the file. The matcher walks the
//! markers in order, then finds the removal block within a bounded window
//! using whitespace-tolerant comparison.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::constants::{defaults, tools};

use super::super::error::ToolError;
use super::super::file_ops::atomic_write;
use super::super::path::resolve_workspace_path;
use super::super::traits::{Tool, ToolCategory, ToolContext, parse_args};

const UPDATE_FILE_MARKER: &str = "*** Update File: ";
const BEGIN_PATCH_MARKER: &str = "*** Begin Patch";
const END_PATCH_MARKER: &str = "*** End Patch";
const CONTEXT_MARKER_PREFIX: &str = "@@";

#[derive(Debug, Clone, Default)]
struct SemanticHunk {
    /// Context markers, outermost first. Indentation in the marker text is
    /// irrelevant; comparison trims both sides.
    contexts: Vec<String>,
    removals: Vec<String>,
    additions: Vec<String>,
}

#[derive(Debug)]
struct SemanticPatch {
    path: String,
    hunks: Vec<SemanticHunk>,
}

fn parse(patch: &str) -> Result<SemanticPatch, ToolError> {
    let mut lines = patch.lines().peekable();

    // An optional Begin Patch wrapper is tolerated and skipped.
    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == BEGIN_PATCH_MARKER {
            lines.next();
        } else {
            break;
        }
    }

    let header = lines
        .next()
        .ok_or_else(|| ToolError::patch_failed("empty patch"))?;
    let path = header
        .trim()
        .strip_prefix(UPDATE_FILE_MARKER)
        .ok_or_else(|| {
            ToolError::patch_failed(format!(
                "expected '{UPDATE_FILE_MARKER}<path>' header, found '{header}'"
            ))
        })?
        .trim()
        .to_string();
    if path.is_empty() {
        return Err(ToolError::patch_failed("update header names no path"));
    }

    let mut hunks: Vec<SemanticHunk> = Vec::new();
    let mut current = SemanticHunk::default();
    let mut current_has_body = false;

    for line in lines {
        let trimmed_end = line.trim_end();
        if trimmed_end.trim() == END_PATCH_MARKER {
            break;
        }

        if trimmed_end.is_empty() {
            // A blank line terminates the hunk in progress.
            if current_has_body || !current.contexts.is_empty() {
                hunks.push(std::mem::take(&mut current));
                current_has_body = false;
            }
            continue;
        }

        if let Some(context) = trimmed_end.trim_start().strip_prefix(CONTEXT_MARKER_PREFIX) {
            if current_has_body {
                // A new marker after diff lines starts the next hunk.
                hunks.push(std::mem::take(&mut current));
                current_has_body = false;
            }
            current.contexts.push(context.trim().to_string());
            continue;
        }

        match trimmed_end.chars().next() {
            Some('-') => {
                current.removals.push(trimmed_end[1..].to_string());
                current_has_body = true;
            }
            Some('+') => {
                current.additions.push(trimmed_end[1..].to_string());
                current_has_body = true;
            }
            _ => {
                return Err(ToolError::patch_failed(format!(
                    "unexpected line in patch body: '{trimmed_end}'"
                )));
            }
        }
    }

    if current_has_body || !current.contexts.is_empty() {
        hunks.push(current);
    }
    if hunks.is_empty() {
        return Err(ToolError::patch_failed("patch contains no hunks"));
    }

    Ok(SemanticPatch { path, hunks })
}

fn apply_hunk(lines: &mut Vec<String>, hunk: &SemanticHunk) -> Result<(), ToolError> {
    // Locate the deepest context: each marker matches the first trimmed-equal
    // line after its predecessor's match.
    let mut cursor = 0usize;
    for marker in &hunk.contexts {
        let found = (cursor..lines.len()).find(|&i| lines[i].trim() == marker.as_str());
        match found {
            Some(index) => cursor = index + 1,
            None => {
                return Err(ToolError::patch_failed(format!(
                    "context marker not found: {marker}"
                ))
                .with_suggestion(
                    "check the marker text against the file; markers compare trimmed",
                ));
            }
        }
    }

    if hunk.removals.is_empty() {
        // Pure insertion lands right after the located context.
        let at = cursor.min(lines.len());
        lines.splice(at..at, hunk.additions.iter().cloned());
        return Ok(());
    }

    let window = hunk.removals.len();
    let last_start = lines.len().saturating_sub(window);
    let search_end = (cursor + defaults::SEMANTIC_PATCH_SEARCH_WINDOW).min(last_start);

    let matches_at = |start: usize| {
        hunk.removals
            .iter()
            .enumerate()
            .all(|(k, removal)| lines[start + k].trim() == removal.trim())
    };

    let found = (cursor..=search_end).find(|&start| matches_at(start));
    match found {
        Some(start) => {
            lines.splice(start..start + window, hunk.additions.iter().cloned());
            Ok(())
        }
        None => Err(ToolError::patch_failed(format!(
            "removal block not found within {} lines of context:\n{}",
            defaults::SEMANTIC_PATCH_SEARCH_WINDOW,
            hunk.removals.join("\n")
        ))
        .with_suggestion("read_file the region and align the removal lines with the file")),
    }
}

fn default_false() -> bool {
    false
}

#[derive(Debug, Deserialize)]
struct SemanticPatchInput {
    patch: String,
    #[serde(default = "default_false")]
    dry_run: bool,
}

/// Apply a context-marker patch. The target path comes from the
/// `*** Update File:` header inside the patch itself.
pub struct SemanticPatchTool;

#[async_trait]
impl Tool for SemanticPatchTool {
    fn name(&self) -> &'static str {
        tools::SEMANTIC_PATCH
    }

    fn description(&self) -> &'static str {
        "Apply a patch located by '@@ context' markers (class/function names) instead of line numbers. Preferred for refactor-heavy edits."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeEdit
    }

    fn priority(&self) -> u8 {
        35
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "Patch text: '*** Update File: <path>' header, then hunks of '@@ <context>' markers, '-' removals and '+' additions. Blank lines separate hunks.",
                },
                "dry_run": {"type": "boolean", "description": "Return patched text without writing"},
            },
            "required": ["patch"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: SemanticPatchInput = parse_args(args)?;
        let patch = parse(&input.patch)?;
        let path = resolve_workspace_path(&ctx.workspace_root, &patch.path)?;

        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &patch.path))?;
        let had_trailing_newline = original.ends_with('\n');
        let mut lines: Vec<String> = original.lines().map(String::from).collect();

        // Hunks apply sequentially; each sees the state the previous left.
        for hunk in &patch.hunks {
            apply_hunk(&mut lines, hunk)?;
        }

        let mut patched = lines.join("\n");
        if had_trailing_newline && !patched.is_empty() {
            patched.push('\n');
        }

        if input.dry_run {
            return Ok(json!({
                "success": true,
                "path": path.to_string_lossy(),
                "dry_run": true,
                "hunks_applied": patch.hunks.len(),
                "patched_text": patched,
            }));
        }

        atomic_write(&path, &patched).await?;

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "hunks_applied": patch.hunks.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::error::ToolErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ctx(tmp: &TempDir) -> ToolContext {
        ToolContext::new(tmp.path().to_path_buf())
    }

    const USER_PY: &str = "class User:\n    def __init__(self, email):\n        self.email = email\n\n    def validate(self):\n        return True\n\nclass Admin:\n    pass\n";

    #[test]
    fn parse_extracts_path_and_hunks() {
        let patch = "*** Update File: user.py\n@@ class User\n@@ def validate\n-        return True\n+        if not self.email:\n+            raise ValueError(\"missing email\")\n+        return True\n";
        let parsed = parse(patch).unwrap();
        assert_eq!(parsed.path, "user.py");
        assert_eq!(parsed.hunks.len(), 1);
        assert_eq!(
            parsed.hunks[0].contexts,
            vec!["class User".to_string(), "def validate".to_string()]
        );
        assert_eq!(parsed.hunks[0].removals.len(), 1);
        assert_eq!(parsed.hunks[0].additions.len(), 3);
    }

    #[test]
    fn blank_line_separates_hunks() {
        let patch = "*** Update File: a.rs\n@@ fn one\n-x\n+y\n\n@@ fn two\n-p\n+q\n";
        let parsed = parse(patch).unwrap();
        assert_eq!(parsed.hunks.len(), 2);
    }

    #[tokio::test]
    async fn locates_by_nested_context_and_preserves_suffix() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("user.py"), USER_PY).unwrap();

        let patch = "*** Update File: user.py\n@@ class User\n@@ def validate\n-        return True\n+        if not self.email:\n+            raise ValueError(\"missing email\")\n+        return True\n";
        SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch}))
            .await
            .unwrap();

        let result = std::fs::read_to_string(tmp.path().join("user.py")).unwrap();
        assert!(result.contains("raise ValueError(\"missing email\")"));
        // Bytes after the patched method are untouched.
        assert!(result.ends_with("class Admin:\n    pass\n"));
    }

    #[tokio::test]
    async fn missing_context_marker_is_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("user.py"), USER_PY).unwrap();

        let patch = "*** Update File: user.py\n@@ class Ghost\n-x\n+y\n";
        let err = SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::PatchFailed);
        assert!(err.message.contains("context marker not found: class Ghost"));
    }

    #[tokio::test]
    async fn removal_matching_is_whitespace_tolerant() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("user.py"), USER_PY).unwrap();

        // Removal line trimmed differently from the file's indentation.
        let patch = "*** Update File: user.py\n@@ def validate\n-return True\n+        return bool(self.email)\n";
        SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch}))
            .await
            .unwrap();
        let result = std::fs::read_to_string(tmp.path().join("user.py")).unwrap();
        assert!(result.contains("return bool(self.email)"));
        assert!(!result.contains("return True"));
    }

    #[tokio::test]
    async fn empty_removal_inserts_after_context() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn main() {\n    body();\n}\n").unwrap();

        let patch = "*** Update File: a.rs\n@@ fn main() {\n+    setup();\n";
        SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch}))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.rs")).unwrap(),
            "fn main() {\n    setup();\n    body();\n}\n"
        );
    }

    #[tokio::test]
    async fn sequential_hunks_see_prior_edits() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("m.rs"),
            "fn alpha() {\n    a();\n}\n\nfn beta() {\n    b();\n}\n",
        )
        .unwrap();

        let patch = "*** Update File: m.rs\n@@ fn alpha() {\n-    a();\n+    a2();\n\n@@ fn beta() {\n-    b();\n+    b2();\n";
        SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch}))
            .await
            .unwrap();
        let result = std::fs::read_to_string(tmp.path().join("m.rs")).unwrap();
        assert!(result.contains("a2();"));
        assert!(result.contains("b2();"));
    }

    #[tokio::test]
    async fn dry_run_returns_patched_text() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn f() {\n    x();\n}\n").unwrap();

        let patch = "*** Update File: a.rs\n@@ fn f() {\n-    x();\n+    y();\n";
        let out = SemanticPatchTool
            .execute(&ctx(&tmp), json!({"patch": patch, "dry_run": true}))
            .await
            .unwrap();
        assert!(out["patched_text"].as_str().unwrap().contains("y();"));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.rs")).unwrap(),
            "fn f() {\n    x();\n}\n"
        );
    }
}
