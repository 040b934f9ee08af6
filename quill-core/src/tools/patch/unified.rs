//! Unified-diff application.
//!
//! Accepts both `@@ -o,c +n,c @@` and the single-line `@@ -o +n @@` hunk
//! header shape; `---`/`+++` file headers are tolerated and skipped. Hunks
//! apply left-to-right with a running offset from prior hunks. In strict
//! mode every context line must equal the file line at its computed
//! position; in non-strict mode context is advisory and changes land at the
//! computed offsets.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::constants::tools;

use super::super::error::ToolError;
use super::super::file_ops::atomic_write;
use super::super::path::resolve_workspace_path;
use super::super::traits::{Tool, ToolCategory, ToolContext, parse_args};

#[derive(Debug, Clone, PartialEq)]
enum PatchLine {
    Context(String),
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    lines: Vec<PatchLine>,
}

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    // Count fields are optional: "@@ -12,3 +14,4 @@" and "@@ -12 +14 @@".
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

fn parse_patch(patch: &str) -> Result<Vec<Hunk>, ToolError> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for (number, raw_line) in patch.lines().enumerate() {
        if raw_line.starts_with("--- ") || raw_line.starts_with("+++ ") {
            continue;
        }
        if raw_line.starts_with("diff ") || raw_line.starts_with("index ") {
            continue;
        }

        if let Some(captures) = HUNK_HEADER.captures(raw_line) {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let old_start: usize = captures[1]
                .parse()
                .map_err(|_| ToolError::patch_failed("invalid hunk header"))?;
            current = Some(Hunk {
                old_start,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            if raw_line.trim().is_empty() {
                continue;
            }
            return Err(ToolError::patch_failed(format!(
                "line {}: expected a hunk header before '{raw_line}'",
                number + 1
            )));
        };

        if raw_line.starts_with('\\') {
            // "\ No newline at end of file" markers carry no content.
            continue;
        }

        match raw_line.chars().next() {
            Some(' ') => hunk.lines.push(PatchLine::Context(raw_line[1..].to_string())),
            Some('+') => hunk.lines.push(PatchLine::Add(raw_line[1..].to_string())),
            Some('-') => hunk.lines.push(PatchLine::Remove(raw_line[1..].to_string())),
            None => hunk.lines.push(PatchLine::Context(String::new())),
            Some(_) => {
                return Err(ToolError::patch_failed(format!(
                    "line {}: unexpected patch line '{raw_line}'",
                    number + 1
                )));
            }
        }
    }

    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    if hunks.is_empty() {
        return Err(ToolError::patch_failed("patch contains no hunks"));
    }
    Ok(hunks)
}

#[derive(Debug)]
struct ApplyOutcome {
    lines: Vec<String>,
    added: usize,
    removed: usize,
}

fn apply_hunks(
    original: &[String],
    hunks: &[Hunk],
    strict: bool,
) -> Result<ApplyOutcome, ToolError> {
    let mut lines: Vec<String> = original.to_vec();
    let mut offset: i64 = 0;
    let mut added = 0usize;
    let mut removed = 0usize;

    for hunk in hunks {
        let base = if hunk.old_start == 0 {
            0
        } else {
            hunk.old_start - 1
        };
        let position = base as i64 + offset;
        if position < 0 {
            return Err(ToolError::patch_failed(format!(
                "hunk at line {} underflows the file",
                hunk.old_start
            )));
        }
        let mut cursor = position as usize;
        let mut replacement: Vec<String> = Vec::new();
        let splice_start = cursor;
        let mut consumed = 0usize;

        for line in &hunk.lines {
            match line {
                PatchLine::Context(expected) => {
                    if cursor >= lines.len() {
                        return Err(ToolError::patch_failed(format!(
                            "context line '{expected}' extends past end of file"
                        )));
                    }
                    if strict && lines[cursor] != *expected {
                        return Err(ToolError::patch_failed(format!(
                            "context mismatch at line {}: expected '{}', found '{}'",
                            cursor + 1,
                            expected,
                            lines[cursor]
                        ))
                        .with_suggestion(
                            "re-read the file and regenerate the patch against its current content",
                        ));
                    }
                    replacement.push(lines[cursor].clone());
                    cursor += 1;
                    consumed += 1;
                }
                PatchLine::Remove(expected) => {
                    if cursor >= lines.len() {
                        return Err(ToolError::patch_failed(format!(
                            "removal '{expected}' extends past end of file"
                        )));
                    }
                    if strict && lines[cursor] != *expected {
                        return Err(ToolError::patch_failed(format!(
                            "removal mismatch at line {}: expected '{}', found '{}'",
                            cursor + 1,
                            expected,
                            lines[cursor]
                        ))
                        .with_suggestion(
                            "re-read the file and regenerate the patch against its current content",
                        ));
                    }
                    cursor += 1;
                    consumed += 1;
                    removed += 1;
                }
                PatchLine::Add(text) => {
                    replacement.push(text.clone());
                    added += 1;
                }
            }
        }

        lines.splice(splice_start..splice_start + consumed, replacement.clone());
        offset += replacement.len() as i64 - consumed as i64;
    }

    Ok(ApplyOutcome {
        lines,
        added,
        removed,
    })
}

fn default_strict() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ApplyPatchInput {
    path: String,
    patch: String,
    #[serde(default)]
    dry_run: bool,
    #[serde(default = "default_strict")]
    strict: bool,
}

/// Apply a unified diff to one file.
pub struct ApplyPatchTool;

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &'static str {
        tools::APPLY_PATCH
    }

    fn description(&self) -> &'static str {
        "Apply a unified diff (@@ hunks with +/-/space lines) to a file. dry_run returns the patched text without writing."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeEdit
    }

    fn priority(&self) -> u8 {
        40
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Target file"},
                "patch": {"type": "string", "description": "Unified diff text"},
                "dry_run": {"type": "boolean", "description": "Return patched text without writing"},
                "strict": {"type": "boolean", "description": "Require context lines to match exactly (default true)"},
            },
            "required": ["path", "patch"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ApplyPatchInput = parse_args(args)?;
        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;
        let had_trailing_newline = original.ends_with('\n');
        let original_lines: Vec<String> = original.lines().map(String::from).collect();

        let hunks = parse_patch(&input.patch)?;
        let outcome = apply_hunks(&original_lines, &hunks, input.strict)?;

        let mut patched = outcome.lines.join("\n");
        if had_trailing_newline && !patched.is_empty() {
            patched.push('\n');
        }

        if input.dry_run {
            return Ok(json!({
                "success": true,
                "path": path.to_string_lossy(),
                "dry_run": true,
                "lines_added": outcome.added,
                "lines_removed": outcome.removed,
                "patched_text": patched,
            }));
        }

        atomic_write(&path, &patched).await?;

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "lines_added": outcome.added,
            "lines_removed": outcome.removed,
        }))
    }
}
