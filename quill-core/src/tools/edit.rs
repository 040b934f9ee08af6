//! Targeted edit tools: text replacement and line-range edits.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::constants::tools;
use crate::utils::diff::{DiffOptions, unified_diff};

use super::error::{ToolError, ToolErrorKind};
use super::file_ops::atomic_write;
use super::path::resolve_workspace_path;
use super::traits::{Tool, ToolCategory, ToolContext, parse_args};

#[derive(Debug, Deserialize)]
struct ReplaceInput {
    path: String,
    old_text: String,
    new_text: String,
    #[serde(default)]
    max_replacements: Option<usize>,
}

/// Count matches and compute the replaced text. Falls back to interpreting
/// `\n`, `\t`, `\r` escapes in the needle when the literal form has no match.
fn plan_replacement(
    haystack: &str,
    old_text: &str,
    new_text: &str,
) -> Result<(String, usize, String), ToolError> {
    if old_text.is_empty() {
        return Err(ToolError::invalid_input("old_text must not be empty"));
    }

    let literal_count = haystack.matches(old_text).count();
    if literal_count > 0 {
        return Ok((
            haystack.replace(old_text, new_text),
            literal_count,
            old_text.to_string(),
        ));
    }

    let normalized = unescape(old_text);
    if normalized != old_text {
        let count = haystack.matches(&normalized).count();
        if count > 0 {
            return Ok((
                haystack.replace(&normalized, new_text),
                count,
                normalized,
            ));
        }
    }

    Err(ToolError::invalid_input(format!(
        "old_text not found in file (searched literally{})",
        if normalized != old_text {
            " and with escape sequences interpreted"
        } else {
            ""
        }
    ))
    .with_suggestion("read_file the relevant region and copy the exact text to replace"))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn check_replacement_budget(count: usize, max: Option<usize>) -> Result<(), ToolError> {
    if let Some(max) = max {
        if count > max {
            return Err(ToolError::invalid_input(format!(
                "{count} matches exceed max_replacements={max}; nothing was written"
            ))
            .with_suggestion(
                "preview the change with preview_replace, or narrow old_text to the intended site",
            ));
        }
    }
    Ok(())
}

/// Replace occurrences of a text fragment in one file.
pub struct ReplaceInFileTool;

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &'static str {
        tools::REPLACE_IN_FILE
    }

    fn description(&self) -> &'static str {
        "Replace exact text in a file. Falls back to interpreting escaped newlines and tabs in old_text when the literal form has no match."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeEdit
    }

    fn priority(&self) -> u8 {
        10
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "old_text": {"type": "string", "description": "Exact text to find"},
                "new_text": {"type": "string", "description": "Replacement text; must not be empty"},
                "max_replacements": {"type": "integer", "description": "Fail without writing when more matches exist"},
            },
            "required": ["path", "old_text", "new_text"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ReplaceInput = parse_args(args)?;
        if input.new_text.is_empty() {
            return Err(ToolError::new(
                ToolErrorKind::EmptyReplacement,
                "new_text must not be empty",
            )
            .with_suggestion("for intentional deletion use edit_lines with mode=delete"));
        }

        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;

        let (replaced, count, _) =
            plan_replacement(&original, &input.old_text, &input.new_text)?;
        check_replacement_budget(count, input.max_replacements)?;

        atomic_write(&path, &replaced).await?;

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "replacements": count,
        }))
    }
}

/// Read-only counterpart of `replace_in_file`: renders the unified-diff
/// preview of the change without writing.
pub struct PreviewReplaceTool;

#[async_trait]
impl Tool for PreviewReplaceTool {
    fn name(&self) -> &'static str {
        tools::PREVIEW_REPLACE
    }

    fn description(&self) -> &'static str {
        "Preview a text replacement as a unified diff without modifying the file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeEdit
    }

    fn priority(&self) -> u8 {
        20
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to preview against"},
                "old_text": {"type": "string", "description": "Exact text to find"},
                "new_text": {"type": "string", "description": "Replacement text"},
                "max_replacements": {"type": "integer", "description": "Report failure when more matches exist"},
            },
            "required": ["path", "old_text", "new_text"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ReplaceInput = parse_args(args)?;
        if input.new_text.is_empty() {
            return Err(ToolError::new(
                ToolErrorKind::EmptyReplacement,
                "new_text must not be empty",
            )
            .with_suggestion("for intentional deletion use edit_lines with mode=delete"));
        }

        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;

        let (replaced, count, _) =
            plan_replacement(&original, &input.old_text, &input.new_text)?;
        check_replacement_budget(count, input.max_replacements)?;

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "replacements": count,
            "diff": unified_diff(&original, &replaced, DiffOptions::default()),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum EditMode {
    #[default]
    Replace,
    Insert,
    Delete,
}

/// `new_lines` accepts either a newline-joined string or an explicit array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewLines {
    Text(String),
    List(Vec<String>),
}

impl NewLines {
    fn into_lines(self) -> Vec<String> {
        match self {
            NewLines::Text(text) => {
                if text.is_empty() {
                    Vec::new()
                } else {
                    text.split('\n').map(String::from).collect()
                }
            }
            NewLines::List(lines) => lines,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EditLinesInput {
    path: String,
    /// 1-indexed, inclusive.
    start_line: usize,
    /// 1-indexed, inclusive; must be >= start_line. Clipped to the file end.
    end_line: usize,
    #[serde(default)]
    new_lines: Option<NewLines>,
    #[serde(default)]
    mode: EditMode,
    #[serde(default)]
    preview: bool,
}

/// Line-range editor with replace, insert, and delete modes.
///
/// Line numbering rebases only within a single call; callers must refetch
/// line numbers after every edit.
pub struct EditLinesTool;

impl EditLinesTool {
    fn apply(
        lines: &[String],
        input_start: usize,
        input_end: usize,
        mode: EditMode,
        new_lines: Vec<String>,
    ) -> Result<Vec<String>, ToolError> {
        if input_start == 0 {
            return Err(ToolError::invalid_input("start_line is 1-indexed"));
        }
        if input_end < input_start {
            return Err(ToolError::invalid_input(
                "end_line must be >= start_line",
            ));
        }

        let total = lines.len();
        let end = input_end.min(total);

        match mode {
            EditMode::Insert => {
                // Insertion happens before start_line; start may be one past
                // the end to append.
                if input_start > total + 1 {
                    return Err(ToolError::invalid_input(format!(
                        "start_line {input_start} is beyond end of file ({total} lines)"
                    )));
                }
                let at = input_start - 1;
                let mut out = lines[..at].to_vec();
                out.extend(new_lines);
                out.extend_from_slice(&lines[at..]);
                Ok(out)
            }
            EditMode::Replace | EditMode::Delete => {
                if input_start > total {
                    return Err(ToolError::invalid_input(format!(
                        "start_line {input_start} is beyond end of file ({total} lines)"
                    )));
                }
                if mode == EditMode::Replace && new_lines.is_empty() {
                    return Err(ToolError::invalid_input(
                        "replace mode requires new_lines; use mode=delete to remove lines",
                    ));
                }
                let mut out = lines[..input_start - 1].to_vec();
                if mode == EditMode::Replace {
                    out.extend(new_lines);
                }
                out.extend_from_slice(&lines[end..]);
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl Tool for EditLinesTool {
    fn name(&self) -> &'static str {
        tools::EDIT_LINES
    }

    fn description(&self) -> &'static str {
        "Replace, insert before, or delete a 1-indexed inclusive line range. Set preview=true to see the diff without writing."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeEdit
    }

    fn priority(&self) -> u8 {
        30
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "start_line": {"type": "integer", "description": "First line of the range, 1-indexed"},
                "end_line": {"type": "integer", "description": "Last line of the range, inclusive"},
                "new_lines": {"type": "string", "description": "Replacement or inserted lines (newline-joined)"},
                "mode": {"type": "string", "enum": ["replace", "insert", "delete"], "description": "Edit mode (default replace)"},
                "preview": {"type": "boolean", "description": "Render the diff without writing"},
            },
            "required": ["path", "start_line", "end_line"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: EditLinesInput = parse_args(args)?;
        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;
        let had_trailing_newline = original.ends_with('\n');
        let lines: Vec<String> = original.lines().map(String::from).collect();

        let new_lines = input.new_lines.map(NewLines::into_lines).unwrap_or_default();
        let edited = Self::apply(
            &lines,
            input.start_line,
            input.end_line,
            input.mode,
            new_lines,
        )?;

        let mut updated = edited.join("\n");
        if had_trailing_newline && !updated.is_empty() {
            updated.push('\n');
        }

        let diff = unified_diff(&original, &updated, DiffOptions::default());

        if input.preview {
            return Ok(json!({
                "success": true,
                "path": path.to_string_lossy(),
                "preview": true,
                "diff": diff,
            }));
        }

        atomic_write(&path, &updated).await?;

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "lines_before": lines.len(),
            "lines_after": edited.len(),
            "diff": diff,
        }))
    }
}
