//! File operation tools: read, write, and directory listing.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools};

use super::error::ToolError;
use super::path::resolve_workspace_path;
use super::traits::{Tool, ToolCategory, ToolContext, parse_args};

fn default_offset() -> usize {
    1
}

fn default_limit() -> usize {
    defaults::READ_LINE_LIMIT
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ReadInput {
    path: String,
    /// 1-indexed first line to return.
    #[serde(default = "default_offset")]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

/// Read a window of lines from a text file.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        tools::READ_FILE
    }

    fn description(&self) -> &'static str {
        "Read a file, optionally a 1-indexed line window. Returns content plus line totals and timestamps."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn priority(&self) -> u8 {
        10
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path, relative to the workspace root"},
                "offset": {"type": "integer", "description": "First line to return, 1-indexed (default 1)"},
                "limit": {"type": "integer", "description": "Maximum lines to return (default 1000)"},
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ReadInput = parse_args(args)?;
        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| ToolError::from_io(&err, &input.path))?;

        // Newline-split semantics: a trailing newline yields a final empty
        // line, so "hi\n" counts as two lines.
        let lines: Vec<&str> = raw.split('\n').collect();
        let total_lines = lines.len();

        // Offset 0 and offsets past the end both succeed with empty content.
        let (content, returned_lines, start_line) =
            if input.offset == 0 || input.offset > total_lines {
                (String::new(), 0, input.offset)
            } else {
                let start = input.offset - 1;
                let end = (start + input.limit).min(total_lines);
                (lines[start..end].join("\n"), end - start, input.offset)
            };

        Ok(json!({
            "success": true,
            "content": content,
            "total_lines": total_lines,
            "returned_lines": returned_lines,
            "start_line": start_line,
            "file_path": path.to_string_lossy(),
            "modified": timestamp(metadata.modified().ok()),
            "created": timestamp(metadata.created().ok()),
        }))
    }
}

fn timestamp(time: Option<std::time::SystemTime>) -> Value {
    match time {
        Some(time) => json!(DateTime::<Utc>::from(time).to_rfc3339()),
        None => Value::Null,
    }
}

#[derive(Debug, Deserialize)]
struct WriteInput {
    path: String,
    content: String,
    #[serde(default = "default_true")]
    create_dirs: bool,
    #[serde(default = "default_true")]
    atomic: bool,
    #[serde(default)]
    allow_size_reduce: bool,
}

/// Write a file, guarding against accidental truncation of large files.
pub struct WriteFileTool;

impl WriteFileTool {
    fn check_size_guard(
        existing_len: u64,
        new_len: usize,
        allow_size_reduce: bool,
    ) -> Result<(), ToolError> {
        if allow_size_reduce || existing_len <= defaults::SIZE_GUARD_MIN_BYTES {
            return Ok(());
        }
        let threshold = existing_len as f64 * defaults::SIZE_GUARD_RATIO;
        if (new_len as f64) < threshold {
            let reduction = 100.0 * (1.0 - new_len as f64 / existing_len as f64);
            return Err(ToolError::new(
                super::error::ToolErrorKind::SizeReductionRefused,
                format!(
                    "refusing to shrink file from {existing_len} to {new_len} bytes ({reduction:.1}% reduction)"
                ),
            )
            .with_suggestion(
                "if the truncation is intentional, retry with allow_size_reduce=true; \
                 otherwise use read_file and edit_lines to make a targeted change",
            ));
        }
        Ok(())
    }

}

/// Temp-file + fsync + rename; readers never see half a write. Shared by
/// every tool that mutates files.
pub(crate) async fn atomic_write(path: &Path, content: &str) -> Result<(), ToolError> {
    let parent = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let path = path.to_path_buf();
    let content = content.to_string();

    tokio::task::spawn_blocking(move || -> Result<(), ToolError> {
        use std::io::Write;

        let display = path.to_string_lossy().to_string();
        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|err| ToolError::from_io(&err, &display))?;
        temp.write_all(content.as_bytes())
            .map_err(|err| ToolError::from_io(&err, &display))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| ToolError::from_io(&err, &display))?;
        temp.persist(&path)
            .map_err(|err| ToolError::from_io(&err.error, &display))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644));
        }
        Ok(())
    })
    .await
    .map_err(|err| ToolError::internal(format!("write task failed: {err}")))?
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        tools::WRITE_FILE
    }

    fn description(&self) -> &'static str {
        "Write content to a file. Large files are protected against accidental truncation unless allow_size_reduce is set."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn priority(&self) -> u8 {
        20
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Target file path"},
                "content": {"type": "string", "description": "Full file content to write"},
                "create_dirs": {"type": "boolean", "description": "Create missing parent directories (default true)"},
                "atomic": {"type": "boolean", "description": "Write via temp file and rename (default true)"},
                "allow_size_reduce": {"type": "boolean", "description": "Permit shrinking an existing file below 10% of its size"},
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: WriteInput = parse_args(args)?;
        let path = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        let existing_len = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
        if let Some(existing_len) = existing_len {
            Self::check_size_guard(existing_len, input.content.len(), input.allow_size_reduce)?;
        }

        if input.create_dirs {
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    create_dirs_all(parent, &input.path).await?;
                }
            }
        }

        if input.atomic {
            atomic_write(&path, &input.content).await?;
        } else {
            tokio::fs::write(&path, &input.content)
                .await
                .map_err(|err| ToolError::from_io(&err, &input.path))?;
        }

        debug!(target: "quill::tools", path = %path.display(), bytes = input.content.len(), "wrote file");

        Ok(json!({
            "success": true,
            "path": path.to_string_lossy(),
            "bytes_written": input.content.len(),
            "replaced_existing": existing_len.is_some(),
        }))
    }
}

async fn create_dirs_all(parent: &Path, display: &str) -> Result<(), ToolError> {
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|err| ToolError::from_io(&err, display))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ListInput {
    path: String,
    #[serde(default)]
    recursive: bool,
}

/// List a directory, optionally recursively. Symlinks are not followed, so
/// traversal cannot wander outside the starting root.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &'static str {
        tools::LIST_DIR
    }

    fn description(&self) -> &'static str {
        "List directory entries with sizes. Set recursive=true to walk subdirectories."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn priority(&self) -> u8 {
        30
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"},
                "recursive": {"type": "boolean", "description": "Walk subdirectories (default false)"},
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ListInput = parse_args(args)?;
        let base = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        if !base.exists() {
            return Err(ToolError::file_not_found(&input.path));
        }
        if !base.is_dir() {
            return Err(ToolError::invalid_input(format!(
                "'{}' is not a directory",
                input.path
            )));
        }

        let max_depth = if input.recursive { usize::MAX } else { 1 };
        let mut items = Vec::new();
        for entry in WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                // Permission failures on individual entries do not abort the walk.
                Err(err) => {
                    debug!(target: "quill::tools", %err, "skipping unreadable entry");
                    continue;
                }
            };
            let metadata = entry.metadata().ok();
            items.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "path": entry.path().to_string_lossy(),
                "is_dir": entry.file_type().is_dir(),
                "size": metadata.map(|m| m.len()).unwrap_or(0),
            }));
        }

        Ok(json!({
            "success": true,
            "items": items,
            "count": items.len(),
        }))
    }
}
