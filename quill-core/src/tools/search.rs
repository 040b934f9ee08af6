//! Search tools: glob file search and regex content grep.

use async_trait::async_trait;
use glob::Pattern;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::constants::{defaults, tools};

use super::error::ToolError;
use super::path::resolve_workspace_path;
use super::traits::{Tool, ToolCategory, ToolContext, parse_args};

fn default_max_results() -> usize {
    defaults::SEARCH_MAX_RESULTS
}

#[derive(Debug, Deserialize)]
struct SearchFilesInput {
    path: String,
    /// Glob supporting `*` and `?`, matched against the path relative to
    /// the search root.
    pattern: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

/// Find files by glob pattern.
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &'static str {
        tools::SEARCH_FILES
    }

    fn description(&self) -> &'static str {
        "Find files under a root whose relative path matches a glob pattern (* and ? wildcards)."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn priority(&self) -> u8 {
        10
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Root directory to search"},
                "pattern": {"type": "string", "description": "Glob pattern, e.g. '*.rs' or 'src/**/*.toml'"},
                "max_results": {"type": "integer", "description": "Result cap (default 100)"},
            },
            "required": ["path", "pattern"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: SearchFilesInput = parse_args(args)?;
        let root = resolve_workspace_path(&ctx.workspace_root, &input.path)?;
        let pattern = Pattern::new(&input.pattern)
            .map_err(|err| ToolError::invalid_input(format!("bad glob pattern: {err}")))?;

        let mut matches = Vec::new();
        let mut scanned = 0usize;
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            if matches.len() >= input.max_results {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                // Traversal continues past unreadable entries.
                Err(err) => {
                    debug!(target: "quill::tools", %err, "skipping unreadable entry");
                    continue;
                }
            };
            scanned += 1;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let relative_str = relative.to_string_lossy();
            let file_name = entry.file_name().to_string_lossy();
            if pattern.matches(&relative_str) || pattern.matches(&file_name) {
                matches.push(json!(entry.path().to_string_lossy()));
            }
        }

        if scanned == 0 {
            return Err(ToolError::file_not_found(&input.path));
        }

        Ok(json!({
            "success": true,
            "matches": matches,
            "count": matches.len(),
        }))
    }
}

fn default_case_sensitive() -> bool {
    false
}

#[derive(Debug, Deserialize)]
struct GrepInput {
    path: String,
    pattern: String,
    /// When false the pattern is matched as a literal substring.
    #[serde(default)]
    regex: bool,
    #[serde(default = "default_case_sensitive")]
    case_sensitive: bool,
    /// Optional glob restricting which files are scanned.
    #[serde(default)]
    file_glob: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

/// Search file contents. An empty result set is a success, not an error.
pub struct GrepSearchTool;

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &'static str {
        tools::GREP_SEARCH
    }

    fn description(&self) -> &'static str {
        "Search file contents for a pattern (literal by default, regex on request). Returns file, 1-indexed line, and matching text."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn priority(&self) -> u8 {
        20
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File or directory to search"},
                "pattern": {"type": "string", "description": "Pattern to find"},
                "regex": {"type": "boolean", "description": "Treat pattern as a regular expression (default false)"},
                "case_sensitive": {"type": "boolean", "description": "Case-sensitive matching (default false)"},
                "file_glob": {"type": "string", "description": "Only scan files whose name matches this glob"},
                "max_results": {"type": "integer", "description": "Result cap (default 100)"},
            },
            "required": ["path", "pattern"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: GrepInput = parse_args(args)?;
        let root = resolve_workspace_path(&ctx.workspace_root, &input.path)?;

        let pattern_source = if input.regex {
            input.pattern.clone()
        } else {
            regex::escape(&input.pattern)
        };
        let matcher = RegexBuilder::new(&pattern_source)
            .case_insensitive(!input.case_sensitive)
            .build()
            .map_err(|err| ToolError::invalid_input(format!("bad pattern: {err}")))?;

        let file_glob = match &input.file_glob {
            Some(raw) => Some(
                Pattern::new(raw)
                    .map_err(|err| ToolError::invalid_input(format!("bad file glob: {err}")))?,
            ),
            None => None,
        };

        if !root.exists() {
            return Err(ToolError::file_not_found(&input.path));
        }

        let mut hits = Vec::new();
        let mut truncated = false;
        'walk: for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(target: "quill::tools", %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(glob) = &file_glob {
                let name = entry.file_name().to_string_lossy();
                if !glob.matches(&name) {
                    continue;
                }
            }

            // Binary files fail UTF-8 decoding and are skipped.
            let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                continue;
            };
            for (index, line) in content.lines().enumerate() {
                if matcher.is_match(line) {
                    hits.push(json!({
                        "file": entry.path().to_string_lossy(),
                        "line": index + 1,
                        "content": line,
                    }));
                    if hits.len() >= input.max_results {
                        truncated = true;
                        break 'walk;
                    }
                }
            }
        }

        Ok(json!({
            "success": true,
            "matches": hits,
            "count": hits.len(),
            "truncated": truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(tmp: &TempDir) -> ToolContext {
        ToolContext::new(tmp.path().to_path_buf())
    }

    fn seed(tmp: &TempDir) {
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(tmp.path().join("src/lib.rs"), "pub fn add() {}\nfn main_helper() {}\n")
            .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "Main notes\n").unwrap();
    }

    #[tokio::test]
    async fn glob_finds_by_extension() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = SearchFilesTool
            .execute(&ctx(&tmp), json!({"path": ".", "pattern": "*.rs"}))
            .await
            .unwrap();
        assert_eq!(out["count"], 2);
    }

    #[tokio::test]
    async fn glob_respects_max_results() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = SearchFilesTool
            .execute(
                &ctx(&tmp),
                json!({"path": ".", "pattern": "*.rs", "max_results": 1}),
            )
            .await
            .unwrap();
        assert_eq!(out["count"], 1);
    }

    #[tokio::test]
    async fn grep_is_case_insensitive_by_default() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = GrepSearchTool
            .execute(&ctx(&tmp), json!({"path": ".", "pattern": "main"}))
            .await
            .unwrap();
        // Matches fn main, main_helper, and "Main notes".
        assert_eq!(out["count"], 3);
    }

    #[tokio::test]
    async fn grep_case_sensitive_and_glob_filter() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = GrepSearchTool
            .execute(
                &ctx(&tmp),
                json!({
                    "path": ".",
                    "pattern": "main",
                    "case_sensitive": true,
                    "file_glob": "*.rs",
                }),
            )
            .await
            .unwrap();
        assert_eq!(out["count"], 2);
    }

    #[tokio::test]
    async fn grep_regex_mode() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = GrepSearchTool
            .execute(
                &ctx(&tmp),
                json!({"path": "src", "pattern": r"fn \w+\(\)", "regex": true}),
            )
            .await
            .unwrap();
        assert_eq!(out["count"], 3);
        assert_eq!(out["matches"][0]["line"], 1);
    }

    #[tokio::test]
    async fn grep_empty_result_is_success() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);

        let out = GrepSearchTool
            .execute(&ctx(&tmp), json!({"path": ".", "pattern": "nonexistent_token"}))
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["count"], 0);
    }
}
