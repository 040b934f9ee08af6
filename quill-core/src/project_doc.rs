//! Project instruction discovery.
//!
//! `AGENTS.md` files are collected from the user-global config directory,
//! the project root (located by walking up to a `.git` marker), and every
//! directory between root and the working directory, deepest last. The
//! concatenation feeds the system instruction; absence is not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::constants::defaults;
use crate::config::constants::instructions::{PROJECT_DOC_FILE, USER_CONFIG_DIR};

pub const PROJECT_DOC_SEPARATOR: &str = "\n\n--- project-doc ---\n\n";

#[derive(Debug, Clone)]
pub struct ProjectDocBundle {
    pub contents: String,
    pub sources: Vec<PathBuf>,
    pub truncated: bool,
    pub bytes_read: usize,
}

pub struct ProjectDocOptions<'a> {
    pub current_dir: &'a Path,
    pub home_dir: Option<&'a Path>,
    pub max_bytes: usize,
}

/// Discover and concatenate instruction files. Returns `None` when nothing
/// was found.
pub fn read_project_doc(cwd: &Path) -> Result<Option<ProjectDocBundle>> {
    let home = dirs::home_dir();
    read_project_doc_with_options(&ProjectDocOptions {
        current_dir: cwd,
        home_dir: home.as_deref(),
        max_bytes: defaults::PROJECT_DOC_MAX_BYTES,
    })
}

pub fn read_project_doc_with_options(
    options: &ProjectDocOptions<'_>,
) -> Result<Option<ProjectDocBundle>> {
    if options.max_bytes == 0 {
        return Ok(None);
    }

    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(home) = options.home_dir {
        candidates.push(home.join(USER_CONFIG_DIR).join(PROJECT_DOC_FILE));
    }

    let current = canonicalize_dir(options.current_dir)?;
    let root = resolve_project_root(&current);

    // Root first, then each directory down toward cwd: deepest last.
    let mut chain: Vec<PathBuf> = Vec::new();
    let mut cursor = current.clone();
    loop {
        chain.push(cursor.join(PROJECT_DOC_FILE));
        if cursor == root {
            break;
        }
        match cursor.parent() {
            Some(parent) => cursor = parent.to_path_buf(),
            None => break,
        }
    }
    chain.reverse();
    candidates.extend(chain);

    let mut contents = String::new();
    let mut sources = Vec::new();
    let mut bytes_read = 0usize;
    let mut truncated = false;

    for candidate in candidates {
        let Ok(raw) = std::fs::read_to_string(&candidate) else {
            continue;
        };
        let remaining = options.max_bytes.saturating_sub(bytes_read);
        if remaining == 0 {
            truncated = true;
            break;
        }

        let slice = if raw.len() > remaining {
            truncated = true;
            truncate_at_char_boundary(&raw, remaining)
        } else {
            raw.as_str()
        };

        if !contents.is_empty() {
            contents.push_str(PROJECT_DOC_SEPARATOR);
        }
        contents.push_str(slice);
        bytes_read += slice.len();
        sources.push(candidate);
    }

    if sources.is_empty() {
        return Ok(None);
    }

    Ok(Some(ProjectDocBundle {
        contents,
        sources,
        truncated,
        bytes_read,
    }))
}

fn truncate_at_char_boundary(text: &str, limit: usize) -> &str {
    let mut end = limit.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Walk upward looking for a `.git` marker; the filesystem root wins when
/// none exists.
fn resolve_project_root(cwd: &Path) -> PathBuf {
    let mut cursor = cwd.to_path_buf();
    loop {
        if cursor.join(".git").exists() {
            return cursor;
        }
        match cursor.parent() {
            Some(parent) => cursor = parent.to_path_buf(),
            None => return cursor,
        }
    }
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("failed to canonicalize {}", path.display()))
}
