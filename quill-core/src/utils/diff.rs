//! Line-based unified diff rendering for previews.

/// Options for rendering.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Unchanged lines shown around the change.
    pub context: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context: crate::config::constants::defaults::PREVIEW_CONTEXT_LINES,
        }
    }
}

/// Render a unified diff between two texts as a single hunk covering the
/// changed region (common prefix and suffix trimmed). Returns an empty
/// string when the texts are identical.
pub fn unified_diff(old_text: &str, new_text: &str, options: DiffOptions) -> String {
    if old_text == new_text {
        return String::new();
    }

    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();

    let mut prefix = 0;
    while prefix < old_lines.len()
        && prefix < new_lines.len()
        && old_lines[prefix] == new_lines[prefix]
    {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old_lines.len().saturating_sub(prefix)
        && suffix < new_lines.len().saturating_sub(prefix)
        && old_lines[old_lines.len() - 1 - suffix] == new_lines[new_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let context_start = prefix.saturating_sub(options.context);
    let old_change_end = old_lines.len() - suffix;
    let new_change_end = new_lines.len() - suffix;
    let old_context_end = (old_change_end + options.context).min(old_lines.len());

    let old_count = old_context_end - context_start;
    let new_count = (new_change_end + (old_context_end - old_change_end)) - context_start;

    let mut out = String::new();
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        context_start + 1,
        old_count,
        context_start + 1,
        new_count,
    ));

    for line in &old_lines[context_start..prefix] {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    for line in &old_lines[prefix..old_change_end] {
        out.push('-');
        out.push_str(line);
        out.push('\n');
    }
    for line in &new_lines[prefix..new_change_end] {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    for line in &old_lines[old_change_end..old_context_end] {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }

    out
}
