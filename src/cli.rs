//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "quill",
    about = "Terminal coding agent with multi-provider LLM support",
    version
)]
pub struct Cli {
    /// Model to use: `provider/id`, a shorthand like `gemini/flash`, or a
    /// bare id resolved against the default provider.
    #[arg(long, short = 'm', default_value = "gemini/gemini-2.5-flash")]
    pub model: String,

    /// Workspace root; tools may not read or write outside it.
    #[arg(long, short = 'w')]
    pub workspace: Option<PathBuf>,

    /// Output format. `json` emits one structured event per line.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Session name; events are grouped per (user, session).
    #[arg(long, default_value = "default")]
    pub session: String,

    /// Run a single prompt non-interactively and exit.
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::parse_from(["quill"]);
        assert_eq!(cli.model, "gemini/gemini-2.5-flash");
        assert_eq!(cli.output, OutputFormat::Pretty);
        assert_eq!(cli.session, "default");
        assert!(cli.prompt.is_none());
    }

    #[test]
    fn json_single_prompt_mode() {
        let cli = Cli::parse_from([
            "quill", "--output", "json", "--prompt", "list files", "--model", "openai/gpt-4.1",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.prompt.as_deref(), Some("list files"));
        assert_eq!(cli.model, "openai/gpt-4.1");
    }
}
