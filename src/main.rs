//! Quill binary: CLI glue over the `quill-core` engine.

mod cli;

use std::io::Write as _;
use std::io::{BufRead, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use quill_core::agent::{Agent, AgentEvent, TurnOutcome};
use quill_core::config::QuillConfig;
use quill_core::config::constants::env_vars;
use quill_core::llm::create_provider;
use quill_core::models::{Backend, ModelResolver};
use quill_core::project_doc::read_project_doc;
use quill_core::session::{InMemorySessionStore, SessionStore};
use quill_core::tools::builtin_registry;

use cli::{Cli, OutputFormat};

const DEFAULT_PROVIDER: &str = "gemini";

const BASE_SYSTEM_INSTRUCTION: &str = "You are Quill, a coding agent operating on the user's \
workspace through the declared tools. Read before you write, prefer targeted edits over full \
rewrites, and report what you changed.";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let workspace = match &cli.workspace {
        Some(dir) => dir
            .canonicalize()
            .with_context(|| format!("workspace '{}' not found", dir.display()))?,
        None => std::env::current_dir()?,
    };

    let config = QuillConfig::load_from_workspace(&workspace)?;

    let resolver = ModelResolver::default();
    let resolved = resolver.resolve_str(&cli.model, Some(DEFAULT_PROVIDER))?;
    let api_key = credential_for(resolved.descriptor.backend)?;
    let provider = create_provider(resolved.descriptor.backend, api_key, None)?;

    let store = InMemorySessionStore::new();
    let session = store.create("local", &cli.session).await?;
    let session_id = format!("local/{}", cli.session);

    let mut system_instruction = BASE_SYSTEM_INSTRUCTION.to_string();
    if let Some(bundle) = read_project_doc(&workspace)? {
        system_instruction.push_str("\n\n");
        system_instruction.push_str(&bundle.contents);
    }

    let mut agent = Agent::new(
        provider,
        resolved.descriptor.id.clone(),
        Arc::new(builtin_registry()),
        session,
        workspace.clone(),
    )
    .with_config(config.agent.clone())
    .with_compaction_config((&config.compaction).into())
    .with_system_instruction(system_instruction);

    agent = match cli.output {
        OutputFormat::Json => agent.with_event_sink(Arc::new(|event: &AgentEvent| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        })),
        OutputFormat::Plain | OutputFormat::Pretty => {
            agent.with_event_sink(Arc::new(|event: &AgentEvent| {
                if let AgentEvent::Message { delta, .. } = event {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
            }))
        }
    };

    if cli.output == OutputFormat::Json {
        let init = AgentEvent::Init {
            session_id,
            timestamp: chrono::Utc::now(),
            model: resolved.canonical(),
            workspace: workspace.display().to_string(),
        };
        println!("{}", serde_json::to_string(&init)?);
    }

    match &cli.prompt {
        Some(prompt) => run_single_prompt(&agent, prompt, cli.output).await,
        None => run_repl(&agent, cli.output).await,
    }
}

async fn run_single_prompt(agent: &Agent, prompt: &str, output: OutputFormat) -> Result<()> {
    let outcome = agent.run_turn(prompt, CancellationToken::new()).await?;
    finish_turn(&outcome, output);
    Ok(())
}

async fn run_repl(agent: &Agent, output: OutputFormat) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let stdin = std::io::stdin();

    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let outcome = agent.run_turn(line, CancellationToken::new()).await?;
        finish_turn(&outcome, output);
    }

    Ok(())
}

fn finish_turn(outcome: &TurnOutcome, output: OutputFormat) {
    match output {
        // JSON mode already emitted the result event through the sink.
        OutputFormat::Json => {}
        OutputFormat::Plain | OutputFormat::Pretty => match outcome {
            // Streamed text was printed by the sink; close the line.
            TurnOutcome::Completed { .. } => println!(),
            TurnOutcome::MaxStepsReached => println!("\n[maximum steps reached]"),
            TurnOutcome::Cancelled => println!("\n[cancelled]"),
        },
    }
}

/// Look up the credential for a backend, in the documented precedence.
fn credential_for(backend: Backend) -> Result<String> {
    let candidates: &[&str] = match backend {
        Backend::Gemini => &[env_vars::GOOGLE_API_KEY, env_vars::GEMINI_API_KEY],
        Backend::OpenAI => &[env_vars::OPENAI_API_KEY],
    };

    for name in candidates {
        if let Ok(value) = std::env::var(name) {
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }

    bail!("no API key for {backend}: set {}", candidates.join(" or "))
}
