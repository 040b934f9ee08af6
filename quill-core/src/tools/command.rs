//! Process execution tools.
//!
//! `execute_program` takes a program plus argv and never touches a shell,
//! so quoting is unambiguous; prefer it for model-issued commands.
//! `execute_command` hands a single string to `sh -c`, which is what makes
//! pipelines and redirection work.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::constants::{defaults, tools};

use super::error::{ToolError, ToolErrorKind};
use super::path::resolve_workspace_path;
use super::traits::{Tool, ToolCategory, ToolContext, parse_args};

#[derive(Debug, Deserialize)]
struct ExecuteCommandInput {
    /// Full shell command line; pipes and redirection are interpreted.
    command: String,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExecuteProgramInput {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

enum RunOutcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

struct RunResult {
    stdout: String,
    stderr: String,
    outcome: RunOutcome,
}

fn resolve_working_dir(
    ctx: &ToolContext,
    working_dir: Option<&str>,
) -> Result<PathBuf, ToolError> {
    match working_dir {
        Some(dir) => {
            let resolved = resolve_workspace_path(&ctx.workspace_root, dir)?;
            if !resolved.is_dir() {
                return Err(ToolError::invalid_input(format!(
                    "working_dir '{dir}' is not a directory"
                )));
            }
            Ok(resolved)
        }
        None => Ok(ctx.workspace_root.clone()),
    }
}

/// Kill the child's whole process group, falling back to the child alone.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child was spawned as its own group leader.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
    let _ = child.kill().await;
}

async fn run_process(
    ctx: &ToolContext,
    mut command: Command,
    timeout: Duration,
) -> Result<RunResult, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|err| ToolError::internal(format!("failed to spawn process: {err}")))?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buffer).await;
        }
        buffer
    });
    let stderr_task = tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buffer).await;
        }
        buffer
    });

    let outcome = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            terminate(&mut child).await;
            RunOutcome::Cancelled
        }
        waited = tokio::time::timeout(timeout, child.wait()) => match waited {
            Ok(Ok(status)) => RunOutcome::Exited(status),
            Ok(Err(err)) => {
                return Err(ToolError::internal(format!("failed to wait for process: {err}")));
            }
            Err(_) => {
                terminate(&mut child).await;
                RunOutcome::TimedOut
            }
        },
    };

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

    Ok(RunResult {
        stdout,
        stderr,
        outcome,
    })
}

fn run_result_to_value(
    display: &str,
    result: RunResult,
    timeout_secs: u64,
) -> Result<Value, ToolError> {
    match result.outcome {
        RunOutcome::Exited(status) => Ok(json!({
            "success": status.success(),
            "exit_code": status.code().unwrap_or(-1),
            "stdout": result.stdout,
            "stderr": result.stderr,
            "command": display,
        })),
        RunOutcome::TimedOut => Ok(json!({
            "success": false,
            "exit_code": -1,
            "stdout": result.stdout,
            "stderr": result.stderr,
            "command": display,
            "error": ToolErrorKind::ToolTimeout.as_str(),
            "message": format!("command exceeded its {timeout_secs}s timeout and was killed"),
        })),
        RunOutcome::Cancelled => Err(ToolError::internal("command cancelled")),
    }
}

/// Run a shell command line via `sh -c`.
pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &'static str {
        tools::EXECUTE_COMMAND
    }

    fn description(&self) -> &'static str {
        "Run a shell command line via 'sh -c'. Pipes and redirection work; prefer execute_program when no shell features are needed."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Execution
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
                "command": {"type": "string", "description": "Shell command line"},
                "working_dir": {"type": "string", "description": "Working directory (default: workspace root)"},
                "timeout_secs": {"type": "integer", "description": "Deadline in seconds (default 30)"},
            },
            "required": ["command"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ExecuteCommandInput = parse_args(args)?;
        if input.command.trim().is_empty() {
            return Err(ToolError::invalid_input("command must not be empty"));
        }

        let work_dir = resolve_working_dir(ctx, input.working_dir.as_deref())?;
        let timeout_secs = input
            .timeout_secs
            .unwrap_or(defaults::EXEC_TOOL_TIMEOUT_SECS);

        debug!(target: "quill::tools", command = %input.command, "executing shell command");

        let mut command = Command::new("sh");
        command.arg("-c").arg(&input.command).current_dir(&work_dir);

        let result = run_process(ctx, command, Duration::from_secs(timeout_secs)).await?;
        run_result_to_value(&input.command, result, timeout_secs)
    }
}

/// Run a program with an explicit argument vector, no shell involved.
pub struct ExecuteProgramTool;

#[async_trait]
impl Tool for ExecuteProgramTool {
    fn name(&self) -> &'static str {
        tools::EXECUTE_PROGRAM
    }

    fn description(&self) -> &'static str {
        "Run a program with an argument vector. No shell, no quoting ambiguity; redirection and pipes are not interpreted."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Execution
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
                "program": {"type": "string", "description": "Executable name or path"},
                "args": {"type": "array", "items": {"type": "string"}, "description": "Argument vector"},
                "working_dir": {"type": "string", "description": "Working directory (default: workspace root)"},
                "timeout_secs": {"type": "integer", "description": "Deadline in seconds (default 30)"},
            },
            "required": ["program"],
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let input: ExecuteProgramInput = parse_args(args)?;
        if input.program.trim().is_empty() {
            return Err(ToolError::invalid_input("program must not be empty"));
        }
        if input.program.contains(char::is_whitespace) {
            return Err(ToolError::invalid_input(
                "program name must not contain whitespace; pass arguments in args",
            ));
        }

        let work_dir = resolve_working_dir(ctx, input.working_dir.as_deref())?;
        let timeout_secs = input
            .timeout_secs
            .unwrap_or(defaults::EXEC_TOOL_TIMEOUT_SECS);

        let display_str = shell_words::join(
            std::iter::once(input.program.as_str()).chain(input.args.iter().map(String::as_str)),
        );
        debug!(target: "quill::tools", command = %display_str, "executing program");

        let mut command = Command::new(&input.program);
        command.args(&input.args).current_dir(&work_dir);

        let result = run_process(ctx, command, Duration::from_secs(timeout_secs)).await?;
        run_result_to_value(&display_str, result, timeout_secs)
    }
}
