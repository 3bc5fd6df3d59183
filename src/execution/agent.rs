//! Workload Runners
//!
//! The engine never talks to the synchronization service directly. Leaf
//! steps go through a [`WorkloadRunner`], which starts one run profile of a
//! named management agent and reports a status string.
//!
//! Two runners are provided:
//! - [`CommandRunner`]: runs a configured command line per invocation
//! - [`DryRunRunner`]: only logs what would run

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::configuration::AgentCommand;
use crate::error::RemoteExecutionError;

/// Timestamp format passed to the `clear_runs` command.
const CLEAR_RUNS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Invokes workloads on behalf of leaf steps.
///
/// Implementations are shared by every thread of a run and must be
/// callable concurrently.
pub trait WorkloadRunner: Send + Sync {
    /// Runs `profile` on the management agent `agent` and returns its status.
    fn execute(&self, agent: &str, profile: &str) -> Result<String, RemoteExecutionError>;

    /// Best-effort request to stop every running agent.
    fn stop_all(&self) -> Result<(), RemoteExecutionError> {
        Ok(())
    }

    /// Deletes run history recorded before `before`.
    fn clear_runs(&self, before: DateTime<Utc>) -> Result<String, RemoteExecutionError> {
        debug!("Run history clearing not supported, skipping (before {})", before);
        Ok("not supported".to_string())
    }
}

/// Runs management agents through an external command line.
///
/// # Example
///
/// ```rust,no_run
/// use sequencer::configuration::AgentCommand;
/// use sequencer::execution::{CommandRunner, WorkloadRunner};
///
/// let runner = CommandRunner::new(AgentCommand {
///     run: vec!["agent-cli".into(), "run".into(), "{agent}".into(), "{profile}".into()],
///     stop: None,
///     clear_runs: None,
/// });
/// let status = runner.execute("HR", "Delta Import");
/// ```
#[derive(Debug, Clone)]
pub struct CommandRunner {
    commands: AgentCommand,
    working_dir: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(commands: AgentCommand) -> Self {
        Self {
            commands,
            working_dir: None,
        }
    }

    /// Sets the directory commands are started in.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn invoke(
        &self,
        target: &str,
        template: &[String],
        substitutions: &[(&str, &str)],
    ) -> Result<String, RemoteExecutionError> {
        let args = render_command(template, substitutions);
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| RemoteExecutionError::new(target, "command line is empty"))?;

        let output = run_command(program, rest, self.working_dir.as_deref())
            .map_err(|e| RemoteExecutionError::new(target, format!("{}: {}", program, e)))?;

        interpret_output(target, &output)
    }
}

impl WorkloadRunner for CommandRunner {
    fn execute(&self, agent: &str, profile: &str) -> Result<String, RemoteExecutionError> {
        self.invoke(
            agent,
            &self.commands.run,
            &[("{agent}", agent), ("{profile}", profile)],
        )
    }

    fn stop_all(&self) -> Result<(), RemoteExecutionError> {
        match &self.commands.stop {
            Some(template) => {
                let status = self.invoke("stop", template, &[])?;
                info!("Stop request finished with status '{}'", status);
                Ok(())
            }
            None => {
                warn!("No stop command configured, stop request ignored");
                Ok(())
            }
        }
    }

    fn clear_runs(&self, before: DateTime<Utc>) -> Result<String, RemoteExecutionError> {
        match &self.commands.clear_runs {
            Some(template) => {
                let date = before.format(CLEAR_RUNS_DATE_FORMAT).to_string();
                self.invoke("clear_runs", template, &[("{before}", &date)])
            }
            None => Ok("not configured".to_string()),
        }
    }
}

/// Substitutes placeholders in every argument of a command template.
fn render_command(template: &[String], substitutions: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            substitutions
                .iter()
                .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
        })
        .collect()
}

fn run_command(program: &str, args: &[String], working_dir: Option<&Path>) -> std::io::Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
        debug!("Executing '{}' in directory: {}", program, dir.display());
    }

    cmd.output()
}

/// Maps a finished process to a status string or an error.
fn interpret_output(target: &str, output: &Output) -> Result<String, RemoteExecutionError> {
    let stdout = String::from_utf8_lossy(&output.stdout);

    if output.status.success() {
        let status = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or("success");
        return Ok(status.to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = match stderr.trim() {
        "" => format!("exit code {:?}", output.status.code()),
        text => text.to_string(),
    };
    if !stdout.trim().is_empty() {
        debug!("stdout of '{}':\n{}", target, stdout);
    }

    Err(RemoteExecutionError::new(target, message))
}

/// Logs invocations without running anything.
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner;

impl WorkloadRunner for DryRunRunner {
    fn execute(&self, agent: &str, profile: &str) -> Result<String, RemoteExecutionError> {
        info!("[DRY RUN] Management agent '{}' with profile '{}'", agent, profile);
        Ok("dry-run".to_string())
    }

    fn clear_runs(&self, before: DateTime<Utc>) -> Result<String, RemoteExecutionError> {
        info!(
            "[DRY RUN] Clear run history before {}",
            before.format(CLEAR_RUNS_DATE_FORMAT)
        );
        Ok("dry-run".to_string())
    }
}
