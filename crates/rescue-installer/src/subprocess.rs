use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// How a blocking subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failed(i32),
    /// No exit code, e.g. killed by a signal.
    Terminated,
}

/// Runs external programs to completion, ticking while they work.
///
/// There is no timeout and no kill path: once a destructive program starts
/// it either finishes or the device loses power.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    poll_interval: Duration,
    output_log: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            output_log: None,
        }
    }

    /// Appends the child's stdout and stderr to `path` instead of inheriting.
    pub fn with_output_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_log = Some(path.into());
        self
    }

    pub fn run(&self, argv: &[String], on_tick: &mut dyn FnMut()) -> Result<ExitOutcome> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("command line must not be empty"))?;

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        if let Some(path) = &self.output_log {
            let log = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open command output log: {}", path.display()))?;
            let log_err = log
                .try_clone()
                .with_context(|| format!("failed to share command output log: {}", path.display()))?;
            command.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
        }

        debug!(program = %program, args = ?args, "spawning");
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {program}"))?;

        loop {
            let status = child
                .try_wait()
                .with_context(|| format!("failed waiting for {program}"))?;
            if let Some(status) = status {
                let outcome = match status.code() {
                    Some(0) => ExitOutcome::Success,
                    Some(code) => ExitOutcome::Failed(code),
                    None => ExitOutcome::Terminated,
                };
                debug!(program = %program, ?outcome, "process exited");
                return Ok(outcome);
            }
            on_tick();
            thread::sleep(self.poll_interval);
        }
    }
}

/// Substitutes `{name}` placeholders in every argument.
pub fn expand_placeholders(argv: &[String], values: &[(&str, &str)]) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            values
                .iter()
                .fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
        })
        .collect()
}
