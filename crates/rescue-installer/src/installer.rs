use std::path::Path;

use tracing::{error, info, warn};

use crate::{CommandRunner, ExitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Success,
    Error,
    /// The installer did not exit on its own.
    Aborted,
}

/// Verifies and applies an update package.
pub trait PackageInstaller {
    fn install(&mut self, package: &Path, on_tick: &mut dyn FnMut()) -> InstallStatus;
}

/// Hands the package to an external installer program.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: Vec<String>,
    runner: CommandRunner,
}

impl CommandInstaller {
    pub fn new(command: Vec<String>, runner: CommandRunner) -> Self {
        Self { command, runner }
    }
}

impl PackageInstaller for CommandInstaller {
    fn install(&mut self, package: &Path, on_tick: &mut dyn FnMut()) -> InstallStatus {
        if !package.is_file() {
            warn!(package = %package.display(), "update package not found");
            return InstallStatus::Error;
        }

        let mut argv = self.command.clone();
        argv.push(package.display().to_string());
        info!(package = %package.display(), "installing update package");

        match self.runner.run(&argv, on_tick) {
            Ok(ExitOutcome::Success) => InstallStatus::Success,
            Ok(ExitOutcome::Failed(code)) => {
                error!(code, "installer reported failure");
                InstallStatus::Error
            }
            Ok(ExitOutcome::Terminated) => {
                error!("installer terminated without exit status");
                InstallStatus::Aborted
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "installer could not run");
                InstallStatus::Error
            }
        }
    }
}
