use rescue_core::{parse_recovery_flags, RecoveryError, RequestedOperation, VolumePath};
use rescue_installer::{InstallStatus, PackageInstaller, VolumeManager};
use tracing::{error, info, warn};

use crate::{Console, ResolvedCommand};

pub const DATA_VOLUME: &str = "DATA";
pub const CACHE_VOLUME: &str = "CACHE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Success,
    InstallError,
    Aborted,
}

impl SessionOutcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub outcome: SessionOutcome,
    /// Passed through untouched to the completion protocol.
    pub send_intent: Option<String>,
}

/// Runs the destructive operation a resolved command asks for.
pub struct OperationOrchestrator<'a> {
    volumes: &'a mut dyn VolumeManager,
    installer: &'a mut dyn PackageInstaller,
    console: &'a mut dyn Console,
}

impl<'a> OperationOrchestrator<'a> {
    pub fn new(
        volumes: &'a mut dyn VolumeManager,
        installer: &'a mut dyn PackageInstaller,
        console: &'a mut dyn Console,
    ) -> Self {
        Self {
            volumes,
            installer,
            console,
        }
    }

    pub fn run(&mut self, command: &ResolvedCommand) -> OperationReport {
        info!(command = %quoted(command.tokens()), "Command");

        let parsed = parse_recovery_flags(command.tokens());
        for token in &parsed.rejected {
            warn!(token = %token, "invalid command argument");
        }
        if let Some(reason) = &parsed.parse_error {
            warn!(reason = %reason, "command line rejected");
        }
        if let Some(previous_runs) = parsed.flags.previous_runs {
            info!(previous_runs, "earlier recovery attempts");
        }

        let outcome = match parsed.flags.operation() {
            RequestedOperation::InstallPackage(locator) => self.install_package(&locator),
            RequestedOperation::Wipe { data, cache } => self.wipe(data, cache),
            RequestedOperation::Nothing => {
                warn!(error = %RecoveryError::NoOperationRequested, "nothing to do");
                self.console.print("No command specified.");
                SessionOutcome::InstallError
            }
        };

        if !outcome.is_success() {
            self.console.show_error();
        }
        OperationReport {
            outcome,
            send_intent: parsed.flags.send_intent,
        }
    }

    pub fn install_package(&mut self, locator: &str) -> SessionOutcome {
        let Self {
            volumes,
            installer,
            console,
        } = self;

        console.print(&format!("Installing update from {locator}..."));
        let package = match VolumePath::parse(locator) {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "bad update package locator");
                console.print("Installation aborted.");
                return SessionOutcome::InstallError;
            }
        };
        let package_path = match volumes.resolve(&package) {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "update package volume unavailable");
                console.print(&format!("Can't mount {}:", package.volume()));
                console.print("Installation aborted.");
                return SessionOutcome::InstallError;
            }
        };

        console.start_progress("install");
        let status = installer.install(&package_path, &mut || console.tick_progress());
        console.end_progress();

        match status {
            InstallStatus::Success => {
                info!(package = %package, "update installed");
                console.print("Install complete.");
                SessionOutcome::Success
            }
            InstallStatus::Error => {
                let err = RecoveryError::operation_failed("install", format!("{package} failed"));
                error!(error = %err, "install failed");
                console.print("Installation aborted.");
                SessionOutcome::InstallError
            }
            InstallStatus::Aborted => {
                error!(package = %package, "installer aborted");
                console.print("Installation aborted.");
                SessionOutcome::Aborted
            }
        }
    }

    /// Formats DATA then CACHE. Every requested volume is attempted even
    /// after an earlier one fails.
    pub fn wipe(&mut self, data: bool, cache: bool) -> SessionOutcome {
        let mut outcome = SessionOutcome::Success;
        for (requested, volume) in [(data, DATA_VOLUME), (cache, CACHE_VOLUME)] {
            if requested && !self.erase(volume) {
                outcome = SessionOutcome::InstallError;
            }
        }

        if outcome.is_success() {
            self.console.print("Data wipe complete.");
        } else {
            self.console.print("Data wipe failed.");
        }
        outcome
    }

    fn erase(&mut self, volume: &str) -> bool {
        let Self {
            volumes, console, ..
        } = self;

        console.print(&format!("Formatting {volume}:..."));
        console.start_progress("format");
        let result = volumes.format(volume, &mut || console.tick_progress());
        console.end_progress();

        match result {
            Ok(()) => true,
            Err(err) => {
                error!(volume, error = %err, "format failed");
                false
            }
        }
    }
}

fn quoted(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| format!("{token:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}
