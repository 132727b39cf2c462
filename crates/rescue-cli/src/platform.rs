use anyhow::{bail, Result};
use rescue_installer::{CommandRunner, ExitOutcome};
use tracing::info;

/// Device-level actions outside the recovery environment's own state.
pub(crate) trait Platform {
    fn reboot(&mut self) -> Result<()>;
}

/// Reboots by running a configured program.
pub(crate) struct CommandPlatform {
    reboot_command: Vec<String>,
    runner: CommandRunner,
}

impl CommandPlatform {
    pub(crate) fn new(reboot_command: Vec<String>, runner: CommandRunner) -> Self {
        Self {
            reboot_command,
            runner,
        }
    }
}

impl Platform for CommandPlatform {
    fn reboot(&mut self) -> Result<()> {
        info!(command = ?self.reboot_command, "Rebooting...");
        match self.runner.run(&self.reboot_command, &mut || {})? {
            ExitOutcome::Success => Ok(()),
            ExitOutcome::Failed(code) => bail!("reboot command exited with {code}"),
            ExitOutcome::Terminated => bail!("reboot command was terminated"),
        }
    }
}
