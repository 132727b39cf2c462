use rescue_core::ArgLimits;
use rescue_installer::{PackageInstaller, VolumeManager};
use rescue_session::{
    ArgumentResolver, ArgumentSource, CompletionProtocol, Console, ControlBlockStore,
    OperationOrchestrator, ResolvedCommand, SessionPaths,
};
use tracing::{debug, error, info};

use crate::fallback::{prompt_and_wait, FallbackExit};
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Start,
    ArgsResolved,
    OperationRunning,
    Succeeded,
    Failed,
    FailedInteractive,
    Finishing,
    Rebooting,
}

/// How the process leaves recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    Rebooted,
    /// Completed without rebooting, at the operator's request.
    Shell,
    /// Stopped without a reboot; the checkpoint decides the next boot.
    Halted,
}

/// Capabilities a session drives.
pub(crate) struct SessionContext<'a> {
    pub(crate) store: &'a mut dyn ControlBlockStore,
    pub(crate) volumes: &'a mut dyn VolumeManager,
    pub(crate) installer: &'a mut dyn PackageInstaller,
    pub(crate) console: &'a mut dyn Console,
    pub(crate) platform: &'a mut dyn Platform,
    pub(crate) paths: &'a SessionPaths,
    pub(crate) limits: ArgLimits,
}

pub(crate) struct RecoverySession<'a> {
    ctx: SessionContext<'a>,
    state: SessionState,
    /// Cleared only when the operator picks the shell.
    reboot_on_exit: bool,
    send_intent: Option<String>,
}

impl<'a> RecoverySession<'a> {
    pub(crate) fn new(ctx: SessionContext<'a>) -> Self {
        Self {
            ctx,
            state: SessionState::Start,
            reboot_on_exit: true,
            send_intent: None,
        }
    }

    pub(crate) fn run(mut self, process_args: &[String]) -> SessionEnd {
        let mut command: Option<ResolvedCommand> = None;

        loop {
            let next = match self.state {
                SessionState::Start => {
                    let ctx = &mut self.ctx;
                    command = Some(
                        ArgumentResolver::new(
                            ctx.store,
                            ctx.volumes,
                            &ctx.paths.command_file,
                            ctx.limits,
                        )
                        .resolve(process_args),
                    );
                    SessionState::ArgsResolved
                }
                SessionState::ArgsResolved => SessionState::OperationRunning,
                SessionState::OperationRunning => {
                    let ctx = &mut self.ctx;
                    let resolved = command
                        .take()
                        .unwrap_or_else(|| ResolvedCommand::new(Vec::new(), ArgumentSource::None));
                    let report =
                        OperationOrchestrator::new(ctx.volumes, ctx.installer, ctx.console)
                            .run(&resolved);
                    self.send_intent = report.send_intent;
                    if report.outcome.is_success() {
                        SessionState::Succeeded
                    } else {
                        info!(outcome = ?report.outcome, "operation failed");
                        SessionState::Failed
                    }
                }
                SessionState::Succeeded => SessionState::Finishing,
                SessionState::Failed => SessionState::FailedInteractive,
                SessionState::FailedInteractive => {
                    let ctx = &mut self.ctx;
                    match prompt_and_wait(
                        ctx.volumes,
                        ctx.installer,
                        ctx.console,
                        &ctx.paths.default_package,
                    ) {
                        FallbackExit::Reboot => SessionState::Finishing,
                        FallbackExit::Completed => SessionState::Succeeded,
                        FallbackExit::Shell => {
                            self.reboot_on_exit = false;
                            SessionState::Finishing
                        }
                        FallbackExit::InputClosed => {
                            info!("no operator; leaving checkpoint for the next boot");
                            return SessionEnd::Halted;
                        }
                    }
                }
                SessionState::Finishing => {
                    let ctx = &mut self.ctx;
                    CompletionProtocol::new(ctx.store, ctx.volumes, ctx.paths)
                        .finish(self.send_intent.as_deref());
                    if !self.reboot_on_exit {
                        info!("exiting to shell");
                        return SessionEnd::Shell;
                    }
                    SessionState::Rebooting
                }
                SessionState::Rebooting => {
                    return match self.ctx.platform.reboot() {
                        Ok(()) => SessionEnd::Rebooted,
                        Err(err) => {
                            error!(error = %format!("{err:#}"), "reboot failed");
                            SessionEnd::Halted
                        }
                    };
                }
            };

            debug!(from = ?self.state, to = ?next, "session transition");
            self.state = next;
        }
    }
}
