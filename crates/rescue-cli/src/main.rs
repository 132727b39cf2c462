mod fallback;
mod logging;
mod platform;
mod render;
mod session;

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rescue_core::{RecoveryConfig, DEFAULT_CONFIG_PATH};
use rescue_installer::{CommandInstaller, CommandRunner, ConfiguredVolumes};
use rescue_session::{FileControlBlockStore, SessionPaths};
use tracing::{info, warn};

use crate::platform::CommandPlatform;
use crate::render::{OutputStyle, TerminalConsole};
use crate::session::{RecoverySession, SessionContext};

const CONFIG_ENV_KEY: &str = "RESCUE_CONFIG";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_KEY)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

fn main() -> Result<()> {
    let process_args = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    let (config, config_error) = RecoveryConfig::load_or_default(&config_path());

    if let Err(err) = logging::init_logging(&config.locations.temporary_log) {
        eprintln!("recovery: {err:#}");
    }
    info!(timestamp = unix_timestamp(), args = ?process_args, "Starting recovery");
    if let Some(err) = config_error {
        warn!(error = %format!("{err:#}"), "using built-in configuration");
    }

    let paths = SessionPaths::from_locations(&config.locations)
        .context("configured locations are invalid")?;
    let runner = CommandRunner::new(Duration::from_millis(config.installer.poll_interval_ms))
        .with_output_log(config.locations.temporary_log.clone());

    let mut store =
        FileControlBlockStore::new(&config.control_block.path, config.control_block.offset);
    let mut volumes = ConfiguredVolumes::new(&config.volumes, runner.clone());
    let mut installer = CommandInstaller::new(config.installer.command.clone(), runner.clone());
    let mut platform = CommandPlatform::new(config.platform.reboot_command.clone(), runner);
    let mut console = TerminalConsole::new(OutputStyle::current(), std::io::stdin().lock());

    let end = RecoverySession::new(SessionContext {
        store: &mut store,
        volumes: &mut volumes,
        installer: &mut installer,
        console: &mut console,
        platform: &mut platform,
        paths: &paths,
        limits: config.limits,
    })
    .run(&process_args);

    info!(end = ?end, "recovery finished");
    Ok(())
}

#[cfg(test)]
mod tests;
