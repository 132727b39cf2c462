use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use rescue_core::{RecoveryError, VolumeConfig, VolumePath};
use tracing::{info, warn};

use crate::{clear_directory, expand_placeholders, CommandRunner, ExitOutcome};

/// Mounting and formatting of named logical volumes.
pub trait VolumeManager {
    /// Mounts `volume` if needed and returns its root.
    fn mount(&mut self, volume: &str) -> Result<PathBuf, RecoveryError>;

    fn unmount(&mut self, volume: &str) -> Result<(), RecoveryError>;

    /// Leaves the volume empty and unmounted.
    fn format(&mut self, volume: &str, on_tick: &mut dyn FnMut()) -> Result<(), RecoveryError>;

    fn resolve(&mut self, path: &VolumePath) -> Result<PathBuf, RecoveryError> {
        let root = self.mount(path.volume())?;
        Ok(path.under(&root))
    }
}

/// Volume table from configuration.
///
/// Volumes without mount commands are plain directories that are always
/// available; without a format command, formatting empties the directory.
#[derive(Debug)]
pub struct ConfiguredVolumes {
    volumes: BTreeMap<String, VolumeConfig>,
    mounted: BTreeSet<String>,
    runner: CommandRunner,
}

impl ConfiguredVolumes {
    pub fn new(volumes: &[VolumeConfig], runner: CommandRunner) -> Self {
        Self {
            volumes: volumes
                .iter()
                .map(|volume| (volume.name.clone(), volume.clone()))
                .collect(),
            mounted: BTreeSet::new(),
            runner,
        }
    }

    pub fn is_mounted(&self, volume: &str) -> bool {
        self.mounted.contains(volume)
    }

    fn config(&self, volume: &str) -> Result<&VolumeConfig, RecoveryError> {
        self.volumes
            .get(volume)
            .ok_or_else(|| RecoveryError::volume_unavailable(volume, "no such volume"))
    }

    fn run_volume_command(
        &self,
        config: &VolumeConfig,
        argv: &[String],
        on_tick: &mut dyn FnMut(),
    ) -> Result<(), String> {
        let mount_point = config.mount_point.display().to_string();
        let argv = expand_placeholders(
            argv,
            &[
                ("device", config.device.as_deref().unwrap_or_default()),
                ("mount_point", mount_point.as_str()),
            ],
        );
        match self.runner.run(&argv, on_tick) {
            Ok(ExitOutcome::Success) => Ok(()),
            Ok(ExitOutcome::Failed(code)) => Err(format!("{} exited with {code}", argv[0])),
            Ok(ExitOutcome::Terminated) => Err(format!("{} was terminated", argv[0])),
            Err(err) => Err(format!("{err:#}")),
        }
    }
}

impl VolumeManager for ConfiguredVolumes {
    fn mount(&mut self, volume: &str) -> Result<PathBuf, RecoveryError> {
        let config = self.config(volume)?;
        let mount_point = config.mount_point.clone();
        if self.mounted.contains(volume) {
            return Ok(mount_point);
        }

        fs::create_dir_all(&mount_point)
            .map_err(|err| RecoveryError::volume_unavailable(volume, err))?;
        if let Some(argv) = &config.mount_command {
            self.run_volume_command(config, argv, &mut || {})
                .map_err(|reason| RecoveryError::volume_unavailable(volume, reason))?;
        }

        self.mounted.insert(volume.to_string());
        info!(volume, mount_point = %mount_point.display(), "mounted");
        Ok(mount_point)
    }

    fn unmount(&mut self, volume: &str) -> Result<(), RecoveryError> {
        let config = self.config(volume)?;
        if !self.mounted.contains(volume) {
            return Ok(());
        }
        if let Some(argv) = &config.unmount_command {
            self.run_volume_command(config, argv, &mut || {})
                .map_err(|reason| RecoveryError::operation_failed(format!("unmount {volume}"), reason))?;
        }
        self.mounted.remove(volume);
        info!(volume, "unmounted");
        Ok(())
    }

    fn format(&mut self, volume: &str, on_tick: &mut dyn FnMut()) -> Result<(), RecoveryError> {
        self.unmount(volume)?;
        let config = self.config(volume)?;
        let operation = format!("format {volume}");

        match &config.format_command {
            Some(argv) => self
                .run_volume_command(config, argv, on_tick)
                .map_err(|reason| RecoveryError::operation_failed(&operation, reason))?,
            None => {
                fs::create_dir_all(&config.mount_point)
                    .map_err(|err| RecoveryError::volume_unavailable(volume, err))?;
                clear_directory(&config.mount_point, on_tick).map_err(|err| {
                    warn!(volume, error = %err, "in-place wipe failed");
                    RecoveryError::operation_failed(&operation, err)
                })?;
            }
        }

        info!(volume, "formatted");
        Ok(())
    }
}
