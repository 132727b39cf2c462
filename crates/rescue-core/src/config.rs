use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::VolumePath;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/recovery.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub control_block: ControlBlockConfig,
    pub limits: ArgLimits,
    pub locations: Locations,
    pub installer: InstallerConfig,
    pub platform: PlatformConfig,
    pub volumes: Vec<VolumeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlBlockConfig {
    /// Raw partition or file holding the record.
    pub path: PathBuf,
    pub offset: u64,
}

/// Bounds on a resolved command. `max_args` counts position 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgLimits {
    pub max_args: usize,
    pub max_arg_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locations {
    pub command_file: String,
    pub intent_file: String,
    pub log_file: String,
    pub temporary_log: PathBuf,
    pub default_package: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Program and leading arguments; the package path is appended.
    pub command: Vec<String>,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub reboot_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    pub mount_point: PathBuf,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub mount_command: Option<Vec<String>>,
    #[serde(default)]
    pub unmount_command: Option<Vec<String>>,
    #[serde(default)]
    pub format_command: Option<Vec<String>>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            control_block: ControlBlockConfig::default(),
            limits: ArgLimits::default(),
            locations: Locations::default(),
            installer: InstallerConfig::default(),
            platform: PlatformConfig::default(),
            volumes: default_volumes(),
        }
    }
}

impl Default for ControlBlockConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/block/misc"),
            offset: 0,
        }
    }
}

impl Default for ArgLimits {
    fn default() -> Self {
        Self {
            max_args: 100,
            max_arg_length: 4096,
        }
    }
}

impl Default for Locations {
    fn default() -> Self {
        Self {
            command_file: "CACHE:recovery/command".to_string(),
            intent_file: "CACHE:recovery/intent".to_string(),
            log_file: "CACHE:recovery/log".to_string(),
            temporary_log: PathBuf::from("/tmp/recovery.log"),
            default_package: "SDCARD:update.zip".to_string(),
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            command: vec!["/sbin/update-binary".to_string()],
            poll_interval_ms: 250,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            reboot_command: vec!["/sbin/reboot".to_string()],
        }
    }
}

fn default_volumes() -> Vec<VolumeConfig> {
    [
        ("DATA", "/data", "/dev/block/userdata"),
        ("CACHE", "/cache", "/dev/block/cache"),
        ("SDCARD", "/sdcard", "/dev/block/mmcblk0p1"),
        ("SYSTEM", "/system", "/dev/block/system"),
    ]
    .into_iter()
    .map(|(name, mount_point, device)| VolumeConfig {
        name: name.to_string(),
        mount_point: PathBuf::from(mount_point),
        device: Some(device.to_string()),
        mount_command: None,
        unmount_command: None,
        format_command: None,
    })
    .collect()
}

impl RecoveryConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse recovery config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file means built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read recovery config: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid recovery config: {}", path.display()))
    }

    /// Never fails: a broken config falls back to defaults and the error is
    /// handed back for logging once logging is up.
    pub fn load_or_default(path: &Path) -> (Self, Option<anyhow::Error>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    pub fn volume(&self, name: &str) -> Option<&VolumeConfig> {
        self.volumes.iter().find(|volume| volume.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.limits.max_args < 1 {
            return Err(anyhow!("limits.max_args must be at least 1"));
        }
        if self.limits.max_arg_length < 1 {
            return Err(anyhow!("limits.max_arg_length must be at least 1"));
        }
        for (field, raw) in [
            ("locations.command_file", &self.locations.command_file),
            ("locations.intent_file", &self.locations.intent_file),
            ("locations.log_file", &self.locations.log_file),
            ("locations.default_package", &self.locations.default_package),
        ] {
            VolumePath::parse(raw).with_context(|| format!("invalid {field}"))?;
        }
        let mut seen = std::collections::HashSet::new();
        for volume in &self.volumes {
            if !seen.insert(volume.name.as_str()) {
                return Err(anyhow!("duplicate volume declaration '{}'", volume.name));
            }
        }
        if self.installer.command.is_empty() {
            return Err(anyhow!("installer.command must not be empty"));
        }
        Ok(())
    }
}
