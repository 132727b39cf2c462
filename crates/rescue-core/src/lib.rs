mod config;
mod control_block;
mod error;
mod flags;
mod volume_path;

pub use config::{
    ArgLimits, ControlBlockConfig, InstallerConfig, Locations, PlatformConfig, RecoveryConfig,
    VolumeConfig, DEFAULT_CONFIG_PATH,
};
pub use control_block::{
    ControlBlock, FixedField, BOOT_RECOVERY_COMMAND, COMMAND_FIELD_LEN, CONTROL_BLOCK_SIZE,
    RECOVERY_FIELD_LEN, RECOVERY_MARKER, STATUS_FIELD_LEN,
};
pub use error::RecoveryError;
pub use flags::{parse_recovery_flags, ParsedFlags, RecoveryFlags, RequestedOperation};
pub use volume_path::VolumePath;

#[cfg(test)]
mod tests;
