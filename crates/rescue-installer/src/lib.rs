mod fs_utils;
mod installer;
mod subprocess;
mod volumes;

pub use fs_utils::{clear_directory, remove_file_if_exists, sync_directory, sync_file};
pub use installer::{CommandInstaller, InstallStatus, PackageInstaller};
pub use subprocess::{expand_placeholders, CommandRunner, ExitOutcome};
pub use volumes::{ConfiguredVolumes, VolumeManager};
