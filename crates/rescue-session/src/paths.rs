use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rescue_core::{Locations, VolumePath};

/// Durable locations of a session, parsed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub command_file: VolumePath,
    pub intent_file: VolumePath,
    pub log_file: VolumePath,
    pub default_package: VolumePath,
    pub temporary_log: PathBuf,
}

impl SessionPaths {
    pub fn from_locations(locations: &Locations) -> Result<Self> {
        let parse = |field: &str, raw: &str| {
            VolumePath::parse(raw).with_context(|| format!("invalid location {field}"))
        };
        Ok(Self {
            command_file: parse("command_file", &locations.command_file)?,
            intent_file: parse("intent_file", &locations.intent_file)?,
            log_file: parse("log_file", &locations.log_file)?,
            default_package: parse("default_package", &locations.default_package)?,
            temporary_log: locations.temporary_log.clone(),
        })
    }

    /// Sidecar holding how much of the temporary log was already copied.
    pub fn log_offset_path(&self) -> PathBuf {
        let mut raw = OsString::from(self.temporary_log.as_os_str());
        raw.push(".offset");
        PathBuf::from(raw)
    }
}
