use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::RecoveryError;

/// `<VOLUME>:<path>` locator resolved by the volume manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumePath {
    volume: String,
    path: String,
}

impl VolumePath {
    pub fn parse(raw: &str) -> Result<Self, RecoveryError> {
        let invalid = |reason: &str| RecoveryError::InvalidVolumePath {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let (volume, path) = raw
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' volume separator"))?;
        if volume.is_empty() {
            return Err(invalid("volume name must not be empty"));
        }
        if !volume
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
        {
            return Err(invalid("volume name must be upper-case ASCII"));
        }
        validated_relative_path(path).map_err(invalid)?;

        Ok(Self {
            volume: volume.to_string(),
            path: path.to_string(),
        })
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Path relative to the volume root; empty for the root itself.
    pub fn relative_path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn under(&self, root: &Path) -> PathBuf {
        if self.path.is_empty() {
            return root.to_path_buf();
        }
        root.join(&self.path)
    }
}

impl fmt::Display for VolumePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.path)
    }
}

fn validated_relative_path(path: &str) -> Result<(), &'static str> {
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("path must not contain '..'"),
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the volume root")
            }
        }
    }
    Ok(())
}
