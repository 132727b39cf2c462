//! Hands control back to the main system.
//!
//! Steps run in a fixed order and each one is best effort. Clearing the
//! control block comes only after the intent and logs were attempted, so an
//! interruption before that point re-enters recovery and resumes. Calling
//! `finish` again after a completed run changes nothing durable.

use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rescue_core::ControlBlock;
use rescue_installer::{remove_file_if_exists, sync_directory, sync_file, VolumeManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{ControlBlockStore, SessionPaths};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReport {
    pub intent_written: bool,
    pub log_copied: bool,
    pub log_bytes_copied: u64,
    pub control_block_cleared: bool,
    pub command_file_removed: bool,
    pub synced: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogOffsetFile {
    offset: u64,
}

pub struct CompletionProtocol<'a> {
    store: &'a mut dyn ControlBlockStore,
    volumes: &'a mut dyn VolumeManager,
    paths: &'a SessionPaths,
}

impl<'a> CompletionProtocol<'a> {
    pub fn new(
        store: &'a mut dyn ControlBlockStore,
        volumes: &'a mut dyn VolumeManager,
        paths: &'a SessionPaths,
    ) -> Self {
        Self {
            store,
            volumes,
            paths,
        }
    }

    pub fn finish(&mut self, send_intent: Option<&str>) -> CompletionReport {
        let mut report = CompletionReport::default();
        let mut files_to_sync = Vec::new();
        let mut dirs_to_sync = Vec::new();

        if let Some(intent) = send_intent {
            match self.write_intent(intent) {
                Ok(path) => {
                    report.intent_written = true;
                    files_to_sync.push(path);
                }
                Err(err) => warn!(error = %format!("{err:#}"), "can't write intent"),
            }
        }

        match self.copy_new_log() {
            Ok((path, copied)) => {
                report.log_copied = true;
                report.log_bytes_copied = copied;
                if path.exists() {
                    files_to_sync.push(path);
                }
            }
            Err(err) => warn!(error = %format!("{err:#}"), "can't copy session log"),
        }

        report.control_block_cleared = self.store.write(&ControlBlock::default());

        match self.remove_command_file() {
            Ok((removed, dir)) => {
                report.command_file_removed = true;
                if removed {
                    info!(file = %self.paths.command_file, "removed command file");
                }
                if dir.is_dir() {
                    dirs_to_sync.push(dir);
                }
            }
            Err(err) => warn!(
                error = %format!("{err:#}"),
                file = %self.paths.command_file,
                "can't remove command file"
            ),
        }

        report.synced = true;
        for path in &files_to_sync {
            if let Err(err) = sync_file(path) {
                warn!(error = %err, path = %path.display(), "sync failed");
                report.synced = false;
            }
        }
        for dir in &dirs_to_sync {
            if let Err(err) = sync_directory(dir) {
                warn!(error = %err, path = %dir.display(), "directory sync failed");
                report.synced = false;
            }
        }

        debug!(?report, "completion finished");
        report
    }

    fn write_intent(&mut self, intent: &str) -> Result<PathBuf> {
        let path = self.volumes.resolve(&self.paths.intent_file)?;
        ensure_parent(&path)?;
        fs::write(&path, intent)
            .with_context(|| format!("failed to write intent file: {}", path.display()))?;
        Ok(path)
    }

    /// Appends what the temporary log gained since the last copy.
    fn copy_new_log(&mut self) -> Result<(PathBuf, u64)> {
        let log_path = self.volumes.resolve(&self.paths.log_file)?;
        let offset_path = self.paths.log_offset_path();
        let temporary_log = &self.paths.temporary_log;

        let mut source = match fs::File::open(temporary_log) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %temporary_log.display(), "no temporary log");
                return Ok((log_path, 0));
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to open temporary log: {}", temporary_log.display())
                });
            }
        };

        let len = source
            .metadata()
            .with_context(|| format!("failed to stat temporary log: {}", temporary_log.display()))?
            .len();
        let mut offset = read_log_offset(&offset_path);
        if offset > len {
            warn!(offset, len, "temporary log shrank; copying from the start");
            offset = 0;
        }
        if offset == len {
            return Ok((log_path, 0));
        }

        source
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("failed to seek temporary log: {}", temporary_log.display()))?;
        ensure_parent(&log_path)?;
        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file: {}", log_path.display()))?;
        let copied = io::copy(&mut source, &mut log)
            .with_context(|| format!("failed to append log file: {}", log_path.display()))?;
        log.flush()
            .with_context(|| format!("failed to flush log file: {}", log_path.display()))?;

        write_log_offset(&offset_path, offset + copied)?;
        Ok((log_path, copied))
    }

    /// Returns whether a file was removed and the directory to sync.
    fn remove_command_file(&mut self) -> Result<(bool, PathBuf)> {
        let path = self.volumes.resolve(&self.paths.command_file)?;
        let removed = remove_file_if_exists(&path)
            .with_context(|| format!("failed to unlink {}", path.display()))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((removed, dir))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn read_log_offset(path: &Path) -> u64 {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "log offset unreadable");
            return 0;
        }
    };
    match serde_json::from_str::<LogOffsetFile>(&raw) {
        Ok(state) => state.offset,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "log offset invalid");
            0
        }
    }
}

fn write_log_offset(path: &Path, offset: u64) -> Result<()> {
    let content = serde_json::to_string(&LogOffsetFile { offset })
        .context("failed to serialize log offset")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write log offset: {}", path.display()))
}
