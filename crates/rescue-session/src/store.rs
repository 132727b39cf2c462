use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rescue_core::{ControlBlock, RecoveryError, CONTROL_BLOCK_SIZE};
use tracing::{error, warn};

/// Durable slot for the control block.
///
/// Both directions are best effort. A failed read is the legitimate
/// "nothing pending" state; a failed write is logged and swallowed.
pub trait ControlBlockStore {
    fn read(&mut self) -> ControlBlock;

    /// Returns whether the record reached the medium.
    fn write(&mut self, block: &ControlBlock) -> bool;
}

/// Record stored at a byte offset of a raw partition or plain file.
#[derive(Debug, Clone)]
pub struct FileControlBlockStore {
    path: PathBuf,
    offset: u64,
}

impl FileControlBlockStore {
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_read(&self) -> Result<ControlBlock> {
        let mut file = fs::File::open(&self.path)
            .with_context(|| format!("failed to open control block: {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("failed to seek control block: {}", self.path.display()))?;
        let mut raw = [0_u8; CONTROL_BLOCK_SIZE];
        file.read_exact(&mut raw)
            .with_context(|| format!("failed to read control block: {}", self.path.display()))?;
        Ok(ControlBlock::from_bytes(&raw))
    }

    pub fn try_write(&self, block: &ControlBlock) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("failed to open control block: {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("failed to seek control block: {}", self.path.display()))?;
        file.write_all(&block.to_bytes())
            .with_context(|| format!("failed to write control block: {}", self.path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync control block: {}", self.path.display()))?;
        Ok(())
    }
}

impl ControlBlockStore for FileControlBlockStore {
    fn read(&mut self) -> ControlBlock {
        match self.try_read() {
            Ok(block) => block,
            Err(err) => {
                let err = RecoveryError::media_unreadable(
                    self.path.display().to_string(),
                    format!("{err:#}"),
                );
                warn!(error = %err, "using empty control block");
                ControlBlock::default()
            }
        }
    }

    fn write(&mut self, block: &ControlBlock) -> bool {
        match self.try_write(block) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %format!("{err:#}"), "control block write failed");
                false
            }
        }
    }
}
