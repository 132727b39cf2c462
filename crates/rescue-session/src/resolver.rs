//! Picks the command line for this boot and checkpoints it.
//!
//! Sources, highest precedence first: process arguments, the control
//! block's `recovery` field, the command file. Exactly one source wins; they
//! are never merged. A control block holding only the marker does not count. Whatever wins is written back to the control block
//! before anything destructive runs, so a reset from here on re-enters
//! recovery with the same command.

use std::fs;
use std::io::{self, BufRead, BufReader};

use rescue_core::{ArgLimits, ControlBlock, RecoveryError, VolumePath, RECOVERY_MARKER};
use rescue_installer::VolumeManager;
use tracing::{debug, info, warn};

use crate::ControlBlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSource {
    Process,
    ControlBlock,
    CommandFile,
    None,
}

impl ArgumentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::ControlBlock => "control-block",
            Self::CommandFile => "command-file",
            Self::None => "none",
        }
    }
}

/// Position 0 is the program identity; the rest are flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    tokens: Vec<String>,
    source: ArgumentSource,
}

impl ResolvedCommand {
    pub fn new(tokens: Vec<String>, source: ArgumentSource) -> Self {
        Self { tokens, source }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn program(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or(RECOVERY_MARKER)
    }

    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    pub fn source(&self) -> ArgumentSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.args().is_empty()
    }

    fn truncate_args(&mut self, len: usize) {
        self.tokens.truncate(len + 1);
    }
}

pub struct ArgumentResolver<'a> {
    store: &'a mut dyn ControlBlockStore,
    volumes: &'a mut dyn VolumeManager,
    command_file: &'a VolumePath,
    limits: ArgLimits,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(
        store: &'a mut dyn ControlBlockStore,
        volumes: &'a mut dyn VolumeManager,
        command_file: &'a VolumePath,
        limits: ArgLimits,
    ) -> Self {
        Self {
            store,
            volumes,
            command_file,
            limits,
        }
    }

    pub fn resolve(&mut self, process_args: &[String]) -> ResolvedCommand {
        let mut block = self.store.read();
        if !block.command.is_empty() {
            info!(command = %block.command.as_text(), "boot command");
        }
        if !block.status.is_empty() {
            info!(status = %block.status.as_text(), "boot status");
        }

        let program = process_args
            .first()
            .cloned()
            .unwrap_or_else(|| RECOVERY_MARKER.to_string());

        let mut command = if process_args.len() > 1 {
            ResolvedCommand::new(self.bounded(process_args.iter().cloned()), ArgumentSource::Process)
        } else if let Some(tokens) = self.from_control_block(&block) {
            ResolvedCommand::new(tokens, ArgumentSource::ControlBlock)
        } else if let Some(lines) = self.from_command_file() {
            let tokens = self.bounded(std::iter::once(program).chain(lines));
            ResolvedCommand::new(tokens, ArgumentSource::CommandFile)
        } else {
            ResolvedCommand::new(vec![program], ArgumentSource::None)
        };
        info!(
            source = command.source().as_str(),
            args = command.args().len(),
            "resolved recovery arguments"
        );

        let stored = block.checkpoint(command.args());
        if stored < command.args().len() {
            for dropped in &command.args()[stored..] {
                warn!(
                    arg = %dropped,
                    "argument does not fit in the control block; dropped"
                );
            }
            command.truncate_args(stored);
        }
        if !self.store.write(&block) {
            warn!("checkpoint not persisted; an interruption will not resume this command");
        }
        command
    }

    fn from_control_block(&self, block: &ControlBlock) -> Option<Vec<String>> {
        if block.recovery.is_empty() {
            return None;
        }

        let tokens = block.recovery_tokens();
        if tokens.first().map(String::as_str) == Some(RECOVERY_MARKER) {
            if tokens.len() == 1 {
                debug!("boot message carries no arguments");
                return None;
            }
            return Some(self.bounded(tokens.into_iter()));
        }

        let preview: String = block.recovery.as_text().chars().take(20).collect();
        let err = RecoveryError::MalformedControlBlock { preview };
        warn!(error = %err, "ignoring boot message");
        None
    }

    fn from_command_file(&mut self) -> Option<Vec<String>> {
        let path = match self.volumes.resolve(self.command_file) {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, file = %self.command_file, "command file volume unavailable");
                return None;
            }
        };
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.command_file, "no command file");
                return None;
            }
            Err(err) => {
                warn!(error = %err, file = %self.command_file, "command file unreadable");
                return None;
            }
        };

        let max_lines = self.limits.max_args.saturating_sub(1);
        let mut lines = Vec::new();
        for line in BufReader::new(file).split(b'\n') {
            if lines.len() >= max_lines {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, file = %self.command_file, "command file read failed");
                    break;
                }
            };
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        info!(file = %self.command_file, lines = lines.len(), "read command file");
        Some(lines)
    }

    fn bounded(&self, tokens: impl Iterator<Item = String>) -> Vec<String> {
        tokens
            .take(self.limits.max_args)
            .map(|token| truncate_token(token, self.limits.max_arg_length))
            .collect()
    }
}

fn truncate_token(mut token: String, max_len: usize) -> String {
    if token.len() > max_len {
        let mut end = max_len;
        while !token.is_char_boundary(end) {
            end -= 1;
        }
        token.truncate(end);
    }
    token
}
