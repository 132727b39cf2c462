//! Fixed-layout record shared with the boot firmware.
//!
//! The firmware reads this record before anything else runs, so it is the
//! only state that reliably survives a reset in the middle of a destructive
//! operation. Layout: `command[32] | status[32] | recovery[1024]`, no padding.

use std::borrow::Cow;

pub const COMMAND_FIELD_LEN: usize = 32;
pub const STATUS_FIELD_LEN: usize = 32;
pub const RECOVERY_FIELD_LEN: usize = 1024;
pub const CONTROL_BLOCK_SIZE: usize = COMMAND_FIELD_LEN + STATUS_FIELD_LEN + RECOVERY_FIELD_LEN;

/// Firmware command that re-enters the recovery environment on next boot.
pub const BOOT_RECOVERY_COMMAND: &str = "boot-recovery";

/// First token of an encoded `recovery` field.
pub const RECOVERY_MARKER: &str = "recovery";

const ERASED_BYTE: u8 = 0xFF;

/// NUL-terminated byte field of fixed width.
///
/// A first byte of `0x00` or `0xFF` (erased flash) both mean "empty".
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedField<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for FixedField<N> {
    fn default() -> Self {
        Self { bytes: [0; N] }
    }
}

impl<const N: usize> std::fmt::Debug for FixedField<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("FixedField(<empty>)");
        }
        write!(f, "FixedField({:?})", self.as_text())
    }
}

impl<const N: usize> FixedField<N> {
    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    pub fn from_text(text: &str) -> Self {
        let mut field = Self::default();
        field.set(text);
        field
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.bytes.first(), None | Some(&0) | Some(&ERASED_BYTE))
    }

    /// Text up to the first NUL. The final byte always terminates.
    pub fn as_text(&self) -> Cow<'_, str> {
        if self.is_empty() {
            return Cow::Borrowed("");
        }
        let limit = N.saturating_sub(1);
        let end = self.bytes[..limit]
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(limit);
        String::from_utf8_lossy(&self.bytes[..end])
    }

    /// Stores at most `N - 1` bytes of `text` and zero-fills the rest.
    pub fn set(&mut self, text: &str) {
        self.bytes = [0; N];
        let len = text.len().min(N.saturating_sub(1));
        self.bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlBlock {
    pub command: FixedField<COMMAND_FIELD_LEN>,
    pub status: FixedField<STATUS_FIELD_LEN>,
    pub recovery: FixedField<RECOVERY_FIELD_LEN>,
}

impl ControlBlock {
    pub fn from_bytes(raw: &[u8; CONTROL_BLOCK_SIZE]) -> Self {
        let mut command = [0_u8; COMMAND_FIELD_LEN];
        let mut status = [0_u8; STATUS_FIELD_LEN];
        let mut recovery = [0_u8; RECOVERY_FIELD_LEN];

        let (command_raw, rest) = raw.split_at(COMMAND_FIELD_LEN);
        let (status_raw, recovery_raw) = rest.split_at(STATUS_FIELD_LEN);
        command.copy_from_slice(command_raw);
        status.copy_from_slice(status_raw);
        recovery.copy_from_slice(recovery_raw);

        Self {
            command: FixedField::from_bytes(command),
            status: FixedField::from_bytes(status),
            recovery: FixedField::from_bytes(recovery),
        }
    }

    pub fn to_bytes(&self) -> [u8; CONTROL_BLOCK_SIZE] {
        let mut raw = [0_u8; CONTROL_BLOCK_SIZE];
        let (command_raw, rest) = raw.split_at_mut(COMMAND_FIELD_LEN);
        let (status_raw, recovery_raw) = rest.split_at_mut(STATUS_FIELD_LEN);
        command_raw.copy_from_slice(self.command.as_bytes());
        status_raw.copy_from_slice(self.status.as_bytes());
        recovery_raw.copy_from_slice(self.recovery.as_bytes());
        raw
    }

    pub fn is_zeroed(&self) -> bool {
        self.to_bytes().iter().all(|byte| *byte == 0)
    }

    /// Non-empty newline-separated tokens of the `recovery` field.
    pub fn recovery_tokens(&self) -> Vec<String> {
        self.recovery
            .as_text()
            .split('\n')
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Points the firmware back at recovery with `args` as the command line.
    ///
    /// `args` excludes position 0; the marker takes that slot. Only whole
    /// arguments are stored: encoding stops at the first one that would not
    /// fit, and the number stored is returned. `status` is firmware-owned and
    /// left untouched.
    pub fn checkpoint<S: AsRef<str>>(&mut self, args: &[S]) -> usize {
        let capacity = RECOVERY_FIELD_LEN - 1;
        let mut encoded = format!("{RECOVERY_MARKER}\n");
        let mut stored = 0;
        for arg in args {
            let arg = arg.as_ref();
            if encoded.len() + arg.len() + 1 > capacity {
                break;
            }
            encoded.push_str(arg);
            encoded.push('\n');
            stored += 1;
        }
        self.command.set(BOOT_RECOVERY_COMMAND);
        self.recovery.set(&encoded);
        stored
    }
}
