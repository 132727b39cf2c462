use thiserror::Error;

/// Failure taxonomy of a recovery session.
///
/// None of these end the process; callers downgrade each to a logged
/// condition plus a state transition or a default value.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("media unreadable: {target}: {reason}")]
    MediaUnreadable { target: String, reason: String },
    #[error("malformed control block: {preview:?}")]
    MalformedControlBlock { preview: String },
    #[error("volume unavailable: {volume}: {reason}")]
    VolumeUnavailable { volume: String, reason: String },
    #[error("operation failed: {operation}: {reason}")]
    OperationFailed { operation: String, reason: String },
    #[error("no operation requested")]
    NoOperationRequested,
    #[error("invalid volume path '{raw}': {reason}")]
    InvalidVolumePath { raw: String, reason: String },
}

impl RecoveryError {
    pub fn media_unreadable(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::MediaUnreadable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn volume_unavailable(volume: impl Into<String>, reason: impl ToString) -> Self {
        Self::VolumeUnavailable {
            volume: volume.into(),
            reason: reason.to_string(),
        }
    }

    pub fn operation_failed(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}
