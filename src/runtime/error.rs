// ABOUTME: Error types for the daemon client capability.
// ABOUTME: Separates connection setup failures from rejected daemon calls.

/// A daemon call that failed after a client was obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("daemon returned status {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl ClientError {
    /// HTTP status the daemon answered with, when there was an answer.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::Conflict(_) => Some(409),
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Transport(_) | ClientError::Stream(_) => None,
        }
    }
}

/// Failure to construct a client for a machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid API version {0:?}, expected MAJOR.MINOR")]
    InvalidVersion(String),

    #[error("failed to create client for {host:?}: {reason}")]
    Client { host: String, reason: String },
}
