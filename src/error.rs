// ABOUTME: Application-wide error types for dockproc.
// ABOUTME: Every failure names the lifecycle step it came from.

use crate::retry::RetryError;
use crate::runtime::{ClientError, ConnectionError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Daemon call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PullImage,
    CreateContainer,
    StartContainer,
    AttachContainer,
    CreateExec,
    StartExec,
    InspectContainer,
    RemoveContainer,
    RemoveImage,
    CopyToContainer,
    CreateVolume,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::PullImage => "pull image",
            Operation::CreateContainer => "create container",
            Operation::StartContainer => "start container",
            Operation::AttachContainer => "attach container",
            Operation::CreateExec => "create exec",
            Operation::StartExec => "start exec",
            Operation::InspectContainer => "inspect container",
            Operation::RemoveContainer => "remove container",
            Operation::RemoveImage => "remove image",
            Operation::CopyToContainer => "copy to container",
            Operation::CreateVolume => "create volume",
        };
        f.write_str(name)
    }
}

/// Sub-failures of packaging and copying a file into a container.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to open file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to get file stat of {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write tar archive for {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy file to the container: {0}")]
    Copy(#[source] ClientError),
}

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid machine descriptor or run configuration.
    Configuration,
    /// The daemon client could not be built.
    Connection,
    /// The daemon rejected a call.
    Remote,
    /// A retried call ran out of attempts.
    RetryExhausted,
    Upload,
    /// Cleanup was attempted while the container was still running.
    StillRunning,
    /// The requested execution could not be prepared.
    Execution,
    /// A lifecycle method was called out of order.
    InvalidState,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no machine configured to reach the docker daemon")]
    MissingMachine,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("failed to {op}: {source}")]
    Remote {
        op: Operation,
        #[source]
        source: ClientError,
    },

    #[error("failed to {op} after {budget} retries: {source}")]
    RetryExhausted {
        op: Operation,
        budget: u32,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("container {0} is still running")]
    StillRunning(String),

    #[error("failed to open your script file {path}: {source}")]
    ScriptOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid execution: {0}")]
    InvalidExecution(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn remote(op: Operation, source: ClientError) -> Self {
        Error::Remote { op, source }
    }

    /// Wrap the outcome of a retried call.
    pub fn retried(op: Operation, err: RetryError<ClientError>) -> Self {
        match err {
            RetryError::Failed(source) => Error::Remote { op, source },
            RetryError::Exhausted { budget, last } => Error::RetryExhausted {
                op,
                budget,
                source: last,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingMachine
            | Error::InvalidConfig(_)
            | Error::ConfigNotFound(_)
            | Error::MissingEnvVar(_)
            | Error::Yaml(_) => ErrorKind::Configuration,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Error::Upload(_) => ErrorKind::Upload,
            Error::StillRunning(_) => ErrorKind::StillRunning,
            Error::ScriptOpen { .. } | Error::InvalidExecution(_) => ErrorKind::Execution,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// The operation a daemon-side failure came from.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Remote { op, .. } | Error::RetryExhausted { op, .. } => Some(*op),
            Error::Upload(UploadError::Copy(_)) => Some(Operation::CopyToContainer),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
