// ABOUTME: Machine descriptors telling the core how to reach a Docker daemon.
// ABOUTME: Explicit configuration and an environment-sourced variant share one trait.

use super::bollard::BollardClient;
use super::client::DaemonClient;
use super::error::ConnectionError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the daemon endpoint.
pub const HOST_ENV: &str = "DOCKER_HOST";

/// Environment variable holding the TLS certificate directory.
pub const CERT_PATH_ENV: &str = "DOCKER_CERT_PATH";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// How to reach a daemon.
///
/// `connect` builds a fresh client each time it is called. Callers acquire
/// one per logical operation and drop it when the operation returns.
pub trait Machine: fmt::Debug + Send + Sync {
    /// Daemon endpoint, e.g. `tcp://10.0.0.5:2376` or `unix:///var/run/docker.sock`.
    /// Empty means the platform default socket.
    fn host(&self) -> &str;

    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`.
    fn cert_path(&self) -> Option<&Path>;

    /// API version as `MAJOR.MINOR`, empty for the client default.
    fn version(&self) -> &str;

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    fn connect(&self) -> Result<Box<dyn DaemonClient>, ConnectionError> {
        Ok(Box::new(BollardClient::connect(self)?))
    }
}

/// Explicitly configured machine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub version: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl MachineConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(path.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Machine for MachineConfig {
    fn host(&self) -> &str {
        &self.host
    }

    fn cert_path(&self) -> Option<&Path> {
        self.cert_path.as_deref()
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Machine read from `DOCKER_HOST` and `DOCKER_CERT_PATH` at construction.
/// The API version is always the client default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvMachine {
    host: String,
    cert_path: Option<PathBuf>,
}

impl EnvMachine {
    pub fn new() -> Self {
        let host = std::env::var(HOST_ENV).unwrap_or_default();
        let cert_path = std::env::var_os(CERT_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self { host, cert_path }
    }
}

impl Machine for EnvMachine {
    fn host(&self) -> &str {
        &self.host
    }

    fn cert_path(&self) -> Option<&Path> {
        self.cert_path.as_deref()
    }

    fn version(&self) -> &str {
        ""
    }
}
