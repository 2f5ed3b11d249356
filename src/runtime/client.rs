// ABOUTME: The daemon capability consumed by the container lifecycle.
// ABOUTME: Any Docker-compatible client implementing DaemonClient is substitutable.

use super::error::ClientError;
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bollard::models::{ContainerCreateBody, ExecConfig};
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// Raw bytes as read from the daemon, chunked however the transport delivers
/// them. Attach and exec streams carry the 8-byte frame headers untouched.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Which output streams an attach request subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTarget {
    Stdout,
    Stderr,
    Both,
}

impl AttachTarget {
    pub fn stdout(self) -> bool {
        matches!(self, AttachTarget::Stdout | AttachTarget::Both)
    }

    pub fn stderr(self) -> bool {
        matches!(self, AttachTarget::Stderr | AttachTarget::Both)
    }
}

/// Exit state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerStatus {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Exit state of an exec instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecInspection {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Options for removing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageRemoval {
    pub force: bool,
    /// Also delete untagged parent images.
    pub prune_children: bool,
}

/// Request to create a named volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Volume name; the daemon picks one when absent.
    pub name: Option<String>,
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
}

/// A volume as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
}

/// The set of daemon calls the process-over-container core needs.
///
/// A client is acquired per logical operation from a
/// [`Machine`](super::Machine) and dropped when that operation returns. Only
/// the returned [`ByteStream`]s outlive the call that produced them.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Pull an image, returning the newline-delimited JSON progress stream.
    async fn pull_image(&self, image: &str) -> Result<ByteStream, ClientError>;

    /// Create a container with the given name (empty lets the daemon choose).
    async fn create_container(
        &self,
        name: &str,
        body: ContainerCreateBody,
    ) -> Result<ContainerId, ClientError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ClientError>;

    /// Attach to a container's output, returning the hijacked stream.
    async fn attach_container(
        &self,
        id: &ContainerId,
        target: AttachTarget,
    ) -> Result<ByteStream, ClientError>;

    /// Create an exec instance inside a running container.
    async fn create_exec(
        &self,
        id: &ContainerId,
        config: ExecConfig,
    ) -> Result<ExecId, ClientError>;

    /// Attach to and start an exec instance, returning its combined output.
    ///
    /// The Docker API attaches and starts an exec in the same hijacked
    /// request, so both steps share one call.
    async fn start_exec(&self, exec: &ExecId) -> Result<ByteStream, ClientError>;

    /// Get the running state and exit code of a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus, ClientError>;

    /// Get the running state and exit code of an exec instance.
    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecInspection, ClientError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ClientError>;

    /// Remove an image.
    async fn remove_image(&self, image: &str, opts: ImageRemoval) -> Result<(), ClientError>;

    /// Extract a tar archive into a directory of the container's filesystem.
    async fn copy_to_container(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: Bytes,
    ) -> Result<(), ClientError>;

    /// Create a named volume.
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, ClientError>;
}
