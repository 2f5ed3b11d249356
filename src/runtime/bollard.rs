// ABOUTME: Bollard-backed implementation of the daemon client capability.
// ABOUTME: Re-encodes demultiplexed output into the raw attach wire framing.

use super::client::{
    AttachTarget, ByteStream, ContainerStatus, DaemonClient, ExecInspection, ImageRemoval,
    VolumeInfo, VolumeSpec,
};
use super::error::{ClientError, ConnectionError};
use super::machine::Machine;
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, ExecConfig, VolumeCreateRequest};
use bollard::query_parameters::{
    AttachContainerOptions, CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    RemoveContainerOptions, RemoveImageOptions, UploadToContainerOptions,
};
use bollard::{ClientVersion, Docker};
use bytes::{BufMut, Bytes, BytesMut};
use futures::{StreamExt, stream};
use tracing::debug;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_daemon_error(e: bollard::errors::Error) -> ClientError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => ClientError::NotFound(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => ClientError::Conflict(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => ClientError::Server {
            status: status_code,
            message,
        },
        bollard::errors::Error::DockerStreamError { error } => ClientError::Stream(error),
        other => ClientError::Transport(other.to_string()),
    }
}

/// Parse `MAJOR.MINOR`; an empty string selects the client default.
fn parse_api_version(version: &str) -> Result<ClientVersion, ConnectionError> {
    let version = version.trim();
    if version.is_empty() {
        return Ok(*bollard::API_DEFAULT_VERSION);
    }

    let invalid = || ConnectionError::InvalidVersion(version.to_string());
    let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
    let major_version = major.parse().map_err(|_| invalid())?;
    let minor_version = minor.parse().map_err(|_| invalid())?;

    Ok(ClientVersion {
        major_version,
        minor_version,
    })
}

/// Largest payload one frame header can declare.
const MAX_FRAME_PAYLOAD: usize = u32::MAX as usize;

/// Put a demultiplexed record back into its 8-byte-header frame.
///
/// TTY output carries no framing on the wire, so console records pass
/// through unchanged.
fn encode_frame(output: LogOutput) -> Bytes {
    let (tag, message) = match output {
        LogOutput::StdIn { message } => (0u8, message),
        LogOutput::StdOut { message } => (1u8, message),
        LogOutput::StdErr { message } => (2u8, message),
        LogOutput::Console { message } => return message,
    };

    encode_frames(tag, &message, MAX_FRAME_PAYLOAD)
}

/// Frame `message` under `tag`, splitting it into consecutive frames of at
/// most `max_payload` bytes. An empty message still gets one header.
fn encode_frames(tag: u8, message: &[u8], max_payload: usize) -> Bytes {
    let max_payload = max_payload.clamp(1, MAX_FRAME_PAYLOAD);
    let frames = message.len().div_ceil(max_payload).max(1);

    let mut buf = BytesMut::with_capacity(8 * frames + message.len());
    let mut rest = message;
    loop {
        let (part, tail) = rest.split_at(rest.len().min(max_payload));
        let len = u32::try_from(part.len()).unwrap_or(u32::MAX);
        buf.put_slice(&[tag, 0, 0, 0]);
        buf.put_u32(len);
        buf.put_slice(part);

        if tail.is_empty() {
            break;
        }
        rest = tail;
    }
    buf.freeze()
}

fn framed(
    output: std::pin::Pin<
        Box<dyn futures::Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send>,
    >,
) -> ByteStream {
    Box::pin(output.map(|item| item.map(encode_frame).map_err(map_daemon_error)))
}

/// Daemon client backed by bollard.
#[derive(Debug, Clone)]
pub struct BollardClient {
    client: Docker,
    host: String,
}

impl BollardClient {
    pub fn new(client: Docker, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    /// Build a client for a machine. No network I/O happens here.
    pub fn connect<M: Machine + ?Sized>(machine: &M) -> Result<Self, ConnectionError> {
        let host = machine.host().trim();
        let version = parse_api_version(machine.version())?;
        let timeout = machine.timeout().as_secs();

        let result = if host.is_empty() {
            Docker::connect_with_local_defaults()
        } else if host.starts_with("unix://") {
            Docker::connect_with_unix(host, timeout, &version)
        } else if let Some(certs) = machine.cert_path() {
            Docker::connect_with_ssl(
                host,
                &certs.join("key.pem"),
                &certs.join("cert.pem"),
                &certs.join("ca.pem"),
                timeout,
                &version,
            )
        } else {
            Docker::connect_with_http(host, timeout, &version)
        };

        let client = result.map_err(|e| ConnectionError::Client {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

        debug!(host = %host, "connected daemon client");
        Ok(Self::new(client, host))
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl DaemonClient for BollardClient {
    async fn pull_image(&self, image: &str) -> Result<ByteStream, ClientError> {
        let opts = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };

        let mut records = Box::pin(self.client.create_image(Some(opts), None, None));

        // Registry and connection failures arrive as the first record; surface
        // them from the call so the caller can retry it.
        let first = match records.next().await {
            Some(record) => record.map_err(map_daemon_error)?,
            None => return Ok(Box::pin(stream::empty())),
        };

        let lines = stream::once(async move { Ok(first) })
            .chain(records)
            .map(|record| {
                let record = record.map_err(map_daemon_error)?;
                let mut line = serde_json::to_vec(&record)
                    .map_err(|e| ClientError::Stream(e.to_string()))?;
                line.push(b'\n');
                Ok(Bytes::from(line))
            });

        Ok(Box::pin(lines))
    }

    async fn create_container(
        &self,
        name: &str,
        body: ContainerCreateBody,
    ) -> Result<ContainerId, ClientError> {
        let opts = CreateContainerOptions {
            name: (!name.is_empty()).then(|| name.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_daemon_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ClientError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_daemon_error)
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
        target: AttachTarget,
    ) -> Result<ByteStream, ClientError> {
        let opts = AttachContainerOptions {
            stream: true,
            stdout: target.stdout(),
            stderr: target.stderr(),
            ..Default::default()
        };

        let attached = self
            .client
            .attach_container(id.as_str(), Some(opts))
            .await
            .map_err(map_daemon_error)?;

        Ok(framed(attached.output))
    }

    async fn create_exec(
        &self,
        id: &ContainerId,
        config: ExecConfig,
    ) -> Result<ExecId, ClientError> {
        let response = self
            .client
            .create_exec(id.as_str(), config)
            .await
            .map_err(map_daemon_error)?;

        Ok(ExecId::new(response.id))
    }

    async fn start_exec(&self, exec: &ExecId) -> Result<ByteStream, ClientError> {
        let opts = StartExecOptions {
            detach: false,
            tty: false,
            output_capacity: None,
        };

        match self
            .client
            .start_exec(exec.as_str(), Some(opts))
            .await
            .map_err(map_daemon_error)?
        {
            StartExecResults::Attached { output, .. } => Ok(framed(output)),
            StartExecResults::Detached => Ok(Box::pin(stream::empty())),
        }
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus, ClientError> {
        let info = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_daemon_error)?;

        let state = info.state.unwrap_or_default();
        Ok(ContainerStatus {
            running: state.running.unwrap_or(false),
            exit_code: state.exit_code,
        })
    }

    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecInspection, ClientError> {
        let info = self
            .client
            .inspect_exec(exec.as_str())
            .await
            .map_err(map_daemon_error)?;

        Ok(ExecInspection {
            running: info.running.unwrap_or(false),
            exit_code: info.exit_code,
        })
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ClientError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_daemon_error)
    }

    async fn remove_image(&self, image: &str, opts: ImageRemoval) -> Result<(), ClientError> {
        let opts = RemoveImageOptions {
            force: opts.force,
            noprune: !opts.prune_children,
            ..Default::default()
        };

        self.client
            .remove_image(image, Some(opts), None)
            .await
            .map_err(map_daemon_error)?;

        Ok(())
    }

    async fn copy_to_container(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: Bytes,
    ) -> Result<(), ClientError> {
        let opts = UploadToContainerOptions {
            path: dest_dir.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container(id.as_str(), Some(opts), bollard::body_full(archive))
            .await
            .map_err(map_daemon_error)
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, ClientError> {
        let request = VolumeCreateRequest {
            name: spec.name.clone(),
            driver: spec.driver.clone(),
            labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
            ..Default::default()
        };

        let volume = self
            .client
            .create_volume(request)
            .await
            .map_err(map_daemon_error)?;

        Ok(VolumeInfo {
            name: volume.name,
            driver: volume.driver,
            mountpoint: volume.mountpoint,
        })
    }
}
