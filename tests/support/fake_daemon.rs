// ABOUTME: In-memory DaemonClient recording every call for assertions.
// ABOUTME: Failures and stream contents are scripted per test.

use async_trait::async_trait;
use bollard::models::{ContainerCreateBody, ExecConfig};
use bytes::Bytes;
use dockproc::runtime::{
    AttachTarget, ByteStream, ClientError, ConnectionError, ContainerStatus, DaemonClient,
    ExecInspection, ImageRemoval, Machine, VolumeInfo, VolumeSpec,
};
use dockproc::types::{ContainerId, ExecId};
use futures::stream;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub const CONTAINER_ID: &str = "0123456789abcdef0123";
pub const EXEC_ID: &str = "exec-0001";

/// One recorded daemon call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PullImage(String),
    CreateContainer {
        name: String,
        body: ContainerCreateBody,
    },
    StartContainer(String),
    AttachContainer(String, AttachTarget),
    CreateExec {
        container: String,
        cmd: Vec<String>,
        env: Vec<String>,
    },
    StartExec(String),
    InspectContainer(String),
    InspectExec(String),
    RemoveContainer {
        id: String,
        force: bool,
    },
    RemoveImage {
        image: String,
        opts: ImageRemoval,
    },
    CopyToContainer {
        id: String,
        dest: String,
        archive: Bytes,
    },
    CreateVolume(VolumeSpec),
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    connects: usize,
    pull_failures: u32,
    exec_create_failures: u32,
    create_error: Option<ClientError>,
    start_error: Option<ClientError>,
    pull_chunks: Vec<Bytes>,
    pull_stream_error: Option<ClientError>,
    stdout_chunks: Vec<Bytes>,
    stderr_chunks: Vec<Bytes>,
    exec_chunks: Vec<Bytes>,
    running: bool,
    exit_code: Option<i64>,
    exec_exit_code: Option<i64>,
}

/// A scripted daemon. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeDaemon {
    script: Arc<Mutex<Script>>,
}

fn chunks(parts: &[&[u8]]) -> Vec<Bytes> {
    parts.iter().map(|p| Bytes::copy_from_slice(p)).collect()
}

fn byte_stream(chunks: Vec<Bytes>) -> ByteStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok)))
}

impl FakeDaemon {
    pub fn new() -> Self {
        let daemon = Self::default();
        daemon.script.lock().exit_code = Some(0);
        daemon
    }

    pub fn machine(&self) -> Arc<dyn Machine> {
        Arc::new(FakeMachine {
            daemon: self.clone(),
        })
    }

    pub fn failing_pulls(self, n: u32) -> Self {
        self.script.lock().pull_failures = n;
        self
    }

    pub fn failing_exec_creates(self, n: u32) -> Self {
        self.script.lock().exec_create_failures = n;
        self
    }

    pub fn failing_create(self, err: ClientError) -> Self {
        self.script.lock().create_error = Some(err);
        self
    }

    pub fn failing_start(self, err: ClientError) -> Self {
        self.script.lock().start_error = Some(err);
        self
    }

    pub fn pull_output(self, parts: &[&[u8]]) -> Self {
        self.script.lock().pull_chunks = chunks(parts);
        self
    }

    /// End the pull stream with `err` after the scripted output.
    pub fn pull_stream_error(self, err: ClientError) -> Self {
        self.script.lock().pull_stream_error = Some(err);
        self
    }

    pub fn stdout(self, parts: &[&[u8]]) -> Self {
        self.script.lock().stdout_chunks = chunks(parts);
        self
    }

    pub fn stderr(self, parts: &[&[u8]]) -> Self {
        self.script.lock().stderr_chunks = chunks(parts);
        self
    }

    pub fn exec_output(self, parts: &[&[u8]]) -> Self {
        self.script.lock().exec_chunks = chunks(parts);
        self
    }

    pub fn still_running(self) -> Self {
        self.script.lock().running = true;
        self
    }

    pub fn exit_code(self, code: i64) -> Self {
        self.script.lock().exit_code = Some(code);
        self
    }

    pub fn exec_exit_code(self, code: i64) -> Self {
        self.script.lock().exec_exit_code = Some(code);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.script.lock().connects
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.script.lock().calls.push(call);
    }
}

#[async_trait]
impl DaemonClient for FakeDaemon {
    async fn pull_image(&self, image: &str) -> Result<ByteStream, ClientError> {
        self.record(Call::PullImage(image.to_string()));
        let mut script = self.script.lock();
        if script.pull_failures > 0 {
            script.pull_failures -= 1;
            return Err(ClientError::Transport("registry timeout".into()));
        }
        let items = script
            .pull_chunks
            .iter()
            .cloned()
            .map(Ok)
            .chain(script.pull_stream_error.clone().map(Err));
        Ok(Box::pin(stream::iter(items.collect::<Vec<_>>())))
    }

    async fn create_container(
        &self,
        name: &str,
        body: ContainerCreateBody,
    ) -> Result<ContainerId, ClientError> {
        self.record(Call::CreateContainer {
            name: name.to_string(),
            body,
        });
        match self.script.lock().create_error.clone() {
            Some(err) => Err(err),
            None => Ok(ContainerId::new(CONTAINER_ID)),
        }
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ClientError> {
        self.record(Call::StartContainer(id.to_string()));
        match self.script.lock().start_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
        target: AttachTarget,
    ) -> Result<ByteStream, ClientError> {
        self.record(Call::AttachContainer(id.to_string(), target));
        let script = self.script.lock();
        let chunks = match target {
            AttachTarget::Stdout => script.stdout_chunks.clone(),
            AttachTarget::Stderr => script.stderr_chunks.clone(),
            AttachTarget::Both => {
                let mut all = script.stdout_chunks.clone();
                all.extend(script.stderr_chunks.iter().cloned());
                all
            }
        };
        Ok(byte_stream(chunks))
    }

    async fn create_exec(
        &self,
        id: &ContainerId,
        config: ExecConfig,
    ) -> Result<ExecId, ClientError> {
        self.record(Call::CreateExec {
            container: id.to_string(),
            cmd: config.cmd.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
        });
        let mut script = self.script.lock();
        if script.exec_create_failures > 0 {
            script.exec_create_failures -= 1;
            return Err(ClientError::Conflict("container is restarting".into()));
        }
        Ok(ExecId::new(EXEC_ID))
    }

    async fn start_exec(&self, exec: &ExecId) -> Result<ByteStream, ClientError> {
        self.record(Call::StartExec(exec.to_string()));
        Ok(byte_stream(self.script.lock().exec_chunks.clone()))
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus, ClientError> {
        self.record(Call::InspectContainer(id.to_string()));
        let script = self.script.lock();
        Ok(ContainerStatus {
            running: script.running,
            exit_code: if script.running {
                None
            } else {
                script.exit_code
            },
        })
    }

    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecInspection, ClientError> {
        self.record(Call::InspectExec(exec.to_string()));
        Ok(ExecInspection {
            running: false,
            exit_code: self.script.lock().exec_exit_code,
        })
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ClientError> {
        self.record(Call::RemoveContainer {
            id: id.to_string(),
            force,
        });
        Ok(())
    }

    async fn remove_image(&self, image: &str, opts: ImageRemoval) -> Result<(), ClientError> {
        self.record(Call::RemoveImage {
            image: image.to_string(),
            opts,
        });
        Ok(())
    }

    async fn copy_to_container(
        &self,
        id: &ContainerId,
        dest_dir: &str,
        archive: Bytes,
    ) -> Result<(), ClientError> {
        self.record(Call::CopyToContainer {
            id: id.to_string(),
            dest: dest_dir.to_string(),
            archive,
        });
        Ok(())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, ClientError> {
        self.record(Call::CreateVolume(spec.clone()));
        let name = spec.name.clone().unwrap_or_else(|| "generated".to_string());
        Ok(VolumeInfo {
            mountpoint: format!("/var/lib/docker/volumes/{name}/_data"),
            driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
            name,
        })
    }
}

/// Machine handing out clients backed by one shared [`FakeDaemon`].
#[derive(Debug)]
pub struct FakeMachine {
    daemon: FakeDaemon,
}

impl Machine for FakeMachine {
    fn host(&self) -> &str {
        "fake://daemon"
    }

    fn cert_path(&self) -> Option<&Path> {
        None
    }

    fn version(&self) -> &str {
        ""
    }

    fn connect(&self) -> Result<Box<dyn DaemonClient>, ConnectionError> {
        self.daemon.script.lock().connects += 1;
        Ok(Box::new(self.daemon.clone()))
    }
}
