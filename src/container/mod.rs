// ABOUTME: Lifecycle controller for one remote container.
// ABOUTME: Type state enforces create, then start, then exec at compile time.

mod create;
mod exec;
mod progress;
mod state;
mod upload;

pub use create::CreateConfig;
pub use exec::{DEFAULT_INTERPRETER, Execution, ExecutionSpec};
pub use progress::{ImagePullPayload, ProgressDetail};
pub use state::{Created, HasId, Started, Unattached};

use crate::error::{Error, Operation, Result};
use crate::hijack::{HijackedStreamPayload, PayloadStream, StreamType, decode_stream, spawn_lines};
use crate::retry::retry;
use crate::runtime::{
    AttachTarget, ClientError, ContainerStatus, DaemonClient, ImageRemoval, Machine,
};
use crate::types::{ContainerId, ImageRef};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A container on a machine's daemon, parameterized by lifecycle state.
///
/// Every operation acquires its own daemon client from the machine and drops
/// it before returning. Only output streams outlive the call that opened
/// them.
///
/// Commands run only once the container is started:
///
/// ```compile_fail,E0599
/// use dockproc::container::{Container, Created};
/// use dockproc::Execution;
///
/// async fn run(container: Container<Created>) {
///     let _ = container.exec(&Execution::inline("true")).await;
/// }
/// ```
///
/// Uploads need a container id:
///
/// ```compile_fail,E0599
/// use dockproc::container::{Container, Unattached};
/// use std::path::Path;
///
/// async fn run(container: Container<Unattached>) {
///     let _ = container.upload(Path::new("setup.sh"), "/").await;
/// }
/// ```
#[derive(Debug)]
pub struct Container<S> {
    pub(crate) image: ImageRef,
    pub(crate) machine: Arc<dyn Machine>,
    pub(crate) retry: u32,
    pub(crate) state: S,
}

impl Container<Unattached> {
    /// A handle for `image` on `machine`. Nothing is sent to the daemon.
    pub fn new(image: ImageRef, machine: Arc<dyn Machine>) -> Self {
        Self {
            image,
            machine,
            retry: 0,
            state: Unattached,
        }
    }

    /// Retry budget for image pulls and exec creation. Zero disables retry.
    pub fn with_retry(mut self, budget: u32) -> Self {
        self.retry = budget;
        self
    }
}

impl<S> Container<S> {
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn machine(&self) -> &Arc<dyn Machine> {
        &self.machine
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry
    }

    pub(crate) fn client(&self) -> Result<Box<dyn DaemonClient>> {
        Ok(self.machine.connect()?)
    }

    fn transition<T>(self, state: T) -> Container<T> {
        Container {
            image: self.image,
            machine: self.machine,
            retry: self.retry,
            state,
        }
    }

    async fn pull_raw(&self) -> Result<crate::runtime::ByteStream> {
        let client = self.client()?;
        let client: &dyn DaemonClient = client.as_ref();
        let image = self.image.as_str();

        debug!(image = %image, budget = self.retry, "pulling image");
        retry("pull image", self.retry, move || client.pull_image(image))
            .await
            .map_err(|e| Error::retried(Operation::PullImage, e))
    }

    /// Pull the image, returning the raw progress lines.
    ///
    /// The pull call is retried within the budget. Lines keep their trailing
    /// newline. A failure reported by the daemon once the pull is under way
    /// arrives as a final `Err` item.
    pub async fn pull_image_lines(
        &self,
    ) -> Result<PayloadStream<std::result::Result<Bytes, ClientError>>> {
        let raw = self.pull_raw().await?;
        Ok(spawn_lines(raw, |line| Some(Ok(line)), |e| Some(Err(e))))
    }

    /// Pull the image, returning structured progress records.
    ///
    /// A failure once the pull is under way arrives as a final payload with
    /// `error` set.
    pub async fn pull_image(&self) -> Result<PayloadStream<ImagePullPayload>> {
        let raw = self.pull_raw().await?;
        Ok(spawn_lines(raw, progress::parse_progress_line, |e| {
            Some(ImagePullPayload::failed(&e))
        }))
    }

    /// Remove the image this container was created from.
    pub async fn remove_image(&self, opts: ImageRemoval) -> Result<()> {
        let client = self.client()?;
        client
            .remove_image(self.image.as_str(), opts)
            .await
            .map_err(|e| Error::remote(Operation::RemoveImage, e))?;

        info!(image = %self.image, "removed image");
        Ok(())
    }
}

impl<S: HasId> Container<S> {
    pub fn id(&self) -> &ContainerId {
        self.state.container_id()
    }

    /// Attach to the container's output.
    ///
    /// Payloads with no frame header are typed as the attached stream, or as
    /// mixed when attached to both.
    pub async fn attach(&self, target: AttachTarget) -> Result<PayloadStream<HijackedStreamPayload>> {
        let client = self.client()?;
        let raw = client
            .attach_container(self.id(), target)
            .await
            .map_err(|e| Error::remote(Operation::AttachContainer, e))?;

        let initial = match target {
            AttachTarget::Stdout => StreamType::Stdout,
            AttachTarget::Stderr => StreamType::Stderr,
            AttachTarget::Both => StreamType::Mixed,
        };

        debug!(container = %self.id().short(), ?target, "attached");
        Ok(decode_stream(raw, initial))
    }

    /// Copy a local file into `dest_dir` inside the container.
    pub async fn upload(&self, local: &Path, dest_dir: &str) -> Result<()> {
        let file = upload::open_file(local)?;
        self.upload_opened(file, local, dest_dir).await
    }

    /// Copy an already opened file, named after `local`, into `dest_dir`.
    pub(crate) async fn upload_opened(
        &self,
        file: std::fs::File,
        local: &Path,
        dest_dir: &str,
    ) -> Result<()> {
        let archive = upload::archive_file(file, local)?;
        let client = self.client()?;
        client
            .copy_to_container(self.id(), dest_dir, archive)
            .await
            .map_err(crate::error::UploadError::Copy)?;

        debug!(
            container = %self.id().short(),
            file = %local.display(),
            dest = dest_dir,
            "uploaded file"
        );
        Ok(())
    }

    pub async fn inspect(&self) -> Result<ContainerStatus> {
        let client = self.client()?;
        client
            .inspect_container(self.id())
            .await
            .map_err(|e| Error::remote(Operation::InspectContainer, e))
    }

    /// Remove the container from the daemon, releasing its id.
    ///
    /// The returned handle can still pull or remove the image.
    pub async fn remove(self, force: bool) -> Result<Container<Unattached>> {
        let client = self.client()?;
        client
            .remove_container(self.id(), force)
            .await
            .map_err(|e| Error::remote(Operation::RemoveContainer, e))?;

        info!(container = %self.id().short(), "removed container");
        Ok(self.transition(Unattached))
    }
}
