// ABOUTME: Runs one remote container as if it were a local process.
// ABOUTME: Start pulls, creates, attaches and starts; Wait drains output and cleans up.

use crate::container::{Container, CreateConfig, ImagePullPayload, Started};
use crate::error::{Error, Operation, Result};
use crate::hijack::{HijackedStreamPayload, PayloadStream};
use crate::mount::Mount;
use crate::runtime::{AttachTarget, ImageRemoval, Machine};
use crate::types::{ContainerId, ImageRef};
use bollard::models::{ContainerCreateBody, HostConfig};
use std::sync::Arc;
use tracing::{debug, info};

/// What to run the image with.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Daemon to run on. Required.
    pub machine: Option<Arc<dyn Machine>>,
    /// Environment as `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub mounts: Vec<Mount>,
    /// Container name; derived from the image when empty.
    pub name: String,
    /// Retry budget for the image pull.
    pub retry: u32,
}

enum Stage {
    Idle,
    Running {
        container: Container<Started>,
        stdout: PayloadStream<HijackedStreamPayload>,
        stderr: PayloadStream<HijackedStreamPayload>,
    },
    /// Started and waited on, or a start that failed part way.
    Done,
}

/// One run of an image as a process.
///
/// A process is single-use: `start` may be called once, and `wait` only
/// after a successful `start`. If `start` succeeds, `wait` must be called to
/// release the attached streams and the container.
pub struct Process {
    image: String,
    args: Args,
    remove: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    log: Vec<u8>,
    id: Option<ContainerId>,
    exit_code: Option<i64>,
    stage: Stage,
}

impl Process {
    pub fn new(image: impl Into<String>, args: Args) -> Self {
        Self {
            image: image.into(),
            args,
            remove: true,
            stdout: Vec::new(),
            stderr: Vec::new(),
            log: Vec::new(),
            id: None,
            exit_code: None,
            stage: Stage::Idle,
        }
    }

    /// Leave the container and image on the daemon after `wait`.
    pub fn keep(mut self) -> Self {
        self.remove = false;
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Container name, derived during `start` when none was given.
    pub fn name(&self) -> &str {
        &self.args.name
    }

    pub fn removes_on_exit(&self) -> bool {
        self.remove
    }

    /// Container id, once created. Kept after a failed start so the caller
    /// can clean up.
    pub fn id(&self) -> Option<&ContainerId> {
        self.id.as_ref()
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Raw image pull progress, one JSON record per line.
    pub fn log(&self) -> &[u8] {
        &self.log
    }

    /// Container exit code, once `wait` has inspected it.
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    /// Start the process and wait for it to finish.
    ///
    /// A non-zero exit code is not an error; see [`Process::exit_code`].
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        self.wait().await
    }

    /// Pull the image, create the container, attach to its stdout and
    /// stderr, and start it.
    ///
    /// A pull that fails part way is recorded in the log as an `error` record
    /// and ends the start before anything is created.
    pub async fn start(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(Error::InvalidState("process already started"));
        }
        let machine = self.args.machine.clone().ok_or(Error::MissingMachine)?;
        let image = ImageRef::parse(&self.image)
            .map_err(|e| Error::InvalidConfig(format!("image {:?}: {e}", self.image)))?;

        self.stage = Stage::Done;

        let container = Container::new(image, machine).with_retry(self.args.retry);

        let mut progress = container.pull_image_lines().await?;
        while let Some(line) = progress.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    let record = ImagePullPayload::failed(&e);
                    let record = serde_json::json!({ "error": record.error });
                    self.log.extend_from_slice(record.to_string().as_bytes());
                    self.log.push(b'\n');
                    return Err(Error::remote(Operation::PullImage, e));
                }
            };
            self.log.extend_from_slice(&line);
            if !line.ends_with(b"\n") {
                self.log.push(b'\n');
            }
        }
        debug!(image = %container.image(), "image ready");

        if self.args.name.is_empty() {
            self.args.name = container_name(container.image());
        }

        let config = CreateConfig {
            name: self.args.name.clone(),
            container: ContainerCreateBody {
                env: (!self.args.env.is_empty()).then(|| self.args.env.clone()),
                ..Default::default()
            },
            host: Some(HostConfig {
                mounts: Some(self.args.mounts.iter().map(Mount::to_api).collect()),
                ..Default::default()
            }),
            network: None,
        };

        let container = container.create(config).await?;
        self.id = Some(container.id().clone());

        let stdout = container.attach(AttachTarget::Stdout).await?;
        let stderr = container.attach(AttachTarget::Stderr).await?;
        let container = container.start().await?;

        info!(container = %container.id().short(), name = %self.args.name, "process started");
        self.stage = Stage::Running {
            container,
            stdout,
            stderr,
        };
        Ok(())
    }

    /// Drain stdout, then stderr, then inspect and clean up the container.
    ///
    /// The two streams are read concurrently in the background but copied
    /// into their sinks one after the other, so relative timing between
    /// stdout and stderr is not preserved.
    pub async fn wait(&mut self) -> Result<()> {
        let Stage::Running {
            container,
            mut stdout,
            mut stderr,
        } = std::mem::replace(&mut self.stage, Stage::Done)
        else {
            return Err(Error::InvalidState("process was not started"));
        };

        while let Some(payload) = stdout.next().await {
            self.stdout.extend_from_slice(&payload.data);
        }
        while let Some(payload) = stderr.next().await {
            self.stderr.extend_from_slice(&payload.data);
        }

        let status = container.inspect().await?;
        if status.running {
            return Err(Error::StillRunning(container.id().to_string()));
        }
        self.exit_code = status.exit_code;
        info!(
            container = %container.id().short(),
            exit_code = ?status.exit_code,
            "process exited"
        );

        if self.remove {
            let container = container.remove(false).await?;
            container
                .remove_image(ImageRemoval {
                    force: true,
                    prune_children: true,
                })
                .await?;
        }

        Ok(())
    }
}

/// Default container name: the image with `/`, `:` and `@` replaced,
/// suffixed with the current Unix time.
fn container_name(image: &ImageRef) -> String {
    format!(
        "{}_{}",
        image.container_name_stem(),
        chrono::Utc::now().timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_name_replaces_separators() {
        let image = ImageRef::parse("registry.local:5000/team/tool:1.2").unwrap();
        let name = container_name(&image);
        let (stem, ts) = name.rsplit_once('_').unwrap();
        assert_eq!(stem, "registry.local_5000_team_tool_1.2");
        assert!(ts.parse::<i64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn start_without_machine_is_configuration_error() {
        let mut process = Process::new("alpine", Args::default());
        let err = process.start().await.unwrap_err();
        assert!(matches!(err, Error::MissingMachine));
        assert!(process.id().is_none());
    }

    #[tokio::test]
    async fn wait_before_start_is_invalid() {
        let mut process = Process::new("alpine", Args::default());
        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
