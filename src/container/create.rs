// ABOUTME: Container creation and start transitions.
// ABOUTME: Output attachment and TTY are forced on whatever the caller configures.

use super::{Container, Created, Started, Unattached};
use crate::error::{Error, Operation, Result};
use bollard::models::{ContainerCreateBody, HostConfig, NetworkingConfig};
use tracing::info;

/// Caller-supplied settings for a new container.
///
/// `image`, `tty`, `attach_stdout` and `attach_stderr` in `container` are
/// always overwritten.
#[derive(Debug, Clone, Default)]
pub struct CreateConfig {
    /// Container name; empty lets the daemon choose.
    pub name: String,
    pub container: ContainerCreateBody,
    pub host: Option<HostConfig>,
    pub network: Option<NetworkingConfig>,
}

impl CreateConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Request body with the forced fields applied.
    pub(crate) fn into_body(self, image: &str) -> ContainerCreateBody {
        let mut body = self.container;

        if let Some(host) = self.host {
            body.host_config = Some(host);
        }
        if let Some(network) = self.network {
            body.networking_config = Some(network);
        }

        body.image = Some(image.to_string());
        body.tty = Some(true);
        body.attach_stdout = Some(true);
        body.attach_stderr = Some(true);
        body
    }
}

impl Container<Unattached> {
    /// Create the container on the daemon. Not retried.
    pub async fn create(self, config: CreateConfig) -> Result<Container<Created>> {
        let name = config.name.clone();
        let body = config.into_body(self.image.as_str());

        let client = self.client()?;
        let id = client
            .create_container(&name, body)
            .await
            .map_err(|e| Error::remote(Operation::CreateContainer, e))?;
        drop(client);

        info!(container = %id.short(), name = %name, image = %self.image, "created container");
        Ok(self.transition(Created { id }))
    }
}

impl Container<Created> {
    /// Start the created container.
    pub async fn start(self) -> Result<Container<Started>> {
        let client = self.client()?;
        client
            .start_container(&self.state.id)
            .await
            .map_err(|e| Error::remote(Operation::StartContainer, e))?;
        drop(client);

        info!(container = %self.state.id.short(), "started container");
        let id = self.state.id.clone();
        Ok(self.transition(Started { id }))
    }
}
