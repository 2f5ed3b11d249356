// ABOUTME: Container state marker types for the type state pattern.
// ABOUTME: States past creation carry the daemon-assigned container id.

use crate::types::ContainerId;

/// Constructed locally, nothing exists on the daemon yet.
/// Available actions: `create()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattached;

/// Created on the daemon, not running.
/// Available actions: `start()`, `attach()`, `upload()`, `inspect()`, `remove()`
#[derive(Debug, Clone)]
pub struct Created {
    pub(crate) id: ContainerId,
}

/// Started on the daemon.
/// Available actions: `exec()`, `attach()`, `upload()`, `inspect()`, `remove()`
#[derive(Debug, Clone)]
pub struct Started {
    pub(crate) id: ContainerId,
}

/// States that refer to an existing daemon container.
pub trait HasId {
    fn container_id(&self) -> &ContainerId;
}

impl HasId for Created {
    fn container_id(&self) -> &ContainerId {
        &self.id
    }
}

impl HasId for Started {
    fn container_id(&self) -> &ContainerId {
        &self.id
    }
}
