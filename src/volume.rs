// ABOUTME: Named volume creation on a machine's daemon.
// ABOUTME: Volumes outlive processes and can be mounted by name.

use crate::error::{Error, Operation, Result};
use crate::mount::Mount;
use crate::runtime::{Machine, VolumeInfo, VolumeSpec};
use tracing::info;

/// Create a named volume.
pub async fn create_volume<M: Machine + ?Sized>(machine: &M, spec: VolumeSpec) -> Result<VolumeInfo> {
    let client = machine.connect()?;
    let volume = client
        .create_volume(&spec)
        .await
        .map_err(|e| Error::remote(Operation::CreateVolume, e))?;

    info!(volume = %volume.name, driver = %volume.driver, "created volume");
    Ok(volume)
}

impl VolumeInfo {
    /// Mount this volume at `target`.
    pub fn mount_at(&self, target: impl Into<String>) -> Mount {
        Mount::volume_by_name(self.name.clone(), target)
    }
}
