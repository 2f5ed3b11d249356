// ABOUTME: Remote daemon access: machine descriptors and the client capability.
// ABOUTME: Bollard backs the default client; tests substitute their own.

mod bollard;
mod client;
mod error;
mod machine;

pub use self::bollard::BollardClient;
pub use client::{
    AttachTarget, ByteStream, ContainerStatus, DaemonClient, ExecInspection, ImageRemoval,
    VolumeInfo, VolumeSpec,
};
pub use error::{ClientError, ConnectionError};
pub use machine::{CERT_PATH_ENV, DEFAULT_TIMEOUT, EnvMachine, HOST_ENV, Machine, MachineConfig};
