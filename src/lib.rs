// ABOUTME: Library root for dockproc - runs remote containers as processes.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod container;
pub mod error;
pub mod hijack;
pub mod mount;
pub mod process;
pub mod retry;
pub mod runtime;
pub mod types;
pub mod volume;

pub use container::{Container, CreateConfig, Execution};
pub use error::{Error, ErrorKind, Result};
pub use process::{Args, Process};
