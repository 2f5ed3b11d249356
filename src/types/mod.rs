// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed daemon IDs and the image reference a process runs.

mod id;
mod image_ref;

pub use id::{ContainerId, ExecId, Id};
pub use image_ref::{ImageRef, ParseImageRefError};
