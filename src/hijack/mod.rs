// ABOUTME: Hijacked attach/exec stream handling: scanning, frame decoding, delivery.
// ABOUTME: One producer task per stream feeds decoded payloads through a single-slot channel.

mod frame;
mod scanner;
mod stream;

pub use frame::{FRAME_HEADER_LEN, HijackedStreamPayload, StreamType, decode_frame};
pub use scanner::LineScanner;
pub use stream::{PayloadStream, decode_stream, spawn_decoder};
pub(crate) use stream::spawn_lines;
