// ABOUTME: Decoder for the daemon's 8-byte-header stream framing.
// ABOUTME: Pure function; the fallback stream type is threaded by the caller.

use bytes::Bytes;
use std::fmt;

/// Length of a frame header: tag, three zero bytes, big-endian payload length.
pub const FRAME_HEADER_LEN: usize = 8;

/// Origin of a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamType {
    Stdin,
    Stdout,
    Stderr,
    /// Data whose origin is unknown. Used as the initial fallback for
    /// combined streams.
    #[default]
    Mixed,
}

impl StreamType {
    /// Stream type for a wire tag byte. Only stdin, stdout and stderr have tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StreamType::Stdin),
            1 => Some(StreamType::Stdout),
            2 => Some(StreamType::Stderr),
            _ => None,
        }
    }

    /// Wire tag byte, if this type has one.
    pub fn tag(self) -> Option<u8> {
        match self {
            StreamType::Stdin => Some(0),
            StreamType::Stdout => Some(1),
            StreamType::Stderr => Some(2),
            StreamType::Mixed => None,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::Stdin => "stdin",
            StreamType::Stdout => "stdout",
            StreamType::Stderr => "stderr",
            StreamType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// One decoded unit of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HijackedStreamPayload {
    pub stream: StreamType,
    pub data: Bytes,
}

impl HijackedStreamPayload {
    pub fn new(stream: StreamType, data: impl Into<Bytes>) -> Self {
        Self {
            stream,
            data: data.into(),
        }
    }

    /// Payload data as text, replacing invalid UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Recognized tag in the first four bytes of `chunk`, if any.
pub(crate) fn header_tag(chunk: &[u8]) -> Option<StreamType> {
    match chunk {
        [tag, 0, 0, 0, ..] => StreamType::from_tag(*tag),
        _ => None,
    }
}

/// Decode one chunk of a hijacked stream.
///
/// A chunk of at least [`FRAME_HEADER_LEN`] bytes whose first four bytes are a
/// recognized tag followed by three zeros yields that tag's type and the
/// bytes after the header. The length field is not checked. Anything else is
/// continuation data and is returned whole, typed as `fallback`.
///
/// Callers decoding a stream pass the previous payload's type as `fallback`
/// so headerless continuation chunks keep their origin.
pub fn decode_frame(fallback: StreamType, chunk: Bytes) -> HijackedStreamPayload {
    if chunk.len() >= FRAME_HEADER_LEN
        && let Some(stream) = header_tag(&chunk)
    {
        return HijackedStreamPayload::new(stream, chunk.slice(FRAME_HEADER_LEN..));
    }

    HijackedStreamPayload::new(fallback, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for stream in [StreamType::Stdin, StreamType::Stdout, StreamType::Stderr] {
            let tag = stream.tag().unwrap();
            assert_eq!(StreamType::from_tag(tag), Some(stream));
        }
        assert_eq!(StreamType::Mixed.tag(), None);
        assert_eq!(StreamType::from_tag(3), None);
    }

    #[test]
    fn header_tag_needs_three_zeros() {
        assert_eq!(header_tag(&[1, 0, 0, 0]), Some(StreamType::Stdout));
        assert_eq!(header_tag(&[1, 0, 1, 0]), None);
        assert_eq!(header_tag(&[2, 0, 0]), None);
    }
}
