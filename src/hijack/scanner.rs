// ABOUTME: Line-oriented chunking of raw hijacked streams.
// ABOUTME: Splits at newlines and frame ends, never inside a frame header.

use super::frame::{FRAME_HEADER_LEN, header_tag};
use crate::runtime::{ByteStream, ClientError};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

enum Header {
    /// A full header declaring this many payload bytes.
    Complete(usize),
    /// Bytes so far could still be a header.
    Partial,
    Absent,
}

fn header_state(buf: &[u8]) -> Header {
    let probe = buf.len().min(4);
    let plausible = buf[0] <= 2 && buf[1..probe].iter().all(|b| *b == 0);

    if !plausible {
        return Header::Absent;
    }
    if buf.len() < FRAME_HEADER_LEN {
        return Header::Partial;
    }
    if header_tag(buf).is_none() {
        return Header::Absent;
    }

    let len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Header::Complete(len as usize)
}

/// Splits a raw byte stream into line chunks for the frame decoder.
///
/// A chunk ends after a `\n`, or at the end of the current frame's declared
/// payload, whichever comes first. A chunk that starts a frame includes its
/// header. A trailing partial line is emitted when the stream ends.
pub struct LineScanner {
    inner: ByteStream,
    buf: BytesMut,
    /// Payload bytes left in the frame being split. Zero at a frame boundary.
    frame_remaining: usize,
    done: bool,
}

impl LineScanner {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            frame_remaining: 0,
            done: false,
        }
    }

    /// Next chunk, or `None` once the stream is exhausted.
    ///
    /// A read error is returned once; the scanner yields nothing after it.
    pub async fn next(&mut self) -> Option<Result<Bytes, ClientError>> {
        loop {
            if let Some(chunk) = self.split(self.done) {
                return Some(Ok(chunk));
            }
            if self.done {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    self.done = true;
                    self.buf.clear();
                    return Some(Err(e));
                }
                None => self.done = true,
            }
        }
    }

    fn split(&mut self, eof: bool) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }

        let (header_len, payload_len) = if self.frame_remaining > 0 {
            (0, Some(self.frame_remaining))
        } else {
            match header_state(&self.buf) {
                Header::Complete(len) => (FRAME_HEADER_LEN, Some(len)),
                Header::Partial if !eof => return None,
                Header::Partial | Header::Absent => (0, None),
            }
        };

        let frame_end = payload_len.map(|len| header_len + len);
        let search_end = frame_end.map_or(self.buf.len(), |end| end.min(self.buf.len()));

        let cut = match self.buf[header_len..search_end]
            .iter()
            .position(|b| *b == b'\n')
        {
            Some(pos) => header_len + pos + 1,
            None => match frame_end {
                Some(end) if end <= self.buf.len() => end,
                _ if eof => self.buf.len(),
                _ => return None,
            },
        };

        self.frame_remaining = match payload_len {
            Some(len) => len.saturating_sub(cut - header_len),
            None => 0,
        };

        Some(self.buf.split_to(cut).freeze())
    }
}
