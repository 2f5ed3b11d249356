// ABOUTME: Tests for splitting raw hijacked streams into decoder chunks.
// ABOUTME: Covers newline splits, frame boundaries, and partial headers.

mod support;

use bytes::Bytes;
use dockproc::hijack::{LineScanner, StreamType, decode_stream};
use dockproc::runtime::{ByteStream, ClientError};
use futures::stream;
use support::frame;

fn raw(parts: Vec<Vec<u8>>) -> ByteStream {
    Box::pin(stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p)))))
}

async fn scan(parts: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut scanner = LineScanner::new(raw(parts));
    let mut out = Vec::new();
    while let Some(chunk) = scanner.next().await {
        out.push(chunk.unwrap().to_vec());
    }
    out
}

#[tokio::test]
async fn splits_unframed_text_at_newlines() {
    let chunks = scan(vec![b"one\ntw".to_vec(), b"o\nthree".to_vec()]).await;
    assert_eq!(
        chunks,
        vec![b"one\n".to_vec(), b"two\n".to_vec(), b"three".to_vec()]
    );
}

#[tokio::test]
async fn frame_header_stays_with_first_line() {
    let chunks = scan(vec![frame(1, b"hello\nworld\n")]).await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(&chunks[0][..8], &[1, 0, 0, 0, 0, 0, 0, 12]);
    assert_eq!(&chunks[0][8..], b"hello\n");
    assert_eq!(chunks[1], b"world\n".to_vec());
}

#[tokio::test]
async fn header_split_across_reads_is_reassembled() {
    let framed = frame(2, b"err\n");
    let chunks = scan(vec![framed[..3].to_vec(), framed[3..].to_vec()]).await;
    assert_eq!(chunks, vec![framed]);
}

#[tokio::test]
async fn cuts_at_frame_end_without_newline() {
    let mut bytes = frame(1, b"abc");
    bytes.extend(frame(2, b"def\n"));
    let chunks = scan(vec![bytes]).await;
    assert_eq!(chunks, vec![frame(1, b"abc"), frame(2, b"def\n")]);
}

#[tokio::test]
async fn trailing_partial_line_is_emitted() {
    let chunks = scan(vec![frame(1, b"no newline")]).await;
    assert_eq!(chunks, vec![frame(1, b"no newline")]);

    let chunks = scan(vec![b"tail".to_vec()]).await;
    assert_eq!(chunks, vec![b"tail".to_vec()]);
}

#[tokio::test]
async fn read_error_is_reported_once() {
    let parts: Vec<Result<Bytes, ClientError>> = vec![
        Ok(Bytes::from_static(b"ok\n")),
        Err(ClientError::Transport("connection reset".into())),
        Ok(Bytes::from_static(b"never\n")),
    ];
    let mut scanner = LineScanner::new(Box::pin(stream::iter(parts)));

    assert_eq!(&scanner.next().await.unwrap().unwrap()[..], b"ok\n");
    assert!(scanner.next().await.unwrap().is_err());
    assert!(scanner.next().await.is_none());
}

#[tokio::test]
async fn decoded_stream_types_interleaved_frames() {
    support::init_tracing();

    let mut bytes = frame(1, b"out 1\nout 2\n");
    bytes.extend(frame(2, b"err 1\n"));
    bytes.extend(frame(1, b"out 3\n"));

    // Split mid-frame to exercise continuation handling.
    let (a, b) = bytes.split_at(11);
    let payloads = decode_stream(raw(vec![a.to_vec(), b.to_vec()]), StreamType::Mixed)
        .collect_all()
        .await;

    let got: Vec<(StreamType, String)> = payloads
        .iter()
        .map(|p| (p.stream, p.text().into_owned()))
        .collect();
    assert_eq!(
        got,
        vec![
            (StreamType::Stdout, "out 1\n".to_string()),
            (StreamType::Stdout, "out 2\n".to_string()),
            (StreamType::Stderr, "err 1\n".to_string()),
            (StreamType::Stdout, "out 3\n".to_string()),
        ]
    );
}

#[tokio::test]
async fn unframed_stream_uses_initial_type() {
    let payloads = decode_stream(raw(vec![b"hello\r\n".to_vec()]), StreamType::Stderr)
        .collect_all()
        .await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].stream, StreamType::Stderr);
    assert_eq!(&payloads[0].data[..], b"hello\r\n");
}
