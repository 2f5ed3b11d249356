// ABOUTME: Single-producer, single-consumer delivery of decoded payloads.
// ABOUTME: A spawned task owns the network read; dropping its sender ends the sequence.

use super::frame::{HijackedStreamPayload, StreamType, decode_frame};
use super::scanner::LineScanner;
use crate::runtime::{ByteStream, ClientError};
use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A lazy, finite, non-restartable sequence fed by a producer task.
///
/// The producer blocks until the consumer has taken the previous item, so a
/// slow consumer slows down the network read behind it.
#[derive(Debug)]
pub struct PayloadStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> PayloadStream<T> {
    /// A connected sender and stream with a single in-flight slot.
    pub(crate) fn channel() -> (mpsc::Sender<T>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// Next item, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drain every remaining item.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item);
        }
        items
    }
}

impl<T> Stream for PayloadStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Decode a raw hijacked stream on a spawned task.
///
/// Each chunk is decoded with the previous payload's type as the fallback,
/// starting from `initial`. After the raw stream ends or fails, `finish` runs
/// before the sequence is closed.
pub fn spawn_decoder<F>(
    raw: ByteStream,
    initial: StreamType,
    finish: F,
) -> PayloadStream<HijackedStreamPayload>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (tx, stream) = PayloadStream::channel();

    tokio::spawn(async move {
        let mut scanner = LineScanner::new(raw);
        let mut last = initial;

        while let Some(chunk) = scanner.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, "hijacked stream read failed");
                    break;
                }
            };

            let payload = decode_frame(last, chunk);
            last = payload.stream;
            if tx.send(payload).await.is_err() {
                debug!("payload consumer went away, stopping read");
                break;
            }
        }

        finish.await;
    });

    stream
}

/// Split an unframed stream into lines on a spawned task, mapping each one.
///
/// Lines mapped to `None` are skipped. A read error is handed to `on_error`,
/// whose item, if any, is the last one delivered.
pub(crate) fn spawn_lines<T, F, G>(raw: ByteStream, mut map: F, on_error: G) -> PayloadStream<T>
where
    T: Send + 'static,
    F: FnMut(Bytes) -> Option<T> + Send + 'static,
    G: FnOnce(ClientError) -> Option<T> + Send + 'static,
{
    let (tx, stream) = PayloadStream::channel();

    tokio::spawn(async move {
        let mut scanner = LineScanner::new(raw);

        while let Some(line) = scanner.next().await {
            let item = match line {
                Ok(line) => map(line),
                Err(e) => {
                    debug!(error = %e, "line stream failed, handing error to consumer");
                    if let Some(item) = on_error(e) {
                        let _ = tx.send(item).await;
                    }
                    break;
                }
            };

            let Some(item) = item else { continue };
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });

    stream
}

/// Decode a raw hijacked stream with nothing to run at the end.
pub fn decode_stream(raw: ByteStream, initial: StreamType) -> PayloadStream<HijackedStreamPayload> {
    spawn_decoder(raw, initial, async {})
}
