//! Capture source contract and the shared frame stream

use crate::stats::CaptureCounters;
use enceladus_core::{Frame, LinkType, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A live capture that hands out frames and counters.
///
/// Implementations are shared between the pipeline stages, so every method
/// takes `&self`. `stats` and `close` may block briefly on the underlying
/// device and should be called off the async executor.
pub trait CaptureSource: Send + Sync {
    /// Capture device identifier
    fn device(&self) -> &str;

    /// Datalink type of the captured frames
    fn link_type(&self) -> LinkType;

    /// The frame stream of this capture.
    ///
    /// The stream is infinite and not restartable: only the first call
    /// succeeds, later calls fail with [`enceladus_core::Error::StreamTaken`].
    fn frames(&self) -> Result<FrameStream>;

    /// A new counters snapshot
    fn stats(&self) -> Result<CaptureCounters>;

    /// Release the device. Idempotent.
    fn close(&self);
}

/// Producer half of a frame stream
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Result<Frame>>,
}

impl FrameSender {
    /// Send from a non-async thread, waiting for space.
    ///
    /// Returns `false` once every [`FrameStream`] clone has been dropped.
    pub fn blocking_send(&self, item: Result<Frame>) -> bool {
        self.tx.blocking_send(item).is_ok()
    }

    /// Send without waiting; `Err` hands the item back when full or closed
    pub fn try_send(&self, item: Result<Frame>) -> std::result::Result<(), Result<Frame>> {
        self.tx.try_send(item).map_err(|e| e.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a frame stream, shareable by any number of workers.
///
/// Each frame is delivered to exactly one caller of [`FrameStream::next`].
#[derive(Debug, Clone)]
pub struct FrameStream {
    rx: Arc<Mutex<mpsc::Receiver<Result<Frame>>>>,
}

impl FrameStream {
    /// Wait for the next frame.
    ///
    /// `None` means the capture ended. Cancel safe: a frame is never lost
    /// when the returned future is dropped.
    pub async fn next(&self) -> Option<Result<Frame>> {
        self.rx.lock().await.recv().await
    }
}

/// Create a bounded frame stream
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FrameSender { tx },
        FrameStream {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use enceladus_core::Error;

    #[tokio::test]
    async fn test_each_frame_delivered_once() {
        let (tx, stream) = frame_channel(4);
        let other = stream.clone();

        assert!(tx.try_send(Ok(Frame::new(vec![1u8; 14]))).is_ok());
        assert!(tx.try_send(Ok(Frame::new(vec![2u8; 14]))).is_ok());

        let first = stream.next().await.unwrap().unwrap();
        let second = other.next().await.unwrap().unwrap();
        assert_eq!(first.data()[0], 1);
        assert_eq!(second.data()[0], 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, stream) = frame_channel(1);
        assert!(tx.try_send(Err(Error::capture("device vanished"))).is_ok());
        drop(tx);

        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sender_sees_closed_stream() {
        let (tx, stream) = frame_channel(1);
        drop(stream);
        assert!(tx.is_closed());
        assert!(tx.try_send(Ok(Frame::new(vec![0u8; 14]))).is_err());
    }
}
