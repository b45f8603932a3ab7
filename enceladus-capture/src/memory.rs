//! In-memory capture source
//!
//! Replays frames handed to it and then idles like a quiet device. Used to
//! drive the pipeline without a network device.

use enceladus_core::{Error, Frame, LinkType, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::source::{frame_channel, CaptureSource, FrameSender, FrameStream};
use crate::stats::CaptureCounters;

const MIN_CAPACITY: usize = 64;

/// [`CaptureSource`] fed from memory
pub struct MemorySource {
    device: String,
    link_type: LinkType,
    sender: Mutex<Option<FrameSender>>,
    stream: Mutex<Option<FrameStream>>,
    counters: Mutex<CaptureCounters>,
    frames_requested_at: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl MemorySource {
    /// An Ethernet source that will yield `frames` in order
    pub fn new(device: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self::with_link_type(device, LinkType::Ethernet, frames)
    }

    pub fn with_link_type(device: impl Into<String>, link_type: LinkType, frames: Vec<Frame>) -> Self {
        let (sender, stream) = frame_channel(frames.len().max(MIN_CAPACITY));
        for frame in frames {
            // Capacity covers every initial frame
            let _ = sender.try_send(Ok(frame));
        }

        Self {
            device: device.into(),
            link_type,
            sender: Mutex::new(Some(sender)),
            stream: Mutex::new(Some(stream)),
            counters: Mutex::new(CaptureCounters::default()),
            frames_requested_at: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue another frame behind the ones not yet consumed
    pub fn inject(&self, frame: Frame) -> Result<()> {
        self.push(Ok(frame))
    }

    /// Make the stream yield a read failure
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.push(Err(Error::capture(reason)))
    }

    fn push(&self, item: Result<Frame>) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| Error::capture(format!("Capture on {} is closed", self.device)))?;
        sender
            .try_send(item)
            .map_err(|_| Error::capture(format!("Capture buffer on {} is full", self.device)))
    }

    /// Replace the counters reported by `stats`.
    ///
    /// Values lower than the current ones are ignored so the counters stay
    /// monotone.
    pub fn set_counters(&self, counters: CaptureCounters) {
        let mut current = self.counters.lock();
        current.received = current.received.max(counters.received);
        current.dropped = current.dropped.max(counters.dropped);
        current.if_dropped = current.if_dropped.max(counters.if_dropped);
    }

    /// When the frame stream was handed out
    pub fn frames_requested_at(&self) -> Option<Instant> {
        *self.frames_requested_at.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl CaptureSource for MemorySource {
    fn device(&self) -> &str {
        &self.device
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn frames(&self) -> Result<FrameStream> {
        let stream = self
            .stream
            .lock()
            .take()
            .ok_or_else(|| Error::StreamTaken(self.device.clone()))?;
        *self.frames_requested_at.lock() = Some(Instant::now());
        Ok(stream)
    }

    fn stats(&self) -> Result<CaptureCounters> {
        Ok(*self.counters.lock())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sender.lock().take();
    }
}
