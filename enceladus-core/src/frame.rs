//! Captured frame type

use bytes::Bytes;
use std::time::SystemTime;

/// One captured link-layer frame.
///
/// A frame is not `Clone`: it moves from the capture source to a handler,
/// into the relay queue and finally to one decoder.
#[derive(Debug)]
pub struct Frame {
    /// When the frame was captured
    pub timestamp: SystemTime,
    /// Captured bytes (at most the snapshot length)
    pub data: Bytes,
    /// Length on the wire (may exceed `data.len()` if truncated)
    pub len: usize,
}

impl Frame {
    /// Create a frame captured now whose wire length equals its data length
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            timestamp: SystemTime::now(),
            data,
            len,
        }
    }

    /// Create a frame from capture metadata
    pub fn captured(timestamp: SystemTime, data: Bytes, len: usize) -> Self {
        Self {
            timestamp,
            data,
            len,
        }
    }

    /// Get frame data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get length on the wire
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether fewer bytes were captured than were on the wire
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.len
    }
}
