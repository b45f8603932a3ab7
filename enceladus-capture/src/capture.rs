//! Live capture on a network device through libpcap

use bytes::Bytes;
use enceladus_core::{Error, Frame, LinkType, PipelineConfig, Result};
use parking_lot::Mutex;
use pcap::{Active, Capture, Device};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::source::{frame_channel, CaptureSource, FrameSender, FrameStream};
use crate::stats::{CaptureCounters, CounterTracker};

/// Frames buffered between the reader thread and the handlers
const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Configuration for a live capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device to open
    pub device: String,
    /// Maximum bytes to capture per frame
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Kernel buffer size in bytes
    pub buffer_size: i32,
    /// Deliver frames as soon as they arrive instead of batching them
    pub immediate_mode: bool,
    /// Capacity of the frame stream
    pub channel_capacity: usize,
}

impl CaptureConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            device: config.device.clone(),
            snaplen: config.snap_length,
            timeout_ms: i32::try_from(config.capture_timeout().as_millis()).unwrap_or(i32::MAX),
            promiscuous: config.promiscuous,
            buffer_size: config.buffer_size,
            immediate_mode: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// libpcap-backed [`CaptureSource`]
pub struct PcapSource {
    device: String,
    link_type: LinkType,
    channel_capacity: usize,
    capture: Arc<Mutex<Capture<Active>>>,
    running: Arc<AtomicBool>,
    stream_taken: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
    counters: Mutex<CounterTracker>,
}

impl PcapSource {
    /// Open and activate a live capture
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        debug!(
            device = %config.device,
            snaplen = config.snaplen,
            promiscuous = config.promiscuous,
            buffer_size = config.buffer_size,
            timeout_ms = config.timeout_ms,
            "Opening live capture"
        );

        let device = Device::from(config.device.as_str());
        let capture = Capture::from_device(device)
            .map_err(|e| Error::capture(format!("Failed to create capture on {}: {}", config.device, e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .buffer_size(config.buffer_size)
            .immediate_mode(config.immediate_mode)
            .open()
            .map_err(|e| Error::capture(format!("Failed to open capture on {}: {}", config.device, e)))?;

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        info!(device = %config.device, link_type = %link_type, "Capture opened");

        Ok(Self {
            device: config.device.clone(),
            link_type,
            channel_capacity: config.channel_capacity,
            capture: Arc::new(Mutex::new(capture)),
            running: Arc::new(AtomicBool::new(true)),
            stream_taken: AtomicBool::new(false),
            reader: Mutex::new(None),
            counters: Mutex::new(CounterTracker::new()),
        })
    }

    fn read_loop(
        device: String,
        capture: Arc<Mutex<Capture<Active>>>,
        running: Arc<AtomicBool>,
        sender: FrameSender,
    ) {
        debug!(device = %device, "Capture reader started");

        while running.load(Ordering::Acquire) {
            // The lock is held for one read only so `stats` can interleave
            let next = {
                let mut capture = capture.lock();
                match capture.next_packet() {
                    Ok(packet) => Ok(Some(Frame::captured(
                        capture_time(packet.header.ts.tv_sec as i64, packet.header.ts.tv_usec as i64),
                        Bytes::copy_from_slice(packet.data),
                        packet.header.len as usize,
                    ))),
                    Err(pcap::Error::TimeoutExpired) => Ok(None),
                    Err(e) => Err(Error::capture(format!("Read failed on {}: {}", device, e))),
                }
            };

            match next {
                Ok(Some(frame)) => {
                    if !sender.blocking_send(Ok(frame)) {
                        debug!(device = %device, "Frame stream dropped");
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(device = %device, error = %e, "Packet capture error");
                    let _ = sender.blocking_send(Err(e));
                    break;
                }
            }
        }

        debug!(device = %device, "Capture reader finished");
    }
}

/// Convert a pcap header timestamp, falling back to now for nonsense values
fn capture_time(secs: i64, micros: i64) -> SystemTime {
    let (Ok(secs), Ok(micros)) = (u64::try_from(secs), u32::try_from(micros)) else {
        return SystemTime::now();
    };
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs) + Duration::from_micros(u64::from(micros)))
        .unwrap_or_else(SystemTime::now)
}

impl CaptureSource for PcapSource {
    fn device(&self) -> &str {
        &self.device
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn frames(&self) -> Result<FrameStream> {
        if self.stream_taken.swap(true, Ordering::AcqRel) {
            return Err(Error::StreamTaken(self.device.clone()));
        }

        let (sender, stream) = frame_channel(self.channel_capacity);
        let device = self.device.clone();
        let capture = Arc::clone(&self.capture);
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name(format!("pcap-{}", self.device))
            .spawn(move || Self::read_loop(device, capture, running, sender))?;
        *self.reader.lock() = Some(handle);

        Ok(stream)
    }

    fn stats(&self) -> Result<CaptureCounters> {
        let raw = self
            .capture
            .lock()
            .stats()
            .map_err(|e| Error::capture(format!("Failed to get stats on {}: {}", self.device, e)))?;
        Ok(self
            .counters
            .lock()
            .observe(raw.received, raw.dropped, raw.if_dropped))
    }

    /// Stop the reader thread and wait for it.
    ///
    /// The reader may be blocked handing a frame to a full stream, so every
    /// [`FrameStream`] clone must be dropped before calling this.
    fn close(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                warn!(device = %self.device, "Capture reader panicked");
            }
        }
        info!(device = %self.device, "Capture closed");
    }
}

impl Drop for PcapSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_pipeline() {
        let mut pipeline = PipelineConfig::for_device("eth0");
        pipeline.promiscuous = true;
        pipeline.capture_timeout_ms = 250;

        let config = CaptureConfig::from_pipeline(&pipeline);
        assert_eq!(config.device, "eth0");
        assert_eq!(config.snaplen, 1600);
        assert_eq!(config.buffer_size, 320_000_000);
        assert_eq!(config.timeout_ms, 250);
        assert!(config.promiscuous);

        pipeline.capture_timeout_ms = u64::MAX;
        assert_eq!(CaptureConfig::from_pipeline(&pipeline).timeout_ms, i32::MAX);
    }

    #[test]
    fn test_capture_time() {
        let ts = capture_time(1_700_000_000, 250_000);
        assert_eq!(
            ts.duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_millis(1_700_000_000_250)
        );
    }

    #[test]
    fn test_capture_time_rejects_negative() {
        let before = SystemTime::now();
        assert!(capture_time(-1, 0) >= before);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut pipeline = PipelineConfig::for_device("nonexistent_interface_xyz");
        pipeline.buffer_size = 1 << 20;
        let result = PcapSource::open(&CaptureConfig::from_pipeline(&pipeline));
        assert!(matches!(result, Err(Error::Capture(_))));
    }
}
