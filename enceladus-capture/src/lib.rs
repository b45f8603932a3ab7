//! Capture sources for the enceladus agent
//!
//! A [`CaptureSource`] hands out one shared [`FrameStream`] and monotone
//! [`CaptureCounters`]. Two implementations are provided:
//!
//! - [`PcapSource`] - live capture on a device through libpcap
//! - [`MemorySource`] - frames replayed from memory
//!
//! ## Example
//!
//! ```no_run
//! use enceladus_capture::{CaptureConfig, CaptureSource, PcapSource};
//! use enceladus_core::PipelineConfig;
//!
//! # async fn run() -> enceladus_core::Result<()> {
//! let config = CaptureConfig::from_pipeline(&PipelineConfig::for_device("eth0"));
//! let source = PcapSource::open(&config)?;
//! let frames = source.frames()?;
//! while let Some(frame) = frames.next().await {
//!     println!("{} bytes", frame?.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod interface;
pub mod memory;
pub mod source;
pub mod stats;

// Re-export main types
pub use capture::{CaptureConfig, PcapSource};
pub use interface::{list_devices, DeviceInfo};
pub use memory::MemorySource;
pub use source::{frame_channel, CaptureSource, FrameSender, FrameStream};
pub use stats::{CaptureCounters, CounterTracker};
