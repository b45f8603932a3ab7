//! Concurrent capture pipeline for the enceladus agent
//!
//! Frames flow from a [`CaptureSource`](enceladus_capture::CaptureSource)
//! through a pool of handlers into a bounded relay queue, and from there
//! through a pool of decoders into a
//! [`MetricsSink`](enceladus_sink::MetricsSink):
//!
//! ```text
//! capture -> handlers (N) -> relay queue -> decoders (M) -> sink
//! ```
//!
//! - [`Pipeline`] / [`RunningPipeline`] - ordered startup and shutdown
//! - [`relay`] - the bounded queue and its backpressure
//! - [`stage`] - readiness/completion barriers and stop signals
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use enceladus_capture::MemorySource;
//! use enceladus_core::{MacAddr, PipelineConfig};
//! use enceladus_pipeline::Pipeline;
//! use enceladus_sink::MemorySink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(
//!         PipelineConfig::for_device("eth0"),
//!         "agent-1",
//!         Arc::new(MemorySource::new("eth0", Vec::new())),
//!         Arc::new(MemorySink::new()),
//!         MacAddr::new([0x02, 0, 0, 0, 0, 0x01]),
//!     );
//!
//!     let running = pipeline
//!         .start(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     let summary = running.wait().await;
//!     println!("stopped after {:?}: {}", summary.uptime, summary.cause);
//!     Ok(())
//! }
//! ```

pub mod decoder;
pub mod handler;
pub mod orchestrator;
pub mod relay;
pub mod reporter;
pub mod shutdown;
pub mod signals;
pub mod stage;

pub use decoder::{DecodeCounters, DecodeStats, FrameDecoder, MEASUREMENT};
pub use orchestrator::{Pipeline, PipelineState, RunningPipeline, ShutdownSummary};
pub use relay::{relay_queue, RelayConsumer, RelayProducer};
pub use reporter::report_counters;
pub use shutdown::{ShutdownCause, ShutdownTrigger};
pub use stage::{StageExit, StageHandle, StageKind, StageStartup};
