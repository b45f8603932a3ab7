//! Metrics sinks for the enceladus agent
//!
//! A [`MetricsSink`] accepts [`MetricPoint`]s without blocking the caller.
//! Writes that fail later are reported as [`SinkError`]s on a side channel,
//! which [`spawn_error_logger`] drains into the log.
//!
//! - [`InfluxSink`] - batched writes to an InfluxDB v2 bucket
//! - [`MemorySink`] - keeps points in memory

pub mod error;
pub mod influx;
pub mod line_protocol;
pub mod memory;
pub mod point;

use async_trait::async_trait;
use enceladus_core::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

pub use error::SinkError;
pub use influx::InfluxSink;
pub use memory::MemorySink;
pub use point::{FieldValue, MetricPoint};

/// Destination of metric points
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Submit one point. Never blocks; failures surface on the error channel.
    fn write_point(&self, point: MetricPoint);

    /// Wait until every point submitted so far has been written out
    async fn flush(&self) -> Result<()>;

    /// Release the sink. Call `flush` first, buffered points may be lost otherwise.
    async fn close(&self) -> Result<()>;

    /// Hand out the error channel; `None` after the first call or when the
    /// sink reports nothing. The channel closes when the sink is closed.
    fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<SinkError>> {
        None
    }
}

/// Log every write failure until the error channel closes
pub fn spawn_error_logger(mut errors: mpsc::UnboundedReceiver<SinkError>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut failures = 0;
        while let Some(e) = errors.recv().await {
            failures += 1;
            error!(error = %e, "Metrics write failed");
        }
        failures
    })
}
