//! Stats Reporter: periodic capture counters

use enceladus_capture::{CaptureCounters, CaptureSource};
use enceladus_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::stage::{StageHandle, StageKind, WorkerContext};

/// Log a counters snapshot, at warn level when anything was dropped
pub fn report_counters(counters: &CaptureCounters) {
    if counters.has_drops() {
        warn!(
            received = counters.received,
            dropped = counters.dropped,
            if_dropped = counters.if_dropped,
            drop_percentage = counters.drop_percentage(),
            "Statistics: {}",
            counters
        );
    } else {
        info!(
            received = counters.received,
            dropped = counters.dropped,
            if_dropped = counters.if_dropped,
            drop_percentage = counters.drop_percentage(),
            "Statistics: {}",
            counters
        );
    }
}

/// Read the counters on the blocking pool; the device lock may be held by
/// a reader waiting out its read timeout
pub async fn snapshot_counters(source: &Arc<dyn CaptureSource>) -> Result<CaptureCounters> {
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || source.stats())
        .await
        .map_err(|e| Error::capture(format!("Statistics task failed: {}", e)))?
}

async fn run_reporter(
    ctx: WorkerContext,
    source: Arc<dyn CaptureSource>,
    interval: Duration,
) -> Result<()> {
    let WorkerContext { ready, mut stop, .. } = ctx;
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ready.signal();
    debug!(interval_secs = interval.as_secs(), "Stats reporter running");

    loop {
        tokio::select! {
            biased;
            _ = stop.stopped() => break,
            _ = ticker.tick() => match snapshot_counters(&source).await {
                Ok(counters) => report_counters(&counters),
                Err(e) => warn!(error = %e, "Failed to read capture statistics"),
            },
        }
    }

    debug!("Stats reporter stopped");
    Ok(())
}

/// Spawn the Stats Reporter polling `source` every `interval`
pub fn spawn_stats_stage(source: Arc<dyn CaptureSource>, interval: Duration) -> StageHandle {
    let mut stage = StageHandle::new(StageKind::Stats);
    stage.spawn(move |ctx| run_reporter(ctx, source, interval));
    stage
}
