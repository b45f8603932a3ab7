//! Handling Stage: capture stream to relay queue
//!
//! Handlers do no decoding. Each one moves frames from the shared capture
//! stream into the relay queue as fast as the queue accepts them; a full
//! queue is the only thing that slows them down.

use enceladus_capture::FrameStream;
use enceladus_core::{Error, Frame, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::relay::RelayProducer;
use crate::shutdown::{ShutdownCause, ShutdownTrigger};
use crate::stage::{StageHandle, StageKind, WorkerContext};

async fn run_handler(
    ctx: WorkerContext,
    frames: FrameStream,
    relay: RelayProducer<Frame>,
    trigger: ShutdownTrigger,
    total: Arc<AtomicU64>,
) -> Result<()> {
    let WorkerContext { id, ready, mut stop } = ctx;
    ready.signal();

    let mut relayed = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = stop.stopped() => break,
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    // Finish this push even if stop arrives meanwhile
                    if relay.push(frame).await.is_err() {
                        error!(worker = id, relayed = relayed, "Relay queue closed, frame dropped");
                        trigger.trigger(ShutdownCause::StageFault("relay queue closed".to_string()));
                        return Err(Error::RelayClosed);
                    }
                    relayed += 1;
                    total.fetch_add(1, Ordering::Relaxed);
                }
                Some(Err(e)) => {
                    error!(worker = id, error = %e, "Capture failed");
                    trigger.trigger(ShutdownCause::CaptureFault(e.to_string()));
                    break;
                }
                None => {
                    error!(worker = id, "Capture stream ended");
                    trigger.trigger(ShutdownCause::CaptureFault("capture stream ended".to_string()));
                    break;
                }
            },
        }
    }

    debug!(worker = id, relayed = relayed, "Handler stopped");
    Ok(())
}

/// Spawn the Handling Stage with `workers` handlers; `relayed` counts
/// every frame they enqueue
pub fn spawn_handling_stage(
    workers: usize,
    frames: FrameStream,
    relay: RelayProducer<Frame>,
    trigger: ShutdownTrigger,
    relayed: Arc<AtomicU64>,
) -> StageHandle {
    let mut stage = StageHandle::new(StageKind::Handling);
    for _ in 0..workers {
        let frames = frames.clone();
        let relay = relay.clone();
        let trigger = trigger.clone();
        let relayed = Arc::clone(&relayed);
        stage.spawn(move |ctx| run_handler(ctx, frames, relay, trigger, relayed));
    }
    stage
}
