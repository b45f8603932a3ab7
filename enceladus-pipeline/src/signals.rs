//! Interrupt listener stage

use enceladus_core::Result;
use std::future::Future;
use tracing::{debug, info};

use crate::shutdown::{ShutdownCause, ShutdownTrigger};
use crate::stage::{StageHandle, StageKind, WorkerContext};

async fn run_listener<F>(ctx: WorkerContext, interrupt: F, trigger: ShutdownTrigger) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let WorkerContext { ready, mut stop, .. } = ctx;

    // One poll before readiness so lazily registered handlers are installed
    // and an interrupt that already fired is not lost
    let mut interrupt = std::pin::pin!(interrupt);
    let fired = tokio::select! {
        biased;
        _ = &mut interrupt => true,
        _ = std::future::ready(()) => false,
    };
    ready.signal();
    if fired {
        info!("Interrupt received before startup completed, shutting down");
        trigger.trigger(ShutdownCause::Interrupt);
        return Ok(());
    }
    debug!("Waiting for interrupt");

    tokio::select! {
        biased;
        _ = stop.stopped() => {}
        _ = &mut interrupt => {
            info!("Interrupt received, shutting down");
            trigger.trigger(ShutdownCause::Interrupt);
        }
    }
    Ok(())
}

/// Spawn the listener that turns `interrupt` into a shutdown request
pub fn spawn_signal_stage<F>(interrupt: F, trigger: ShutdownTrigger) -> StageHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut stage = StageHandle::new(StageKind::Signals);
    stage.spawn(move |ctx| run_listener(ctx, interrupt, trigger));
    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;

    #[tokio::test]
    async fn test_interrupt_requests_shutdown() {
        let (trigger, mut causes) = shutdown_channel();
        let (interrupt_tx, interrupt_rx) = tokio::sync::oneshot::channel::<()>();
        let mut stage = spawn_signal_stage(
            async move {
                let _ = interrupt_rx.await;
            },
            trigger,
        );
        stage.wait_ready().await.unwrap();

        interrupt_tx.send(()).unwrap();
        assert_eq!(causes.recv().await, Some(ShutdownCause::Interrupt));
        assert_eq!(stage.stop().await.completed, 1);
    }

    #[tokio::test]
    async fn test_stop_without_interrupt() {
        let (trigger, mut causes) = shutdown_channel();
        let mut stage = spawn_signal_stage(std::future::pending(), trigger);
        stage.wait_ready().await.unwrap();

        assert_eq!(stage.stop().await.completed, 1);
        assert!(causes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_interrupt_already_fired() {
        let (trigger, mut causes) = shutdown_channel();
        let mut stage = spawn_signal_stage(std::future::ready(()), trigger);
        stage.wait_ready().await.unwrap();

        assert_eq!(causes.recv().await, Some(ShutdownCause::Interrupt));
        assert_eq!(stage.stop().await.completed, 1);
    }

    #[tokio::test]
    async fn test_interrupt_polled_before_ready() {
        let (trigger, _causes) = shutdown_channel();
        let polled = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen = std::sync::Arc::clone(&polled);
        let interrupt = std::future::poll_fn(move |_| {
            seen.store(true, std::sync::atomic::Ordering::SeqCst);
            std::task::Poll::<()>::Pending
        });

        let mut stage = spawn_signal_stage(interrupt, trigger);
        stage.wait_ready().await.unwrap();
        assert!(polled.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(stage.stop().await.completed, 1);
    }
}
