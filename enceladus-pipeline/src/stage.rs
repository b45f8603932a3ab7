//! Stage bookkeeping: readiness and completion barriers, stop signals
//!
//! A stage is a pool of symmetric workers spawned onto one [`JoinSet`].
//! Each worker gets a [`WorkerContext`] holding a once-only
//! [`ReadySignal`] and a [`StopSignal`] shared by the whole pool.

use enceladus_core::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Pipeline stages in startup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    /// Interrupt listener
    Signals,
    /// Periodic capture statistics
    Stats,
    /// Decoder pool
    Decoding,
    /// Handler pool
    Handling,
}

impl StageKind {
    /// Every stage, in startup order
    pub const STARTUP_ORDER: [StageKind; 4] = [
        StageKind::Signals,
        StageKind::Stats,
        StageKind::Decoding,
        StageKind::Handling,
    ];

    /// Position in the startup order
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Signals => "signals",
            StageKind::Stats => "stats",
            StageKind::Decoding => "decoding",
            StageKind::Handling => "handling",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness token of one worker.
///
/// Call [`ReadySignal::signal`] once setup is done and before consuming
/// input. Dropping it unsignaled (early return or panic) marks the worker
/// as failed, so the stage never waits forever.
pub struct ReadySignal {
    permits: Arc<Semaphore>,
    abandoned: Arc<AtomicUsize>,
    signaled: bool,
}

impl ReadySignal {
    pub fn signal(mut self) {
        self.signaled = true;
        self.permits.add_permits(1);
    }
}

impl Drop for ReadySignal {
    fn drop(&mut self) {
        if !self.signaled {
            self.abandoned.fetch_add(1, Ordering::AcqRel);
            self.permits.add_permits(1);
        }
    }
}

/// Stop indication broadcast to every worker of a stage
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once the stage is told to stop. Cancel safe.
    pub async fn stopped(&mut self) {
        // A dropped sender also means stop
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// What a worker receives when spawned
pub struct WorkerContext {
    /// Worker number within its stage
    pub id: usize,
    pub ready: ReadySignal,
    pub stop: StopSignal,
}

/// How the workers of a stage ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageExit {
    /// Workers that returned `Ok`
    pub completed: usize,
    /// Workers that returned an error
    pub failed: usize,
    /// Workers that panicked
    pub panicked: usize,
}

impl StageExit {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.panicked
    }
}

/// Timing of one stage's bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStartup {
    pub kind: StageKind,
    pub workers: usize,
    /// When the first worker was spawned
    pub spawned_at: Instant,
    /// When the last worker signaled readiness
    pub ready_at: Instant,
}

/// Bookkeeping of one running stage
pub struct StageHandle {
    kind: StageKind,
    workers: usize,
    ready: Arc<Semaphore>,
    abandoned: Arc<AtomicUsize>,
    stop_tx: watch::Sender<bool>,
    tasks: JoinSet<Result<()>>,
    spawned_at: Option<Instant>,
}

impl StageHandle {
    pub fn new(kind: StageKind) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            kind,
            workers: 0,
            ready: Arc::new(Semaphore::new(0)),
            abandoned: Arc::new(AtomicUsize::new(0)),
            stop_tx,
            tasks: JoinSet::new(),
            spawned_at: None,
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn one worker of this stage
    pub fn spawn<F, Fut>(&mut self, worker: F)
    where
        F: FnOnce(WorkerContext) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let ctx = WorkerContext {
            id: self.workers,
            ready: ReadySignal {
                permits: Arc::clone(&self.ready),
                abandoned: Arc::clone(&self.abandoned),
                signaled: false,
            },
            stop: StopSignal {
                rx: self.stop_tx.subscribe(),
            },
        };
        self.spawned_at.get_or_insert_with(Instant::now);
        self.workers += 1;
        self.tasks.spawn(worker(ctx));
    }

    /// Readiness barrier: wait until every spawned worker has signaled.
    ///
    /// Fails if any worker dropped its [`ReadySignal`] without signaling.
    pub async fn wait_ready(&self) -> Result<StageStartup> {
        let workers = u32::try_from(self.workers)
            .map_err(|_| Error::stage_startup(self.kind.as_str(), "too many workers"))?;
        let permits = self
            .ready
            .acquire_many(workers)
            .await
            .map_err(|_| Error::stage_startup(self.kind.as_str(), "readiness barrier closed"))?;
        permits.forget();
        let ready_at = Instant::now();

        let abandoned = self.abandoned.load(Ordering::Acquire);
        if abandoned > 0 {
            return Err(Error::stage_startup(
                self.kind.as_str(),
                format!("{} of {} workers exited before signaling readiness", abandoned, self.workers),
            ));
        }

        debug!(stage = %self.kind, workers = self.workers, "Stage ready");
        Ok(StageStartup {
            kind: self.kind,
            workers: self.workers,
            spawned_at: self.spawned_at.unwrap_or(ready_at),
            ready_at,
        })
    }

    /// Broadcast the stop signal without waiting
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop every worker and wait for all of them: the completion barrier
    pub async fn stop(&mut self) -> StageExit {
        self.signal_stop();
        self.join_all().await
    }

    async fn join_all(&mut self) -> StageExit {
        let mut exit = StageExit::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => exit.completed += 1,
                Ok(Err(e)) => {
                    error!(stage = %self.kind, error = %e, "Worker failed");
                    exit.failed += 1;
                }
                Err(e) if e.is_panic() => {
                    error!(stage = %self.kind, "Worker panicked");
                    exit.panicked += 1;
                }
                Err(e) => {
                    error!(stage = %self.kind, error = %e, "Worker cancelled");
                    exit.failed += 1;
                }
            }
        }
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn test_startup_order() {
        let indices: Vec<_> = StageKind::STARTUP_ORDER.iter().map(|k| k.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(StageKind::Decoding.to_string(), "decoding");
    }

    #[tokio::test]
    async fn test_ready_after_all_workers_signal() {
        let mut stage = StageHandle::new(StageKind::Decoding);
        for _ in 0..3 {
            stage.spawn(|mut ctx| async move {
                ctx.ready.signal();
                ctx.stop.stopped().await;
                Ok(())
            });
        }

        let startup = tokio::time::timeout(Duration::from_secs(1), stage.wait_ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(startup.workers, 3);
        assert!(startup.spawned_at <= startup.ready_at);

        let exit = stage.stop().await;
        assert_eq!(exit.completed, 3);
        assert_eq!(exit.total(), 3);
    }

    #[tokio::test]
    async fn test_not_ready_until_last_worker_signals() {
        let mut stage = StageHandle::new(StageKind::Handling);
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        stage.spawn(|mut ctx| async move {
            ctx.ready.signal();
            ctx.stop.stopped().await;
            Ok(())
        });
        stage.spawn(|mut ctx| async move {
            let _ = go_rx.await;
            ctx.ready.signal();
            ctx.stop.stopped().await;
            Ok(())
        });

        let early = tokio::time::timeout(Duration::from_millis(30), stage.wait_ready()).await;
        assert!(early.is_err());

        go_tx.send(()).unwrap();
        assert!(stage.wait_ready().await.is_ok());
        stage.stop().await;
    }

    #[tokio::test]
    async fn test_worker_exiting_unready_fails_startup() {
        let mut stage = StageHandle::new(StageKind::Stats);
        stage.spawn(|ctx| async move {
            drop(ctx);
            Err(Error::capture("setup failed"))
        });

        let err = stage.wait_ready().await.unwrap_err();
        assert!(matches!(err, Error::StageStartup { ref stage, .. } if stage == "stats"));

        let exit = stage.stop().await;
        assert_eq!(exit.failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_fails_startup() {
        let mut stage = StageHandle::new(StageKind::Decoding);
        stage.spawn(|ctx| async move {
            let _ctx = ctx;
            if true {
                panic!("decoder setup blew up");
            }
            Ok(())
        });

        assert!(stage.wait_ready().await.is_err());
        assert_eq!(stage.stop().await.panicked, 1);
    }

    #[tokio::test]
    async fn test_stop_reaches_every_worker() {
        let mut stage = StageHandle::new(StageKind::Handling);
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let seen = Arc::clone(&seen);
            stage.spawn(move |mut ctx| async move {
                ctx.ready.signal();
                ctx.stop.stopped().await;
                assert!(ctx.stop.is_stopped());
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        stage.wait_ready().await.unwrap();

        let exit = stage.stop().await;
        assert_eq!(exit.completed, 4);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_worker_ids_are_distinct() {
        let mut stage = StageHandle::new(StageKind::Decoding);
        let flags: Arc<Vec<AtomicBool>> = Arc::new((0..3).map(|_| AtomicBool::new(false)).collect());
        for _ in 0..3 {
            let flags = Arc::clone(&flags);
            stage.spawn(move |ctx| async move {
                flags[ctx.id].store(true, Ordering::SeqCst);
                ctx.ready.signal();
                Ok(())
            });
        }
        stage.wait_ready().await.unwrap();
        stage.stop().await;
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }
}
