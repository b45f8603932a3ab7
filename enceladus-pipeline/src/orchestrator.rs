//! Lifecycle orchestration
//!
//! [`Pipeline::start`] brings the stages up in dependency order
//! (signals, stats, decoding, handling), waiting on each stage's readiness
//! barrier before starting the next. [`RunningPipeline::wait`] blocks until
//! an interrupt or a capture fault and then stops the stages in reverse
//! order, so every stage outlives the producers feeding it.

use enceladus_capture::{CaptureCounters, CaptureSource};
use enceladus_core::{Frame, MacAddr, PipelineConfig, Result};
use enceladus_sink::{spawn_error_logger, MetricsSink};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::decoder::{spawn_decoding_stage, DecodeCounters, DecodeStats, FrameDecoder};
use crate::handler::spawn_handling_stage;
use crate::relay::relay_queue;
use crate::reporter::{report_counters, snapshot_counters, spawn_stats_stage};
use crate::shutdown::{shutdown_channel, ShutdownCause, ShutdownTrigger};
use crate::signals::spawn_signal_stage;
use crate::stage::{StageHandle, StageKind, StageStartup};

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Starting(StageKind),
    Running,
    Stopping(StageKind),
    Terminated,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Initializing => write!(f, "initializing"),
            PipelineState::Starting(stage) => write!(f, "starting {}", stage),
            PipelineState::Running => write!(f, "running"),
            PipelineState::Stopping(stage) => write!(f, "stopping {}", stage),
            PipelineState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Final accounting of a pipeline run
#[derive(Debug, Clone)]
pub struct ShutdownSummary {
    pub cause: ShutdownCause,
    /// Last capture counters, `None` if they could not be read
    pub counters: Option<CaptureCounters>,
    /// Frames the handlers put on the relay queue
    pub relayed: u64,
    pub decode: DecodeStats,
    /// Workers that failed or panicked
    pub worker_failures: usize,
    /// Metric writes reported failed by the sink
    pub sink_failures: usize,
    pub uptime: Duration,
}

impl ShutdownSummary {
    /// Whether the run ended without a runtime fault
    pub fn is_clean(&self) -> bool {
        !self.cause.is_fault() && self.worker_failures == 0
    }
}

/// A configured pipeline, not yet started
pub struct Pipeline {
    id: Uuid,
    config: Arc<PipelineConfig>,
    decoder: Arc<FrameDecoder>,
    source: Arc<dyn CaptureSource>,
    sink: Arc<dyn MetricsSink>,
    state: watch::Sender<PipelineState>,
}

impl Pipeline {
    /// `local` is the hardware address of the capture device; `agent` tags
    /// every metric point
    pub fn new(
        config: PipelineConfig,
        agent: impl Into<String>,
        source: Arc<dyn CaptureSource>,
        sink: Arc<dyn MetricsSink>,
        local: MacAddr,
    ) -> Self {
        let decoder = Arc::new(FrameDecoder::new(
            local,
            source.link_type(),
            agent,
            config.device_alias(),
        ));
        let (state, _) = watch::channel(PipelineState::Initializing);
        Self {
            id: Uuid::now_v7(),
            config: Arc::new(config),
            decoder,
            source,
            sink,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Follow state transitions
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Start every stage; `interrupt` resolving requests shutdown.
    ///
    /// On failure the stages already running are stopped in reverse order,
    /// the adapters are closed and the pipeline ends `Terminated`.
    pub async fn start<F>(self, interrupt: F) -> Result<RunningPipeline>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        info!(
            id = %self.id,
            device = %config.device,
            alias = %config.device_alias(),
            link_type = %self.source.link_type(),
            handlers = config.handlers,
            decoders = config.decoders,
            relay_capacity = config.relay_capacity(),
            "Starting pipeline"
        );

        let error_logger = self.sink.take_errors().map(spawn_error_logger);
        let (trigger, causes) = shutdown_channel();
        let decode_counters = Arc::new(DecodeCounters::new());
        let relayed = Arc::new(AtomicU64::new(0));
        let (producer, consumer) = relay_queue::<Frame>(config.relay_capacity());

        let mut running = RunningPipeline {
            id: self.id,
            stages: Vec::with_capacity(StageKind::STARTUP_ORDER.len()),
            startup: Vec::with_capacity(StageKind::STARTUP_ORDER.len()),
            causes,
            trigger: trigger.clone(),
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            state: self.state,
            decode_counters: Arc::clone(&decode_counters),
            relayed: Arc::clone(&relayed),
            error_logger,
            started_at: Instant::now(),
        };

        let signal_trigger = trigger.clone();
        running
            .launch(StageKind::Signals, move || {
                Ok(spawn_signal_stage(interrupt, signal_trigger))
            })
            .await?;

        let source = Arc::clone(&self.source);
        let interval = config.stats_interval();
        running
            .launch(StageKind::Stats, move || Ok(spawn_stats_stage(source, interval)))
            .await?;

        let decoder = Arc::clone(&self.decoder);
        let sink = Arc::clone(&self.sink);
        let decoders = config.decoders;
        running
            .launch(StageKind::Decoding, move || {
                Ok(spawn_decoding_stage(decoders, consumer, decoder, sink, decode_counters))
            })
            .await?;

        // The frame stream is opened only once every decoder is ready
        let source = Arc::clone(&self.source);
        let handlers = config.handlers;
        running
            .launch(StageKind::Handling, move || {
                let frames = source.frames()?;
                Ok(spawn_handling_stage(handlers, frames, producer, trigger, relayed))
            })
            .await?;

        running.state.send_replace(PipelineState::Running);
        info!(id = %running.id, "Pipeline running");
        Ok(running)
    }
}

/// A started pipeline
pub struct RunningPipeline {
    id: Uuid,
    /// In startup order
    stages: Vec<StageHandle>,
    startup: Vec<StageStartup>,
    causes: mpsc::Receiver<ShutdownCause>,
    trigger: ShutdownTrigger,
    source: Arc<dyn CaptureSource>,
    sink: Arc<dyn MetricsSink>,
    state: watch::Sender<PipelineState>,
    decode_counters: Arc<DecodeCounters>,
    relayed: Arc<AtomicU64>,
    error_logger: Option<JoinHandle<usize>>,
    started_at: Instant,
}

impl RunningPipeline {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bring-up timing of each stage, in startup order
    pub fn startup_report(&self) -> &[StageStartup] {
        &self.startup
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Follow state transitions
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// A handle that can request shutdown from anywhere
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn decode_stats(&self) -> DecodeStats {
        self.decode_counters.snapshot()
    }

    /// Run until an interrupt or a capture fault, then shut down
    pub async fn wait(mut self) -> ShutdownSummary {
        let cause = self.causes.recv().await.unwrap_or(ShutdownCause::Requested);
        self.shutdown(cause).await
    }

    /// Stop every stage in reverse startup order and release the adapters
    pub async fn shutdown(mut self, cause: ShutdownCause) -> ShutdownSummary {
        if cause.is_fault() {
            error!(id = %self.id, cause = %cause, "Stopping pipeline");
        } else {
            info!(id = %self.id, cause = %cause, "Stopping pipeline");
        }

        let worker_failures = self.stop_stages().await;

        let counters = match snapshot_counters(&self.source).await {
            Ok(counters) => {
                report_counters(&counters);
                Some(counters)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read final capture statistics");
                None
            }
        };

        let relayed = self.relayed.load(Ordering::Relaxed);
        let decode = self.decode_counters.snapshot();
        info!(
            relayed = relayed,
            decoded = decode.decoded,
            malformed = decode.malformed,
            "Decoding totals"
        );

        let sink_failures = self.release_adapters().await;
        self.state.send_replace(PipelineState::Terminated);
        info!(id = %self.id, "Pipeline terminated");

        ShutdownSummary {
            cause,
            counters,
            relayed,
            decode,
            worker_failures,
            sink_failures,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Start one stage and wait on its readiness barrier
    async fn launch<F>(&mut self, kind: StageKind, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<StageHandle>,
    {
        self.state.send_replace(PipelineState::Starting(kind));
        info!(stage = %kind, "Starting stage");

        let stage = match spawn() {
            Ok(stage) => stage,
            Err(e) => {
                error!(stage = %kind, error = %e, "Stage failed to start");
                self.abort().await;
                return Err(e);
            }
        };

        let ready = stage.wait_ready().await;
        self.stages.push(stage);
        match ready {
            Ok(startup) => {
                info!(stage = %kind, workers = startup.workers, "Stage ready");
                self.startup.push(startup);
                Ok(())
            }
            Err(e) => {
                error!(stage = %kind, error = %e, "Stage failed to start");
                self.abort().await;
                Err(e)
            }
        }
    }

    async fn abort(&mut self) {
        self.stop_stages().await;
        self.release_adapters().await;
        self.state.send_replace(PipelineState::Terminated);
        warn!(id = %self.id, "Pipeline startup aborted");
    }

    /// Reverse-order stop; returns the number of failed workers
    async fn stop_stages(&mut self) -> usize {
        let mut failures = 0;
        while let Some(mut stage) = self.stages.pop() {
            let kind = stage.kind();
            self.state.send_replace(PipelineState::Stopping(kind));
            info!(stage = %kind, workers = stage.workers(), "Stopping stage");

            let exit = stage.stop().await;
            failures += exit.failed + exit.panicked;
            info!(stage = %kind, exited = exit.total(), "Stage stopped");
        }
        failures
    }

    /// Flush and close the sink, then close the capture
    async fn release_adapters(&mut self) -> usize {
        if let Err(e) = self.sink.flush().await {
            warn!(error = %e, "Failed to flush metrics sink");
        }
        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "Failed to close metrics sink");
        }

        let source = Arc::clone(&self.source);
        if let Err(e) = tokio::task::spawn_blocking(move || source.close()).await {
            warn!(error = %e, "Failed to close capture");
        }

        match self.error_logger.take() {
            Some(logger) => logger.await.unwrap_or(0),
            None => 0,
        }
    }
}
