//! Batched InfluxDB v2 writer
//!
//! `write_point` only enqueues; a background task batches points, encodes
//! them as line protocol and POSTs them to `/api/v2/write`. Failures are
//! reported on the error channel and never retried.

use async_trait::async_trait;
use enceladus_core::{Error, MetricsConfig, Result};
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::line_protocol::encode_batch;
use crate::point::MetricPoint;
use crate::MetricsSink;

/// Per-request timeout of the HTTP client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

enum Command {
    Point(MetricPoint),
    Flush(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Target of write requests
#[derive(Debug, Clone)]
struct WriteEndpoint {
    url: String,
    org: String,
    bucket: String,
    token: String,
}

impl WriteEndpoint {
    fn new(config: &MetricsConfig) -> Self {
        Self {
            url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
        }
    }

    async fn write(&self, client: &HttpClient, points: &[MetricPoint]) -> std::result::Result<(), SinkError> {
        let (body, skipped) = encode_batch(points);
        let count = points.len() - skipped;
        if count > 0 {
            let mut request = client
                .post(&self.url)
                .query(&[
                    ("org", self.org.as_str()),
                    ("bucket", self.bucket.as_str()),
                    ("precision", "ns"),
                ])
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(body);
            if !self.token.is_empty() {
                request = request.header("Authorization", format!("Token {}", self.token));
            }

            let response = request.send().await.map_err(|e| SinkError::Transport {
                points: count,
                reason: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SinkError::Rejected {
                    points: count,
                    status: status.as_u16(),
                    body,
                });
            }
            debug!(points = count, "Wrote batch");
        }

        if skipped > 0 {
            return Err(SinkError::Unencodable(skipped));
        }
        Ok(())
    }
}

/// [`MetricsSink`] writing to an InfluxDB v2 bucket
pub struct InfluxSink {
    commands: mpsc::Sender<Command>,
    errors_tx: Mutex<Option<mpsc::UnboundedSender<SinkError>>>,
    errors_rx: Mutex<Option<mpsc::UnboundedReceiver<SinkError>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl InfluxSink {
    /// Create the client and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &MetricsConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::sink(format!("Failed to build HTTP client: {}", e)))?;
        let endpoint = WriteEndpoint::new(config);
        let (commands, rx) = mpsc::channel(config.buffer_capacity);
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        info!(
            url = %endpoint.url,
            org = %endpoint.org,
            bucket = %endpoint.bucket,
            batch_size = config.batch_size,
            "Metrics sink opened"
        );

        let writer = tokio::spawn(run_writer(
            client,
            endpoint,
            rx,
            errors_tx.clone(),
            config.batch_size,
            config.flush_interval(),
        ));

        Ok(Self {
            commands,
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx: Mutex::new(Some(errors_rx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    fn report(&self, error: SinkError) {
        if let Some(errors) = self.errors_tx.lock().as_ref() {
            let _ = errors.send(error);
        }
    }

    async fn request(&self, make: fn(oneshot::Sender<()>) -> Command) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::sink("writer task has stopped"))?;
        done.await.map_err(|_| Error::sink("writer task has stopped"))
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    fn write_point(&self, point: MetricPoint) {
        match self.commands.try_send(Command::Point(point)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Command::Point(point))) => {
                self.report(SinkError::BufferFull {
                    measurement: point.measurement,
                })
            }
            Err(mpsc::error::TrySendError::Closed(Command::Point(point))) => {
                self.report(SinkError::Closed {
                    measurement: point.measurement,
                })
            }
            Err(_) => {}
        }
    }

    async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    async fn close(&self) -> Result<()> {
        let result = self.request(Command::Close).await;
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "Metrics writer task failed");
            }
        }
        // Dropping the last sender ends the error logger
        self.errors_tx.lock().take();
        info!("Metrics sink closed");
        result
    }

    fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<SinkError>> {
        self.errors_rx.lock().take()
    }
}

async fn run_writer(
    client: HttpClient,
    endpoint: WriteEndpoint,
    mut commands: mpsc::Receiver<Command>,
    errors: mpsc::UnboundedSender<SinkError>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<MetricPoint> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Point(point)) => {
                    batch.push(point);
                    if batch.len() >= batch_size {
                        write_batch(&client, &endpoint, &errors, &mut batch).await;
                    }
                }
                Some(Command::Flush(reply)) => {
                    write_batch(&client, &endpoint, &errors, &mut batch).await;
                    let _ = reply.send(());
                }
                Some(Command::Close(reply)) => {
                    write_batch(&client, &endpoint, &errors, &mut batch).await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    write_batch(&client, &endpoint, &errors, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                write_batch(&client, &endpoint, &errors, &mut batch).await;
            }
        }
    }

    debug!("Metrics writer finished");
}

async fn write_batch(
    client: &HttpClient,
    endpoint: &WriteEndpoint,
    errors: &mpsc::UnboundedSender<SinkError>,
    batch: &mut Vec<MetricPoint>,
) {
    if batch.is_empty() {
        return;
    }
    let points = std::mem::take(batch);
    if let Err(e) = endpoint.write(client, &points).await {
        let _ = errors.send(e);
    }
}
