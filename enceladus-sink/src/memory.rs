//! In-memory metrics sink

use async_trait::async_trait;
use enceladus_core::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use crate::error::SinkError;
use crate::point::MetricPoint;
use crate::MetricsSink;

/// [`MetricsSink`] that keeps every accepted point in memory
pub struct MemorySink {
    points: Mutex<Vec<MetricPoint>>,
    written: Notify,
    reject_next: AtomicUsize,
    flushes: AtomicUsize,
    closes: AtomicUsize,
    write_delay: Duration,
    errors_tx: Mutex<Option<mpsc::UnboundedSender<SinkError>>>,
    errors_rx: Mutex<Option<mpsc::UnboundedReceiver<SinkError>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            points: Mutex::new(Vec::new()),
            written: Notify::new(),
            reject_next: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            write_delay: Duration::ZERO,
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx: Mutex::new(Some(errors_rx)),
        }
    }

    /// A sink whose every write blocks the caller for `delay`
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            write_delay: delay,
            ..Self::new()
        }
    }

    /// Fail the next `count` writes as if the store rejected them
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::Release);
    }

    /// Copy of the points accepted so far, in arrival order
    pub fn points(&self) -> Vec<MetricPoint> {
        self.points.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    /// Wait until at least `count` points were accepted
    pub async fn wait_for_points(&self, count: usize) {
        loop {
            let written = self.written.notified();
            if self.len() >= count {
                return;
            }
            written.await;
        }
    }

    fn take_rejection(&self) -> bool {
        self.reject_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    fn write_point(&self, point: MetricPoint) {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        if self.take_rejection() {
            if let Some(errors) = self.errors_tx.lock().as_ref() {
                let _ = errors.send(SinkError::Rejected {
                    points: 1,
                    status: 500,
                    body: format!("rejected point of measurement '{}'", point.measurement),
                });
            }
        } else {
            self.points.lock().push(point);
        }
        self.written.notify_waiters();
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::AcqRel);
        self.errors_tx.lock().take();
        Ok(())
    }

    fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<SinkError>> {
        self.errors_rx.lock().take()
    }
}
