//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use enceladus_core::{Frame, MacAddr, PipelineConfig};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Hardware address of the capture device in tests
pub const LOCAL: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
/// Some other station
pub const PEER: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]);

/// A 64-byte IPv4 Ethernet frame
pub fn ethernet_frame(dst: MacAddr, src: MacAddr) -> Frame {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(dst.as_bytes());
    data.extend_from_slice(src.as_bytes());
    data.extend_from_slice(&[0x08, 0x00]);
    data.resize(64, 0xAB);
    Frame::new(data)
}

/// A frame too short to hold an Ethernet header
pub fn malformed_frame() -> Frame {
    Frame::new(vec![0xFF; 7])
}

pub fn test_config(handlers: usize, decoders: usize) -> PipelineConfig {
    PipelineConfig {
        handlers,
        decoders,
        relay_capacity: Some(16),
        stats_interval_secs: 3600,
        ..PipelineConfig::for_device("mem0")
    }
}

/// Counts warn-level events whose target starts with a prefix
struct WarningCounter {
    target: &'static str,
    count: Arc<AtomicUsize>,
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::WARN && metadata.target().starts_with(self.target) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Count warnings logged from `target` on this thread while the guard lives
pub fn capture_warnings(target: &'static str) -> (DefaultGuard, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarningCounter {
        target,
        count: Arc::clone(&count),
    });
    (tracing::subscriber::set_default(subscriber), count)
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not met within 5s");
}

/// An interrupt future and the sender that fires it
pub fn interrupt() -> (tokio::sync::oneshot::Sender<()>, impl Future<Output = ()> + Send + 'static) {
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    (tx, async move {
        let _ = rx.await;
    })
}
