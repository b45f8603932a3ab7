//! Decoding Stage: relay queue to metric points
//!
//! Each worker takes frames from the relay queue, reads the link-layer
//! header and submits exactly one `Ethernet` point per well-formed frame.
//! Frames without a readable header are logged at warn level and counted.
//! On stop a worker drains what is still queued before it exits.

use enceladus_core::{Frame, LinkType, MacAddr, Result};
use enceladus_packet::{HeaderError, LinkLayerRecord};
use enceladus_sink::{MetricPoint, MetricsSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::relay::RelayConsumer;
use crate::stage::{StageHandle, StageKind, WorkerContext};

/// Measurement name of link-layer points
pub const MEASUREMENT: &str = "Ethernet";

/// Turns frames into link-layer records and metric points
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    local: MacAddr,
    link_type: LinkType,
    agent: String,
    device: String,
}

impl FrameDecoder {
    /// `local` is the hardware address of the capture device, `agent` and
    /// `device` become point tags
    pub fn new(
        local: MacAddr,
        link_type: LinkType,
        agent: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            local,
            link_type,
            agent: agent.into(),
            device: device.into(),
        }
    }

    pub fn decode(&self, frame: &Frame) -> std::result::Result<LinkLayerRecord, HeaderError> {
        LinkLayerRecord::from_frame(frame, self.link_type, self.local)
    }

    /// Build the point for `record`, stamped with the decode time
    pub fn to_point(&self, record: &LinkLayerRecord, decoded_at: SystemTime) -> MetricPoint {
        MetricPoint::new(MEASUREMENT)
            .tag("agent", self.agent.as_str())
            .tag("device", self.device.as_str())
            .tag("ether_type", record.ethertype.to_string())
            .tag("direction", record.direction.as_str())
            .field("src_mac", record.source.to_string())
            .field("dst_mac", record.destination.to_string())
            .field("frame_length", record.length)
            .at(decoded_at)
    }
}

/// Decode outcome counters shared by all decoders
#[derive(Debug, Default)]
pub struct DecodeCounters {
    decoded: AtomicU64,
    malformed: AtomicU64,
}

impl DecodeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DecodeStats {
        DecodeStats {
            decoded: self.decoded.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`DecodeCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames turned into a metric point
    pub decoded: u64,
    /// Frames without a parseable link-layer header
    pub malformed: u64,
}

struct DecodeWorker {
    decoder: Arc<FrameDecoder>,
    sink: Arc<dyn MetricsSink>,
    counters: Arc<DecodeCounters>,
}

impl DecodeWorker {
    fn process(&self, worker: usize, frame: Frame) {
        match self.decoder.decode(&frame) {
            Ok(record) => {
                debug!(
                    worker = worker,
                    src = %record.source,
                    dst = %record.destination,
                    ether_type = %record.ethertype,
                    direction = %record.direction,
                    length = record.length,
                    "Decoded frame"
                );
                self.sink
                    .write_point(self.decoder.to_point(&record, SystemTime::now()));
                self.counters.record_decoded();
            }
            Err(reason) => {
                warn!(
                    worker = worker,
                    length = frame.len(),
                    captured = frame.data().len(),
                    truncated = frame.is_truncated(),
                    timestamp = ?frame.timestamp,
                    reason = %reason,
                    "Frame without a parseable link-layer header"
                );
                self.counters.record_malformed();
            }
        }
    }
}

async fn run_decoder(
    ctx: WorkerContext,
    relay: RelayConsumer<Frame>,
    worker: Arc<DecodeWorker>,
) -> Result<()> {
    let WorkerContext { id, ready, mut stop } = ctx;
    ready.signal();

    loop {
        tokio::select! {
            biased;
            _ = stop.stopped() => break,
            next = relay.pop() => match next {
                Some(frame) => worker.process(id, frame),
                None => {
                    debug!(worker = id, "Relay queue closed, decoder exiting");
                    return Ok(());
                }
            },
        }
    }

    // Upstream has stopped, so whatever is queued now is all there is
    let mut drained = 0usize;
    while let Some(frame) = relay.try_pop().await {
        worker.process(id, frame);
        drained += 1;
    }
    debug!(worker = id, drained = drained, "Decoder stopped");
    Ok(())
}

/// Spawn the Decoding Stage with `workers` decoders
pub fn spawn_decoding_stage(
    workers: usize,
    relay: RelayConsumer<Frame>,
    decoder: Arc<FrameDecoder>,
    sink: Arc<dyn MetricsSink>,
    counters: Arc<DecodeCounters>,
) -> StageHandle {
    let worker = Arc::new(DecodeWorker {
        decoder,
        sink,
        counters,
    });

    let mut stage = StageHandle::new(StageKind::Decoding);
    for _ in 0..workers {
        let relay = relay.clone();
        let worker = Arc::clone(&worker);
        stage.spawn(move |ctx| run_decoder(ctx, relay, worker));
    }
    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::relay_queue;
    use enceladus_packet::EtherType;
    use enceladus_sink::{FieldValue, MemorySink};
    use std::time::Duration;

    const LOCAL: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    const PEER: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);

    fn ethernet(dst: MacAddr, src: MacAddr) -> Frame {
        let mut data = Vec::new();
        data.extend_from_slice(dst.as_bytes());
        data.extend_from_slice(src.as_bytes());
        data.extend_from_slice(&[0x08, 0x00]);
        data.resize(64, 0);
        Frame::new(data)
    }

    fn decoder() -> Arc<FrameDecoder> {
        Arc::new(FrameDecoder::new(LOCAL, LinkType::Ethernet, "agent-1", "eth0"))
    }

    #[test]
    fn test_point_shape() {
        let decoder = decoder();
        let frame = ethernet(LOCAL, PEER);
        let record = decoder.decode(&frame).unwrap();
        assert_eq!(record.ethertype, EtherType::IPv4);

        let now = SystemTime::now();
        let point = decoder.to_point(&record, now);
        assert_eq!(point.measurement, "Ethernet");
        assert_eq!(point.tag_value("agent"), Some("agent-1"));
        assert_eq!(point.tag_value("device"), Some("eth0"));
        assert_eq!(point.tag_value("ether_type"), Some("IPv4"));
        assert_eq!(point.tag_value("direction"), Some("in"));
        assert_eq!(
            point.field_value("src_mac"),
            Some(&FieldValue::String("02:00:00:00:00:02".to_string()))
        );
        assert_eq!(
            point.field_value("dst_mac"),
            Some(&FieldValue::String("02:00:00:00:00:01".to_string()))
        );
        assert_eq!(point.field_value("frame_length"), Some(&FieldValue::UInteger(64)));
        assert_eq!(point.timestamp, now);
    }

    #[test]
    fn test_point_timestamp_is_decode_time() {
        let decoder = decoder();
        let mut frame = ethernet(PEER, LOCAL);
        frame.timestamp = SystemTime::UNIX_EPOCH;
        let record = decoder.decode(&frame).unwrap();
        let point = decoder.to_point(&record, SystemTime::now());
        assert!(point.timestamp > SystemTime::UNIX_EPOCH);
        assert_eq!(point.tag_value("direction"), Some("out"));
    }

    #[tokio::test]
    async fn test_drains_queued_frames_on_stop() {
        const QUEUED: usize = 50;
        let (producer, consumer) = relay_queue(64);
        for _ in 0..QUEUED {
            producer.push(ethernet(LOCAL, PEER)).await.unwrap();
        }

        let sink = Arc::new(MemorySink::new());
        let counters = Arc::new(DecodeCounters::new());
        let mut stage = spawn_decoding_stage(
            2,
            consumer,
            decoder(),
            Arc::clone(&sink) as Arc<dyn MetricsSink>,
            Arc::clone(&counters),
        );
        stage.wait_ready().await.unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), stage.stop())
            .await
            .unwrap();
        assert_eq!(exit.completed, 2);
        assert_eq!(sink.len(), QUEUED);
        assert_eq!(counters.snapshot().decoded, QUEUED as u64);
        assert!(producer.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_counted_not_written() {
        let (producer, consumer) = relay_queue(4);
        producer.push(Frame::new(vec![0u8; 9])).await.unwrap();
        producer.push(ethernet(PEER, PEER)).await.unwrap();

        let sink = Arc::new(MemorySink::new());
        let counters = Arc::new(DecodeCounters::new());
        let mut stage = spawn_decoding_stage(
            1,
            consumer,
            decoder(),
            Arc::clone(&sink) as Arc<dyn MetricsSink>,
            Arc::clone(&counters),
        );
        stage.wait_ready().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), sink.wait_for_points(1))
            .await
            .unwrap();
        stage.stop().await;

        assert_eq!(
            counters.snapshot(),
            DecodeStats {
                decoded: 1,
                malformed: 1
            }
        );
        assert_eq!(sink.points()[0].tag_value("direction"), Some("unclassified"));
    }

    #[tokio::test]
    async fn test_non_ethernet_capture_writes_nothing() {
        let (producer, consumer) = relay_queue(4);
        producer.push(ethernet(LOCAL, PEER)).await.unwrap();
        drop(producer);

        let sink = Arc::new(MemorySink::new());
        let counters = Arc::new(DecodeCounters::new());
        let decoder = Arc::new(FrameDecoder::new(LOCAL, LinkType::Other(12), "a", "tun0"));
        let mut stage = spawn_decoding_stage(
            1,
            consumer,
            decoder,
            Arc::clone(&sink) as Arc<dyn MetricsSink>,
            Arc::clone(&counters),
        );
        stage.wait_ready().await.unwrap();

        // The closed queue ends the worker on its own
        let exit = tokio::time::timeout(Duration::from_secs(1), stage.stop())
            .await
            .unwrap();
        assert_eq!(exit.completed, 1);
        assert!(sink.is_empty());
        assert_eq!(counters.snapshot().malformed, 1);
    }
}
