//! Capture counters

use std::fmt;

/// Point-in-time capture counters.
///
/// Every value is a fresh copy; counters of one capture session never
/// decrease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounters {
    /// Frames received by the capture
    pub received: u64,
    /// Frames dropped by the kernel (buffer overflow)
    pub dropped: u64,
    /// Frames dropped by the interface or its driver
    pub if_dropped: u64,
}

impl CaptureCounters {
    pub fn new(received: u64, dropped: u64, if_dropped: u64) -> Self {
        Self {
            received,
            dropped,
            if_dropped,
        }
    }

    /// Dropped frames as a percentage of received frames, 0 when nothing was received
    pub fn drop_percentage(&self) -> f64 {
        if self.received == 0 {
            return 0.0;
        }
        (self.dropped as f64 / self.received as f64) * 100.0
    }

    /// Whether the kernel or the interface dropped anything
    pub fn has_drops(&self) -> bool {
        self.dropped > 0 || self.if_dropped > 0
    }
}

impl fmt::Display for CaptureCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {}, dropped {} ({:.3} %) and interface-dropped {} frames",
            self.received,
            self.dropped,
            self.drop_percentage(),
            self.if_dropped
        )
    }
}

/// Widens the 32-bit counters libpcap reports into monotone 64-bit totals.
#[derive(Debug, Default)]
pub struct CounterTracker {
    last: [u32; 3],
    totals: [u64; 3],
}

impl CounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a raw reading and return the running totals
    pub fn observe(&mut self, received: u32, dropped: u32, if_dropped: u32) -> CaptureCounters {
        for (i, raw) in [received, dropped, if_dropped].into_iter().enumerate() {
            // wrapping_sub carries a 32-bit wrap-around forward
            let delta = raw.wrapping_sub(self.last[i]);
            self.totals[i] += u64::from(delta);
            self.last[i] = raw;
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> CaptureCounters {
        CaptureCounters::new(self.totals[0], self.totals[1], self.totals[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_percentage_without_traffic() {
        let counters = CaptureCounters::new(0, 0, 0);
        assert_eq!(counters.drop_percentage(), 0.0);
        assert!(!counters.has_drops());
    }

    #[test]
    fn test_drop_percentage() {
        let counters = CaptureCounters::new(100, 5, 0);
        assert_eq!(counters.drop_percentage(), 5.0);
        assert!(counters.has_drops());
    }

    #[test]
    fn test_interface_drops_count_as_drops() {
        assert!(CaptureCounters::new(10, 0, 1).has_drops());
    }

    #[test]
    fn test_display() {
        let counters = CaptureCounters::new(3, 1, 2);
        assert_eq!(
            counters.to_string(),
            "received 3, dropped 1 (33.333 %) and interface-dropped 2 frames"
        );
    }

    #[test]
    fn test_tracker_accumulates() {
        let mut tracker = CounterTracker::new();
        assert_eq!(tracker.observe(10, 1, 0), CaptureCounters::new(10, 1, 0));
        assert_eq!(tracker.observe(25, 1, 3), CaptureCounters::new(25, 1, 3));
        assert_eq!(tracker.observe(25, 1, 3), CaptureCounters::new(25, 1, 3));
    }

    #[test]
    fn test_tracker_survives_wrap_around() {
        let mut tracker = CounterTracker::new();
        tracker.observe(u32::MAX - 4, 0, 0);
        let counters = tracker.observe(5, 0, 0);
        assert_eq!(counters.received, u64::from(u32::MAX) + 6);
    }
}
