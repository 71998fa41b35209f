//! Capture statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot of capture-side counters
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Frames delivered by pcap after filtering
    pub packets_received: u64,
    /// Bytes delivered by pcap
    pub bytes_received: u64,
    /// Frames dropped by the kernel or interface
    pub kernel_dropped: u64,
    /// Frames dropped because the detector queue was full
    pub queue_dropped: u64,
    /// Capture duration
    pub duration: Duration,
    /// Frames per second
    pub packets_per_second: f64,
}

impl CaptureStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames that never reached the detector, as a percentage of all frames
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.kernel_dropped + self.queue_dropped;
        let total = self.packets_received + self.kernel_dropped;
        if total == 0 {
            return 0.0;
        }
        (dropped as f64 / total as f64) * 100.0
    }

    /// Check if there are significant drops
    pub fn has_significant_drops(&self, threshold_percent: f64) -> bool {
        self.drop_rate() > threshold_percent
    }
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Captured: {} frames ({} bytes) in {:.2}s, {:.2} fps\n\
             Dropped: {} by kernel, {} by queue ({:.2}%)",
            self.packets_received,
            self.bytes_received,
            self.duration.as_secs_f64(),
            self.packets_per_second,
            self.kernel_dropped,
            self.queue_dropped,
            self.drop_rate()
        )
    }
}

/// Thread-safe counters shared between the capture thread and its consumers
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    packets_received: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    kernel_dropped: Arc<AtomicU64>,
    queue_dropped: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            packets_received: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            kernel_dropped: Arc::new(AtomicU64::new(0)),
            queue_dropped: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a received frame
    pub fn record_packet(&self, size: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Record kernel/interface drops reported by pcap
    pub fn record_kernel_drops(&self, count: u64) {
        self.kernel_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a frame discarded because the consumer could not keep up
    pub fn record_queue_drop(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStats {
        let packets_received = self.packets_received.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();

        let secs = duration.as_secs_f64();
        let packets_per_second = if secs > 0.0 {
            packets_received as f64 / secs
        } else {
            0.0
        };

        CaptureStats {
            packets_received,
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            kernel_dropped: self.kernel_dropped.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            duration,
            packets_per_second,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
