use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for one feed connection and its book router.
#[derive(Debug)]
pub struct FeedMetrics {
    // Counters
    frames_received: AtomicU64,
    batches_applied: AtomicU64,
    decode_errors: AtomicU64,
    transport_errors: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnect_successes: AtomicU64,
    pings_sent: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_frame_time: Option<Instant>,
    last_error_time: Option<Instant>,
    last_reconnect_time: Option<Instant>,
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            batches_applied: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            reconnect_successes: AtomicU64::new(0),
            pings_sent: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_frame_time: None,
                last_error_time: None,
                last_reconnect_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_frames_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_frame_time = Some(Instant::now());
    }

    pub fn inc_batches_applied(&self) {
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_reconnect_time = Some(Instant::now());
    }

    pub fn inc_reconnect_successes(&self) {
        self.reconnect_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pings_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn batches_applied(&self) -> u64 {
        self.batches_applied.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn reconnect_successes(&self) -> u64 {
        self.reconnect_successes.load(Ordering::Relaxed)
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_frame(&self) -> Option<f64> {
        self.inner
            .read()
            .last_frame_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_reconnect(&self) -> Option<f64> {
        self.inner
            .read()
            .last_reconnect_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Frames per second since start.
    pub fn frames_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            self.frames_received() as f64 / uptime
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received(),
            batches_applied: self.batches_applied(),
            decode_errors: self.decode_errors(),
            transport_errors: self.transport_errors(),
            reconnect_attempts: self.reconnect_attempts(),
            reconnect_successes: self.reconnect_successes(),
            pings_sent: self.pings_sent(),
            uptime_secs: self.uptime_secs(),
            frames_per_second: self.frames_per_second(),
            secs_since_last_frame: self.secs_since_last_frame(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub batches_applied: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
    pub pings_sent: u64,
    pub uptime_secs: f64,
    pub frames_per_second: f64,
    pub secs_since_last_frame: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Frames are arriving.
    Healthy,
    /// No frame for a while; heartbeats should have arrived by now.
    Degraded,
    /// No frame for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering the feed stale (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the feed unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;

    /// Determine the health status from the time since the last frame.
    pub fn health_status(&self) -> HealthStatus {
        // Before the first frame, judge by uptime
        let quiet_secs = self.secs_since_last_frame.unwrap_or(self.uptime_secs);

        if quiet_secs > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if quiet_secs > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Feed Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Frames received:     {}", self.frames_received)?;
        writeln!(f, "Frames/sec:          {:.2}", self.frames_per_second)?;
        writeln!(f, "Batches applied:     {}", self.batches_applied)?;
        writeln!(f, "Decode errors:       {}", self.decode_errors)?;
        writeln!(f, "Transport errors:    {}", self.transport_errors)?;
        writeln!(f, "Reconnect attempts:  {}", self.reconnect_attempts)?;
        writeln!(f, "Reconnect successes: {}", self.reconnect_successes)?;
        writeln!(f, "Pings sent:          {}", self.pings_sent)?;
        if let Some(secs) = self.secs_since_last_frame {
            writeln!(f, "Since last frame:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<FeedMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(FeedMetrics::new())
}
