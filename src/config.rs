use std::time::Duration;

/// Engine configuration shared by the registries and the analysis engine.
///
/// Use the builder pattern to customize, or use [`Default`] for the
/// classic simulator settings.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use ipcsim::Config;
///
/// let config = Config::default()
///     .with_channel_capacity(16)                      // Smaller pipes
///     .with_deadlock_wait(Duration::from_secs(2));    // Flag waits sooner
/// assert_eq!(config.channel_capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Capacity of each direction of a channel.
    /// Default: 100
    pub channel_capacity: usize,

    /// Capacity used by [`QueueRegistry::create_default`](crate::QueueRegistry::create_default).
    /// Default: 1000
    pub default_queue_capacity: usize,

    /// Advisory size used by [`SegmentRegistry::create_default`](crate::SegmentRegistry::create_default).
    /// Default: 1024
    pub default_segment_size: usize,

    /// How long a process must have been waiting for a segment lock before
    /// the wait is reported as a suspected deadlock.
    /// Default: 5 s
    pub deadlock_wait: Duration,

    /// Bottleneck severity thresholds.
    pub thresholds: Thresholds,

    /// Once the transfer history grows past this many records it is
    /// trimmed down to `transfer_history_retain`.
    /// Default: 1000
    pub transfer_history_limit: usize,

    /// Number of newest transfer records kept after trimming.
    /// Default: 500
    pub transfer_history_retain: usize,

    /// Trailing window used for throughput statistics.
    /// Default: 5 s
    pub transfer_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel_capacity: 100,
            default_queue_capacity: 1000,
            default_segment_size: 1024,
            deadlock_wait: Duration::from_millis(5000),
            thresholds: Thresholds::default(),
            transfer_history_limit: 1000,
            transfer_history_retain: 500,
            transfer_window: Duration::from_millis(5000),
        }
    }
}

impl Config {
    /// Set the capacity of each channel direction.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_default_queue_capacity(mut self, capacity: usize) -> Self {
        self.default_queue_capacity = capacity;
        self
    }

    pub fn with_default_segment_size(mut self, size: usize) -> Self {
        self.default_segment_size = size;
        self
    }

    /// Set the wait after which a blocked process is suspected to be
    /// deadlocked.
    pub fn with_deadlock_wait(mut self, wait: Duration) -> Self {
        self.deadlock_wait = wait;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the transfer history bounds. `retain` is clamped to `limit`.
    pub fn with_transfer_history(mut self, limit: usize, retain: usize) -> Self {
        self.transfer_history_limit = limit;
        self.transfer_history_retain = retain.min(limit);
        self
    }

    pub fn with_transfer_window(mut self, window: Duration) -> Self {
        self.transfer_window = window;
        self
    }
}

/// Bottleneck thresholds. A resource is flagged when its usage is strictly
/// above a threshold; the highest threshold crossed decides the severity.
///
/// Percentages are of the resource capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Channel buffer: high. Default: 80
    pub channel_high_pct: u32,
    /// Channel buffer: critical. Default: 95
    pub channel_critical_pct: u32,
    /// Queue usage: medium. Default: 80
    pub queue_medium_pct: u32,
    /// Queue usage: high. Default: 90
    pub queue_high_pct: u32,
    /// Queue usage: critical. Default: 95
    pub queue_critical_pct: u32,
    /// Segment lock held longer than this: high. Default: 3 s
    pub lock_hold_high: Duration,
    /// Segment lock held longer than this: critical. Default: 10 s
    pub lock_hold_critical: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            channel_high_pct: 80,
            channel_critical_pct: 95,
            queue_medium_pct: 80,
            queue_high_pct: 90,
            queue_critical_pct: 95,
            lock_hold_high: Duration::from_millis(3000),
            lock_hold_critical: Duration::from_millis(10_000),
        }
    }
}
