use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime},
};

use crate::Timestamp;

/// Source of "now" for every registry and the analysis engine.
///
/// All hold times, wait times and message timestamps are read from a single
/// clock so a test can drive time explicitly with [`MockClock`].
pub trait Clock: Send + Sync {
    /// Current time in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or_default()
    }
}

/// Manually driven clock for deterministic simulations and tests.
///
/// Clones share the same time, so a handle kept by a test moves the clock
/// seen by every registry built from it.
///
/// ```rust
/// use std::time::Duration;
/// use ipcsim::{Clock, MockClock};
///
/// let clock = MockClock::new(1_000);
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now(), 1_250);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockClock {
    now: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
