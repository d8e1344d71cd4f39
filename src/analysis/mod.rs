//! Bottleneck and deadlock heuristics plus transfer telemetry.
//!
//! Findings are point-in-time: every scan reads the registries as they are
//! now and keeps nothing. The only state the engine owns is the bounded
//! transfer history.

mod bottleneck;
mod deadlock;
mod transfer;

use std::{fmt, sync::Arc, time::Duration};

pub use bottleneck::{Bottleneck, Severity};
pub use deadlock::Deadlock;
pub use transfer::{Transfer, TransferStats};

use crate::{
    ChannelRegistry, Clock, Config, QueueRegistry, ResourceKind, SegmentRegistry, Thresholds,
    WallClock,
};
use transfer::TransferLog;

pub struct AnalysisEngine {
    thresholds: Thresholds,
    deadlock_wait: Duration,
    transfer_window: Duration,
    transfers: TransferLog,
    clock: Arc<dyn Clock>,
}

impl AnalysisEngine {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            thresholds: config.thresholds,
            deadlock_wait: config.deadlock_wait,
            transfer_window: config.transfer_window,
            transfers: TransferLog::new(
                config.transfer_history_limit,
                config.transfer_history_retain,
            ),
            clock,
        }
    }

    /// Scan every channel direction, queue and locked segment for pressure.
    ///
    /// Results come grouped by kind (channels, queues, segments), each group
    /// in creation order.
    pub fn bottlenecks(
        &self,
        channels: &ChannelRegistry,
        queues: &QueueRegistry,
        segments: &SegmentRegistry,
    ) -> Vec<Bottleneck> {
        let now = self.clock.now();
        let thresholds = &self.thresholds;
        let found: Vec<_> = channels
            .iter()
            .flat_map(|c| bottleneck::scan_channel(c, thresholds, now))
            .chain(queues.iter().filter_map(|q| bottleneck::scan_queue(q, thresholds, now)))
            .chain(
                segments
                    .iter()
                    .filter_map(|s| bottleneck::scan_segment(s, thresholds, now)),
            )
            .collect();
        if !found.is_empty() {
            tracing::debug!(count = found.len(), "bottlenecks detected");
        }
        found
    }

    /// Processes that have waited at least the deadlock threshold on a
    /// segment still locked by someone else.
    pub fn deadlocks(&self, segments: &SegmentRegistry) -> Vec<Deadlock> {
        let now = self.clock.now();
        let found: Vec<_> = segments
            .iter()
            .flat_map(|s| deadlock::scan_segment(s, self.deadlock_wait, now))
            .collect();
        for d in &found {
            tracing::warn!(
                segment = %d.resource_id,
                waiter = %d.cycle[0],
                holder = %d.cycle[1],
                waited_ms = d.waited_ms,
                "potential deadlock"
            );
        }
        found
    }

    /// Append a transfer of `size` bytes to the history.
    pub fn record_transfer(
        &mut self,
        kind: ResourceKind,
        resource_id: impl ToString,
        size: usize,
    ) {
        let transfer = Transfer {
            kind,
            resource_id: resource_id.to_string(),
            size,
            timestamp: self.clock.now(),
        };
        tracing::trace!(%kind, resource = %transfer.resource_id, size, "transfer recorded");
        self.transfers.push(transfer);
    }

    /// Retained transfer history, oldest first.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.records().cloned().collect()
    }

    /// Throughput of one resource over the configured trailing window.
    pub fn transfer_stats(&self, kind: ResourceKind, resource_id: impl ToString) -> TransferStats {
        self.transfers.stats(
            kind,
            &resource_id.to_string(),
            self.clock.now(),
            self.transfer_window,
        )
    }

    /// Drop the transfer history. Bottleneck and deadlock findings are
    /// never cached, so there is nothing else to clear.
    pub fn reset(&mut self) {
        tracing::debug!(dropped = self.transfers.len(), "analysis reset");
        self.transfers.clear();
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(&Config::default(), Arc::new(WallClock))
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("thresholds", &self.thresholds)
            .field("deadlock_wait", &self.deadlock_wait)
            .field("transfers", &self.transfers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, MockClock};

    struct Fixture {
        clock: MockClock,
        channels: ChannelRegistry,
        queues: QueueRegistry,
        segments: SegmentRegistry,
        engine: AnalysisEngine,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let clock = MockClock::new(0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        Fixture {
            channels: ChannelRegistry::new(&config, shared.clone()),
            queues: QueueRegistry::new(&config, shared.clone()),
            segments: SegmentRegistry::new(&config, shared.clone()),
            engine: AnalysisEngine::new(&config, shared),
            clock,
        }
    }

    impl Fixture {
        fn bottlenecks(&self) -> Vec<Bottleneck> {
            self.engine
                .bottlenecks(&self.channels, &self.queues, &self.segments)
        }
    }

    #[test]
    fn test_idle_system_has_no_findings() {
        let mut f = fixture();
        f.channels.create("A", "B");
        f.queues.create("q", 10);
        f.segments.create("shm", 64);
        assert!(f.bottlenecks().is_empty());
        assert!(f.engine.deadlocks(&f.segments).is_empty());
    }

    #[test]
    fn test_findings_grouped_by_kind() {
        let mut f = fixture();
        let seg = f.segments.create("shm", 64).id();
        let q = f.queues.create("q", 10).id();
        let ch = f.channels.create("A", "B").id();

        f.segments.lock(seg, "A").unwrap();
        for _ in 0..9 {
            f.queues.send(q, "x", "p").unwrap();
        }
        for _ in 0..90 {
            f.channels.send(ch, Direction::BtoA, "x").unwrap();
        }
        f.clock.set(3_001);

        let kinds: Vec<_> = f.bottlenecks().iter().map(|b| (b.kind, b.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (ResourceKind::Channel, Severity::High),
                (ResourceKind::Queue, Severity::Medium),
                (ResourceKind::Segment, Severity::High),
            ]
        );
    }

    #[test]
    fn test_lock_hold_bands() {
        let mut f = fixture();
        let id = f.segments.create("shm", 64).id();
        f.segments.lock(id, "A").unwrap();

        f.clock.set(3_000);
        assert!(f.bottlenecks().is_empty());
        f.clock.set(10_000);
        assert_eq!(f.bottlenecks()[0].severity, Severity::High);
        f.clock.set(10_001);
        let found = f.bottlenecks();
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[0].resource_id, id.to_string());
        assert_eq!(found[0].detected_at, 10_001);

        f.segments.unlock(id, "A").unwrap();
        assert!(f.bottlenecks().is_empty());
    }

    #[test]
    fn test_transfer_history_survives_only_until_reset() {
        let mut f = fixture();
        let q = f.queues.create("q", 10).id();
        f.engine.record_transfer(ResourceKind::Queue, q, 128);
        f.clock.set(1_000);
        f.engine.record_transfer(ResourceKind::Queue, q, 64);

        let history = f.engine.transfers();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].timestamp, 1_000);
        let stats = f.engine.transfer_stats(ResourceKind::Queue, q);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_bytes, 192);

        f.engine.reset();
        assert!(f.engine.transfers().is_empty());
        assert_eq!(f.engine.transfer_stats(ResourceKind::Queue, q).count, 0);
    }

    #[test]
    fn test_reset_keeps_live_findings() {
        let mut f = fixture();
        let id = f.segments.create("shm", 64).id();
        f.segments.lock(id, "A").unwrap();
        let _ = f.segments.lock(id, "B");
        f.clock.set(6_000);

        f.engine.reset();
        assert_eq!(f.engine.deadlocks(&f.segments).len(), 1);
        assert_eq!(f.bottlenecks().len(), 1);
    }
}
