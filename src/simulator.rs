use std::{fmt, sync::Arc};

use crate::{
    AnalysisEngine, Bottleneck, ChannelRegistry, Clock, Config, Deadlock, QueueRegistry,
    ResourceKind, SegmentRegistry, TransferStats, WallClock,
};

/// One self-contained simulation: the three registries and the analysis
/// engine, all built from the same [`Config`] and reading the same
/// [`Clock`].
///
/// # Examples
///
/// ```rust
/// use ipcsim::{Direction, Simulator};
///
/// let mut sim = Simulator::default();
/// let pipe = sim.channels_mut().create("shell", "grep").id();
/// sim.channels_mut().send(pipe, Direction::AtoB, "hello").unwrap();
/// assert!(sim.bottlenecks().is_empty());
/// ```
pub struct Simulator {
    config: Config,
    clock: Arc<dyn Clock>,
    channels: ChannelRegistry,
    queues: QueueRegistry,
    segments: SegmentRegistry,
    analysis: AnalysisEngine,
}

impl Simulator {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        tracing::debug!(?config, "starting simulation");
        Self {
            channels: ChannelRegistry::new(&config, clock.clone()),
            queues: QueueRegistry::new(&config, clock.clone()),
            segments: SegmentRegistry::new(&config, clock.clone()),
            analysis: AnalysisEngine::new(&config, clock.clone()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.channels
    }

    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    pub fn queues_mut(&mut self) -> &mut QueueRegistry {
        &mut self.queues
    }

    pub fn segments(&self) -> &SegmentRegistry {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut SegmentRegistry {
        &mut self.segments
    }

    pub fn analysis(&self) -> &AnalysisEngine {
        &self.analysis
    }

    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        self.analysis
            .bottlenecks(&self.channels, &self.queues, &self.segments)
    }

    pub fn deadlocks(&self) -> Vec<Deadlock> {
        self.analysis.deadlocks(&self.segments)
    }

    pub fn record_transfer(&mut self, kind: ResourceKind, resource_id: impl ToString, size: usize) {
        self.analysis.record_transfer(kind, resource_id, size);
    }

    pub fn transfer_stats(&self, kind: ResourceKind, resource_id: impl ToString) -> TransferStats {
        self.analysis.transfer_stats(kind, resource_id)
    }

    /// Clear the analysis history. Registry contents are left alone.
    pub fn reset_analysis(&mut self) {
        self.analysis.reset();
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(Config::default(), Arc::new(WallClock))
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("channels", &self.channels)
            .field("queues", &self.queues)
            .field("segments", &self.segments)
            .field("analysis", &self.analysis)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::MockClock;

    #[test]
    fn test_shared_clock_and_config() {
        let clock = MockClock::new(500);
        let config = Config::default().with_deadlock_wait(Duration::from_millis(100));
        let mut sim = Simulator::new(config, Arc::new(clock.clone()));

        let id = sim.segments_mut().create_default("shm").id();
        assert_eq!(sim.segments().get(id).unwrap().created_at(), 500);
        assert_eq!(sim.segments().get(id).unwrap().capacity_bytes(), 1024);

        sim.segments_mut().lock(id, "A").unwrap();
        let _ = sim.segments_mut().lock(id, "B");
        clock.advance(Duration::from_millis(100));
        assert_eq!(sim.deadlocks().len(), 1);
        assert_eq!(sim.clock().now(), 600);
    }

    #[test]
    fn test_reset_analysis_keeps_registries() {
        let mut sim = Simulator::default();
        let q = sim.queues_mut().create("q", 4).id();
        sim.queues_mut().send(q, "abc", "p").unwrap();
        sim.record_transfer(ResourceKind::Queue, q, 3);
        assert_eq!(sim.transfer_stats(ResourceKind::Queue, q).total_bytes, 3);

        sim.reset_analysis();
        assert!(sim.analysis().transfers().is_empty());
        assert_eq!(sim.queues().get(q).unwrap().len(), 1);
    }
}
