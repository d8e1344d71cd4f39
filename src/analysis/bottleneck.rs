use std::fmt;

use crate::{
    Channel, Direction, Label, Queue, ResourceKind, Segment, Thresholds, Timestamp,
};

/// How pressing a bottleneck is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Label)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A resource under pressure at the time of the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bottleneck {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub severity: Severity,
    pub message: String,
    pub detected_at: Timestamp,
}

/// `len` is strictly above `pct` percent of `capacity`.
fn above(len: usize, capacity: usize, pct: u32) -> bool {
    len as u128 * 100 > capacity as u128 * pct as u128
}

fn percent(len: usize, capacity: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    len * 100 / capacity
}

/// One finding per congested direction.
pub(crate) fn scan_channel(
    channel: &Channel,
    thresholds: &Thresholds,
    now: Timestamp,
) -> impl Iterator<Item = Bottleneck> {
    let capacity = channel.capacity();
    [Direction::AtoB, Direction::BtoA]
        .into_iter()
        .filter_map(move |direction| {
            let len = channel.len(direction);
            let severity = if above(len, capacity, thresholds.channel_critical_pct) {
                Severity::Critical
            } else if above(len, capacity, thresholds.channel_high_pct) {
                Severity::High
            } else {
                return None;
            };
            Some(Bottleneck {
                kind: ResourceKind::Channel,
                resource_id: channel.id().to_string(),
                severity,
                message: format!(
                    "Buffer {direction} is {}% full ({len}/{capacity})",
                    percent(len, capacity)
                ),
                detected_at: now,
            })
        })
}

pub(crate) fn scan_queue(
    queue: &Queue,
    thresholds: &Thresholds,
    now: Timestamp,
) -> Option<Bottleneck> {
    let (len, capacity) = (queue.len(), queue.capacity());
    let severity = if above(len, capacity, thresholds.queue_critical_pct) {
        Severity::Critical
    } else if above(len, capacity, thresholds.queue_high_pct) {
        Severity::High
    } else if above(len, capacity, thresholds.queue_medium_pct) {
        Severity::Medium
    } else {
        return None;
    };
    Some(Bottleneck {
        kind: ResourceKind::Queue,
        resource_id: queue.id().to_string(),
        severity,
        message: format!(
            "Queue '{}' is {}% full ({len}/{capacity})",
            queue.name(),
            percent(len, capacity)
        ),
        detected_at: now,
    })
}

pub(crate) fn scan_segment(
    segment: &Segment,
    thresholds: &Thresholds,
    now: Timestamp,
) -> Option<Bottleneck> {
    let lock = segment.lock()?;
    let held = now.saturating_sub(lock.acquired_at);
    let severity = if held > thresholds.lock_hold_critical.as_millis() as u64 {
        Severity::Critical
    } else if held > thresholds.lock_hold_high.as_millis() as u64 {
        Severity::High
    } else {
        return None;
    };
    Some(Bottleneck {
        kind: ResourceKind::Segment,
        resource_id: segment.id().to_string(),
        severity,
        message: format!(
            "Segment '{}' locked by {} for {:.1}s",
            segment.name(),
            lock.holder,
            held as f64 / 1000.0
        ),
        detected_at: now,
    })
}
