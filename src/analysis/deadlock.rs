use std::time::Duration;

use crate::{ProcessId, Segment, SegmentId, Timestamp, segment::waited_long};

/// A suspected deadlock between a waiting process and a lock holder.
///
/// Only two-party waits on a single segment are detected. Chains that span
/// several segments (A waits on B waits on C) are not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deadlock {
    pub resource_id: SegmentId,
    /// `[waiter, holder]`
    pub cycle: Vec<ProcessId>,
    /// Names of the segments involved.
    pub resources: Vec<String>,
    pub waited_ms: u64,
    pub message: String,
    /// Always `false`: findings are recomputed on every scan, so a resolved
    /// wait simply disappears.
    pub resolved: bool,
    pub detected_at: Timestamp,
}

/// Waiters on `segment` stuck for at least `threshold` behind the current
/// holder, longest wait first. Waits recorded against an earlier holder are
/// ignored.
pub(crate) fn scan_segment(
    segment: &Segment,
    threshold: Duration,
    now: Timestamp,
) -> impl Iterator<Item = Deadlock> {
    let holder = segment.holder();
    segment
        .waiting()
        .into_iter()
        .filter_map(move |(waiter, _)| {
            let holder = holder?;
            let started = segment.active_wait(waiter)?;
            if !waited_long(started, now, threshold) {
                return None;
            }
            let waited_ms = now.saturating_sub(started);
            Some(Deadlock {
                resource_id: segment.id(),
                cycle: vec![waiter.clone(), holder.clone()],
                resources: vec![segment.name().to_string()],
                waited_ms,
                message: format!(
                    "{waiter} has waited {:.1}s for '{}' held by {holder}",
                    waited_ms as f64 / 1000.0,
                    segment.name()
                ),
                resolved: false,
                detected_at: now,
            })
        })
}
