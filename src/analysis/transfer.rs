use std::{collections::VecDeque, time::Duration};

use crate::{ResourceKind, Timestamp};

/// One recorded data transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transfer {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub size: usize,
    pub timestamp: Timestamp,
}

/// Throughput of one resource over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferStats {
    pub count: usize,
    pub total_bytes: usize,
    pub bytes_per_sec: f64,
    pub transfers_per_sec: f64,
    pub window: Duration,
}

/// Bounded transfer history. Past `limit` records only the newest
/// `retain` are kept.
#[derive(Debug, Clone)]
pub(crate) struct TransferLog {
    records: VecDeque<Transfer>,
    limit: usize,
    retain: usize,
}

impl TransferLog {
    pub fn new(limit: usize, retain: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            retain: retain.min(limit),
        }
    }

    pub fn push(&mut self, transfer: Transfer) {
        self.records.push_back(transfer);
        if self.records.len() > self.limit {
            let excess = self.records.len() - self.retain;
            self.records.drain(..excess);
            tracing::trace!(dropped = excess, "transfer history trimmed");
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &Transfer> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn stats(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        now: Timestamp,
        window: Duration,
    ) -> TransferStats {
        let window_ms = window.as_millis() as u64;
        let (count, total_bytes) = self
            .records
            .iter()
            .filter(|t| t.kind == kind && t.resource_id == resource_id)
            .filter(|t| now.saturating_sub(t.timestamp) < window_ms)
            .fold((0, 0), |(count, bytes), t| (count + 1, bytes + t.size));

        let secs = window.as_secs_f64();
        let per_sec = |v: usize| if secs > 0.0 { v as f64 / secs } else { 0.0 };
        TransferStats {
            count,
            total_bytes,
            bytes_per_sec: per_sec(total_bytes),
            transfers_per_sec: per_sec(count),
            window,
        }
    }
}
