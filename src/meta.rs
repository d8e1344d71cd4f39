use uuid::Uuid;

use crate::{EventId, Timestamp};

/// Metadata attached to every published envelope.
///
/// - `id`: unique identifier for the envelope.
/// - `sequence`: position of the event on its bus, starting at 1. Delivery
///   order always follows the sequence.
/// - `timestamp`: time of publication in milliseconds, read from the
///   registry's [`Clock`](crate::Clock).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    id: EventId,
    sequence: u64,
    timestamp: Timestamp,
}

impl Meta {
    pub fn new(sequence: u64, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().as_u128(),
            sequence,
            timestamp,
        }
    }

    /// Unique identifier for this envelope.
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Publication time in milliseconds.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
