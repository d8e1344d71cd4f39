use crate::{Direction, ProcessId, ResourceKind};

/// Failure of a registry operation.
///
/// Errors are plain data: a failed call leaves the data model untouched
/// (apart from the wait bookkeeping of a contended segment) and the caller
/// decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Buffer {direction} is full ({capacity} messages)")]
    BufferFull { direction: Direction, capacity: usize },

    #[error("Buffer {direction} is empty")]
    BufferEmpty { direction: Direction },

    #[error("Queue is full ({capacity} messages)")]
    QueueFull { capacity: usize },

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Segment locked by {owner}")]
    LockHeld {
        owner: ProcessId,
        /// Set when the caller has been waiting past the deadlock threshold.
        deadlock_suspected: bool,
    },

    #[error("Segment is not locked")]
    NotLocked,

    #[error("Segment locked by another process ({owner})")]
    WrongOwner { owner: ProcessId },
}

impl Error {
    pub(crate) fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns `true` for a [`Error::LockHeld`] carrying the deadlock flag.
    pub fn deadlock_suspected(&self) -> bool {
        matches!(
            self,
            Error::LockHeld {
                deadlock_suspected: true,
                ..
            }
        )
    }

    /// Returns `true` when the failure is caused by a full buffer or queue.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::BufferFull { .. } | Error::QueueFull { .. })
    }
}
