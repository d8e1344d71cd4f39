use crate::{Event, Meta, Timestamp};

/// Event plus metadata, as delivered to subscribers.
///
/// - `event`: the published payload implementing `Event`.
/// - `meta`: `Meta` describing the position of the event on its bus and
///   when it was published.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "E: serde::Serialize",
        deserialize = "E: serde::de::DeserializeOwned"
    ))
)]
pub struct Envelope<E: Event> {
    pub meta: Meta,
    pub event: E,
}

impl<E: Event> Envelope<E> {
    pub fn new(event: E, sequence: u64, timestamp: Timestamp) -> Self {
        Self {
            meta: Meta::new(sequence, timestamp),
            event,
        }
    }
}
