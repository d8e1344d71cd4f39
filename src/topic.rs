use std::hash::Hash;

use crate::event::Event;

/// Maps events to routing topics.
///
/// Subscribers of a [`ChangeBus`](crate::ChangeBus) register interest in one
/// or more topics and the bus delivers only matching events. The registries
/// route their [`Change`](crate::Change) events by
/// [`ChangeKind`](crate::ChangeKind), so an observer can follow e.g. lock
/// traffic only.
pub trait Topic<E: Event>: Hash + PartialEq + Eq + Clone + Send + Sync + 'static {
    fn from_event(event: &E) -> Self
    where
        Self: Sized;
}

/// Default topic for buses that don't need topic-based routing.
///
/// Every event maps to the same topic, so subscribing to `DefaultTopic`
/// means receiving everything.
#[derive(Debug, Hash, Eq, PartialEq, Clone)]
pub struct DefaultTopic;

impl<E: Event> Topic<E> for DefaultTopic {
    fn from_event(_event: &E) -> DefaultTopic {
        DefaultTopic
    }
}

impl std::fmt::Display for DefaultTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "default")
    }
}
