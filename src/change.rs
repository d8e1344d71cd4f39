use std::{borrow::Cow, fmt, hash::Hash, sync::Arc};

use crate::{Event, Label, Topic};

/// Kind of simulated IPC resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Label)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    Channel,
    Queue,
    Segment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Channel => write!(f, "channel"),
            ResourceKind::Queue => write!(f, "queue"),
            ResourceKind::Segment => write!(f, "segment"),
        }
    }
}

/// An entity owned by one of the registries.
pub trait Resource: fmt::Debug + Clone + Send + Sync + 'static {
    type Id: fmt::Debug + fmt::Display + Copy + Eq + Hash + Send + Sync + 'static;

    const KIND: ResourceKind;

    fn id(&self) -> Self::Id;
}

/// What a successful registry call did. Used as the routing topic of
/// [`Change`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Label)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeKind {
    Created,
    Sent,
    Received,
    Locked,
    Unlocked,
    Written,
    Read,
    Cleared,
    Deleted,
}

/// Published by a registry after every successful mutation.
///
/// `snapshot` is the full collection as it is after the mutation, in
/// creation order. `resource` names the entity the call touched; after a
/// delete it is no longer part of the snapshot.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(bound = "R: serde::Serialize, R::Id: serde::Serialize")
)]
pub struct Change<R: Resource> {
    pub kind: ChangeKind,
    pub resource: R::Id,
    pub snapshot: Arc<[R]>,
}

impl<R: Resource> Change<R> {
    /// State of the touched entity after the mutation, if it still exists.
    pub fn current(&self) -> Option<&R> {
        self.snapshot.iter().find(|r| r.id() == self.resource)
    }
}

impl<R: Resource> Event for Change<R> {
    fn name(&self) -> Cow<'static, str> {
        self.kind.label()
    }
}

impl<R: Resource> Topic<Change<R>> for ChangeKind {
    fn from_event(event: &Change<R>) -> Self {
        event.kind
    }
}
