use std::{collections::VecDeque, fmt, sync::Arc};

use crate::{
    ChangeBus, Clock, Config, Error, Label, Payload, ProcessId, Result, Timestamp, WallClock,
    bus::{Observer, Subscribe, SubscriberId, Subscription},
    change::{Change, ChangeKind, Resource, ResourceKind},
    ids::ChannelId,
};

/// Direction of travel through a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Label)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    AtoB,
    BtoA,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::AtoB => Direction::BtoA,
            Direction::BtoA => Direction::AtoB,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AtoB => write!(f, "A→B"),
            Direction::BtoA => write!(f, "B→A"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelStatus {
    #[default]
    Active,
}

/// Bidirectional pipe between two named endpoints.
///
/// Each direction has its own bounded FIFO buffer and send counter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    id: ChannelId,
    endpoint_a: ProcessId,
    endpoint_b: ProcessId,
    buffer_a_to_b: VecDeque<Payload>,
    buffer_b_to_a: VecDeque<Payload>,
    sent_a_to_b: u64,
    sent_b_to_a: u64,
    capacity: usize,
    status: ChannelStatus,
    created_at: Timestamp,
}

impl Channel {
    fn new(endpoint_a: ProcessId, endpoint_b: ProcessId, capacity: usize, now: Timestamp) -> Self {
        Self {
            id: ChannelId::new(),
            endpoint_a,
            endpoint_b,
            buffer_a_to_b: VecDeque::new(),
            buffer_b_to_a: VecDeque::new(),
            sent_a_to_b: 0,
            sent_b_to_a: 0,
            capacity,
            status: ChannelStatus::Active,
            created_at: now,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn endpoint_a(&self) -> &ProcessId {
        &self.endpoint_a
    }

    pub fn endpoint_b(&self) -> &ProcessId {
        &self.endpoint_b
    }

    /// Pending payloads in the given direction, oldest first.
    pub fn buffer(&self, direction: Direction) -> &VecDeque<Payload> {
        match direction {
            Direction::AtoB => &self.buffer_a_to_b,
            Direction::BtoA => &self.buffer_b_to_a,
        }
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut VecDeque<Payload> {
        match direction {
            Direction::AtoB => &mut self.buffer_a_to_b,
            Direction::BtoA => &mut self.buffer_b_to_a,
        }
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.buffer(direction).len()
    }

    /// Total number of payloads ever accepted in the given direction.
    pub fn sent(&self, direction: Direction) -> u64 {
        match direction {
            Direction::AtoB => self.sent_a_to_b,
            Direction::BtoA => self.sent_b_to_a,
        }
    }

    /// Capacity of each direction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Resource for Channel {
    type Id = ChannelId;
    const KIND: ResourceKind = ResourceKind::Channel;

    fn id(&self) -> ChannelId {
        self.id
    }
}

/// Owns every channel of a simulation.
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    bus: ChangeBus<Change<Channel>, ChangeKind>,
}

impl ChannelRegistry {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: Vec::new(),
            capacity: config.channel_capacity,
            clock,
            bus: ChangeBus::new(),
        }
    }

    /// Open a channel between two endpoints. Always succeeds.
    pub fn create(
        &mut self,
        endpoint_a: impl Into<ProcessId>,
        endpoint_b: impl Into<ProcessId>,
    ) -> Channel {
        let channel = Channel::new(
            endpoint_a.into(),
            endpoint_b.into(),
            self.capacity,
            self.clock.now(),
        );
        tracing::debug!(
            channel = %channel.id,
            a = %channel.endpoint_a,
            b = %channel.endpoint_b,
            "channel created"
        );
        self.channels.push(channel.clone());
        self.notify(ChangeKind::Created, channel.id);
        channel
    }

    /// Append `payload` to the tail of the buffer in `direction`.
    ///
    /// Fails with [`Error::BufferFull`] when the buffer is at capacity; the
    /// payload is then dropped and nothing changes.
    pub fn send(
        &mut self,
        id: ChannelId,
        direction: Direction,
        payload: impl Into<Payload>,
    ) -> Result {
        let channel = self.find_mut(id)?;
        let capacity = channel.capacity;
        let buffer = channel.buffer_mut(direction);
        if buffer.len() >= capacity {
            tracing::debug!(channel = %id, %direction, capacity, "buffer full");
            return Err(Error::BufferFull {
                direction,
                capacity,
            });
        }
        buffer.push_back(payload.into());
        let len = buffer.len();
        match direction {
            Direction::AtoB => channel.sent_a_to_b += 1,
            Direction::BtoA => channel.sent_b_to_a += 1,
        }
        tracing::debug!(channel = %id, %direction, len, "sent");
        self.notify(ChangeKind::Sent, id);
        Ok(())
    }

    /// Remove and return the oldest payload in `direction`.
    pub fn receive(&mut self, id: ChannelId, direction: Direction) -> Result<Payload> {
        let channel = self.find_mut(id)?;
        let payload = channel
            .buffer_mut(direction)
            .pop_front()
            .ok_or(Error::BufferEmpty { direction })?;
        tracing::debug!(channel = %id, %direction, size = payload.len(), "received");
        self.notify(ChangeKind::Received, id);
        Ok(payload)
    }

    /// Remove a channel and everything buffered in it. Returns `false` if
    /// it did not exist, which is not an error.
    pub fn delete(&mut self, id: ChannelId) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c.id != id);
        let removed = before != self.channels.len();
        if removed {
            tracing::debug!(channel = %id, "channel deleted");
            self.notify(ChangeKind::Deleted, id);
        }
        removed
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Copy of every channel, in creation order.
    pub fn list_all(&self) -> Vec<Channel> {
        self.channels.clone()
    }

    /// Every channel, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn subscribe(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
    ) -> Subscription<Change<Channel>> {
        self.bus.subscribe(topics)
    }

    pub fn observe<O>(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
        observer: O,
    ) -> SubscriberId
    where
        O: Observer<Change<Channel>> + 'static,
    {
        self.bus.observe(topics, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn find_mut(&mut self, id: ChannelId) -> Result<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::Channel, id))
    }

    fn notify(&mut self, kind: ChangeKind, resource: ChannelId) {
        let snapshot: Arc<[Channel]> = self.channels.iter().cloned().collect();
        let now = self.clock.now();
        self.bus.publish(
            Change {
                kind,
                resource,
                snapshot,
            },
            now,
        );
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(&Config::default(), Arc::new(WallClock))
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .field("capacity", &self.capacity)
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockClock;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(&Config::default(), Arc::new(MockClock::new(0)))
    }

    #[test]
    fn test_create_is_empty() {
        let mut reg = registry();
        let ch = reg.create("P", "Q");
        assert_eq!(ch.endpoint_a(), &ProcessId::from("P"));
        assert_eq!(ch.endpoint_b(), &ProcessId::from("Q"));
        assert_eq!(ch.len(Direction::AtoB), 0);
        assert_eq!(ch.sent(Direction::BtoA), 0);
        assert_eq!(ch.status(), ChannelStatus::Active);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_directions_are_independent() {
        // send AtoB, the other direction stays empty
        let mut reg = registry();
        let id = reg.create("P", "Q").id();
        reg.send(id, Direction::AtoB, "x").unwrap();

        assert_eq!(
            reg.receive(id, Direction::BtoA),
            Err(Error::BufferEmpty {
                direction: Direction::BtoA
            })
        );
        assert_eq!(reg.receive(id, Direction::AtoB).unwrap(), "x");
        assert!(matches!(
            reg.receive(id, Direction::AtoB),
            Err(Error::BufferEmpty { .. })
        ));
    }

    #[test]
    fn test_fifo_order() {
        let mut reg = registry();
        let id = reg.create("P", "Q").id();
        for i in 0..10 {
            reg.send(id, Direction::BtoA, format!("m{i}")).unwrap();
        }
        for i in 0..10 {
            let payload = reg.receive(id, Direction::BtoA).unwrap();
            assert_eq!(payload.as_str(), Some(format!("m{i}").as_str()));
        }
        assert_eq!(reg.get(id).unwrap().sent(Direction::BtoA), 10);
    }

    #[test]
    fn test_buffer_full_rejects_without_truncation() {
        let mut reg = registry();
        let id = reg.create("P", "Q").id();
        for i in 0..100 {
            reg.send(id, Direction::AtoB, format!("{i}")).unwrap();
        }
        let err = reg.send(id, Direction::AtoB, "overflow").unwrap_err();
        assert_eq!(
            err,
            Error::BufferFull {
                direction: Direction::AtoB,
                capacity: 100
            }
        );
        let ch = reg.get(id).unwrap();
        assert_eq!(ch.len(Direction::AtoB), 100);
        assert_eq!(ch.sent(Direction::AtoB), 100);
        assert_eq!(ch.buffer(Direction::AtoB).back().unwrap(), "99");
        // The other direction is unaffected
        reg.send(id, Direction::BtoA, "ok").unwrap();
    }

    #[test]
    fn test_unknown_channel() {
        let mut reg = registry();
        let ghost = ChannelId::new();
        assert!(matches!(
            reg.send(ghost, Direction::AtoB, "x"),
            Err(Error::NotFound {
                kind: ResourceKind::Channel,
                ..
            })
        ));
        assert!(matches!(
            reg.receive(ghost, Direction::AtoB),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut reg = registry();
        let id = reg.create("P", "Q").id();
        assert!(reg.delete(id));
        assert!(!reg.delete(id));
        assert!(reg.is_empty());
        assert!(reg.list_all().is_empty());
    }

    #[test]
    fn test_snapshot_published_after_mutation() {
        let mut reg = registry();
        let mut sub = reg.subscribe(Subscribe::all());
        let id = reg.create("P", "Q").id();
        reg.send(id, Direction::AtoB, "x").unwrap();
        let _ = reg.send(ChannelId::new(), Direction::AtoB, "lost");
        let _ = reg.receive(id, Direction::BtoA);
        reg.delete(id);

        let changes = sub.drain();
        let kinds: Vec<_> = changes.iter().map(|e| e.event.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Sent, ChangeKind::Deleted]
        );
        let sent = &changes[1].event;
        assert_eq!(sent.current().unwrap().len(Direction::AtoB), 1);
        assert!(changes[2].event.snapshot.is_empty());
    }
}
