use std::{collections::VecDeque, fmt, sync::Arc};

use crate::{
    ChangeBus, Clock, Config, Error, Payload, ProcessId, Result, Timestamp, WallClock,
    bus::{Observer, Subscribe, SubscriberId, Subscription},
    change::{Change, ChangeKind, Resource, ResourceKind},
    ids::QueueId,
};

/// A message waiting in a queue.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub payload: Payload,
    pub sender: ProcessId,
    pub enqueued_at: Timestamp,
    /// Caller-supplied priority. Stored for display only: delivery is
    /// strictly in send order.
    pub priority: Option<i32>,
}

/// Bounded FIFO message store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Queue {
    id: QueueId,
    name: String,
    capacity: usize,
    messages: VecDeque<Message>,
    participants: Vec<ProcessId>,
    total_sent: u64,
    total_received: u64,
    created_at: Timestamp,
}

impl Queue {
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending messages, oldest first.
    pub fn messages(&self) -> &VecDeque<Message> {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    /// Every sender and receiver seen so far, in first-seen order.
    pub fn participants(&self) -> &[ProcessId] {
        &self.participants
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn join(&mut self, process: &ProcessId) {
        if !self.participants.contains(process) {
            self.participants.push(process.clone());
        }
    }
}

impl Resource for Queue {
    type Id = QueueId;
    const KIND: ResourceKind = ResourceKind::Queue;

    fn id(&self) -> QueueId {
        self.id
    }
}

/// Owns every message queue of a simulation.
pub struct QueueRegistry {
    queues: Vec<Queue>,
    default_capacity: usize,
    clock: Arc<dyn Clock>,
    bus: ChangeBus<Change<Queue>, ChangeKind>,
}

impl QueueRegistry {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            queues: Vec::new(),
            default_capacity: config.default_queue_capacity,
            clock,
            bus: ChangeBus::new(),
        }
    }

    /// Create a queue holding at most `capacity` messages.
    ///
    /// A capacity of zero is raised to one.
    pub fn create(&mut self, name: impl Into<String>, capacity: usize) -> Queue {
        let name = name.into();
        if capacity == 0 {
            tracing::warn!(queue = %name, "queue capacity must be at least 1, using 1");
        }
        let queue = Queue {
            id: QueueId::new(),
            name,
            capacity: capacity.max(1),
            messages: VecDeque::new(),
            participants: Vec::new(),
            total_sent: 0,
            total_received: 0,
            created_at: self.clock.now(),
        };
        tracing::debug!(
            queue = %queue.id,
            name = %queue.name,
            capacity = queue.capacity,
            "queue created"
        );
        self.queues.push(queue.clone());
        self.notify(ChangeKind::Created, queue.id);
        queue
    }

    /// Create a queue with the configured default capacity.
    pub fn create_default(&mut self, name: impl Into<String>) -> Queue {
        self.create(name, self.default_capacity)
    }

    pub fn send(
        &mut self,
        id: QueueId,
        payload: impl Into<Payload>,
        sender: impl Into<ProcessId>,
    ) -> Result {
        self.enqueue(id, payload.into(), sender.into(), None)
    }

    /// Like [`send`](Self::send), tagging the message with a priority that
    /// is kept but never used for ordering.
    pub fn send_with_priority(
        &mut self,
        id: QueueId,
        payload: impl Into<Payload>,
        sender: impl Into<ProcessId>,
        priority: i32,
    ) -> Result {
        self.enqueue(id, payload.into(), sender.into(), Some(priority))
    }

    fn enqueue(
        &mut self,
        id: QueueId,
        payload: Payload,
        sender: ProcessId,
        priority: Option<i32>,
    ) -> Result {
        let now = self.clock.now();
        let queue = self.find_mut(id)?;
        if queue.is_full() {
            tracing::debug!(queue = %id, capacity = queue.capacity, "queue full");
            return Err(Error::QueueFull {
                capacity: queue.capacity,
            });
        }
        queue.join(&sender);
        queue.messages.push_back(Message {
            payload,
            sender,
            enqueued_at: now,
            priority,
        });
        queue.total_sent += 1;
        tracing::debug!(queue = %id, len = queue.messages.len(), "message sent");
        self.notify(ChangeKind::Sent, id);
        Ok(())
    }

    /// Remove and return the oldest message.
    pub fn receive(&mut self, id: QueueId, receiver: impl Into<ProcessId>) -> Result<Message> {
        let receiver = receiver.into();
        let queue = self.find_mut(id)?;
        let message = queue.messages.pop_front().ok_or(Error::QueueEmpty)?;
        queue.total_received += 1;
        queue.join(&receiver);
        tracing::debug!(queue = %id, %receiver, len = queue.messages.len(), "message received");
        self.notify(ChangeKind::Received, id);
        Ok(message)
    }

    /// Remove a queue and its pending messages. Returns `false` if it did
    /// not exist.
    pub fn delete(&mut self, id: QueueId) -> bool {
        let before = self.queues.len();
        self.queues.retain(|q| q.id != id);
        let removed = before != self.queues.len();
        if removed {
            tracing::debug!(queue = %id, "queue deleted");
            self.notify(ChangeKind::Deleted, id);
        }
        removed
    }

    pub fn get(&self, id: QueueId) -> Option<&Queue> {
        self.queues.iter().find(|q| q.id == id)
    }

    /// Copy of every queue, in creation order.
    pub fn list_all(&self) -> Vec<Queue> {
        self.queues.clone()
    }

    /// Every queue, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Queue> {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn subscribe(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
    ) -> Subscription<Change<Queue>> {
        self.bus.subscribe(topics)
    }

    pub fn observe<O>(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
        observer: O,
    ) -> SubscriberId
    where
        O: Observer<Change<Queue>> + 'static,
    {
        self.bus.observe(topics, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn find_mut(&mut self, id: QueueId) -> Result<&mut Queue> {
        self.queues
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::Queue, id))
    }

    fn notify(&mut self, kind: ChangeKind, resource: QueueId) {
        let snapshot: Arc<[Queue]> = self.queues.iter().cloned().collect();
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

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(&Config::default(), Arc::new(WallClock))
    }
}

impl fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("queues", &self.queues.len())
            .field("bus", &self.bus)
            .finish()
    }
}
