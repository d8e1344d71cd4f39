//! Publish/subscribe fan-out of registry changes.
//!
//! A [`ChangeBus`] is owned by the component that publishes on it. Since
//! publishing needs `&mut` access to the owner, an event is always published
//! after the mutation that produced it is fully applied, and an observer
//! callback can never re-enter its registry mid-mutation. A consumer that
//! reacts to a change with a further mutation does so after reading the
//! envelope, and that mutation gets its own, later, sequence number.

mod observer;
mod subscribe;
mod subscriber;
mod subscription;

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tokio::sync::mpsc::unbounded_channel;

use crate::{DefaultTopic, Envelope, Event, Timestamp, Topic};
use subscriber::{Sink, Subscriber};

pub use observer::Observer;
pub use subscribe::Subscribe;
pub use subscription::Subscription;

pub type SubscriberId = u64;

/// Fans every published event out to the matching subscribers, in publish
/// order.
///
/// # Examples
///
/// ```rust
/// use ipcsim::{ChangeBus, Event, Subscribe};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Tick(u32);
/// impl Event for Tick {}
///
/// let mut bus = ChangeBus::<Tick>::new();
/// let mut sub = bus.subscribe(Subscribe::all());
/// bus.publish(Tick(1), 0);
/// bus.publish(Tick(2), 0);
///
/// let seen: Vec<_> = sub.drain().iter().map(|e| e.event.0).collect();
/// assert_eq!(seen, vec![1, 2]);
/// ```
pub struct ChangeBus<E: Event, T: Topic<E> = DefaultTopic> {
    subscribers: Vec<Subscriber<E, T>>,
    last_id: SubscriberId,
    sequence: u64,
    ids_to_remove: Vec<SubscriberId>,
}

impl<E: Event, T: Topic<E>> ChangeBus<E, T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            last_id: 0,
            sequence: 0,
            ids_to_remove: Vec::with_capacity(8),
        }
    }

    /// Subscribe through an unbounded channel.
    pub fn subscribe(&mut self, topics: impl Into<Subscribe<T>>) -> Subscription<E> {
        let (tx, rx) = unbounded_channel();
        let id = self.add(topics.into(), Sink::Channel(tx));
        Subscription::new(id, rx)
    }

    /// Register a synchronous callback.
    pub fn observe<O>(&mut self, topics: impl Into<Subscribe<T>>, observer: O) -> SubscriberId
    where
        O: Observer<E> + 'static,
    {
        self.add(topics.into(), Sink::Observer(Box::new(observer)))
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        before != self.subscribers.len()
    }

    fn add(&mut self, topics: Subscribe<T>, sink: Sink<E>) -> SubscriberId {
        self.last_id += 1;
        let id = self.last_id;
        self.subscribers.push(Subscriber::new(id, topics, sink));
        tracing::trace!(subscriber = id, "subscriber added");
        id
    }

    /// Wraps `event` in an [`Envelope`] and delivers it to every subscriber
    /// whose filter matches the event's topic. Subscriptions whose handle
    /// was dropped are removed, whatever their filter.
    pub fn publish(&mut self, event: E, timestamp: Timestamp) -> Arc<Envelope<E>> {
        self.sequence += 1;
        let envelope = Arc::new(Envelope::new(event, self.sequence, timestamp));
        let topic = T::from_event(&envelope.event);

        for subscriber in self.subscribers.iter_mut() {
            if !subscriber.topics.contains(&topic) {
                if subscriber.is_closed() {
                    self.ids_to_remove.push(subscriber.id);
                }
                continue;
            }
            match &mut subscriber.sink {
                Sink::Channel(sender) => {
                    if sender.send(envelope.clone()).is_err() {
                        self.ids_to_remove.push(subscriber.id);
                    }
                }
                Sink::Observer(observer) => {
                    let result = catch_unwind(AssertUnwindSafe(|| observer.on_change(&envelope)));
                    if result.is_err() {
                        tracing::error!(subscriber = subscriber.id, "Observer panicked, removing");
                        self.ids_to_remove.push(subscriber.id);
                    }
                }
            }
        }

        if !self.ids_to_remove.is_empty() {
            let ids = &self.ids_to_remove;
            self.subscribers.retain(|s| !ids.contains(&s.id));
            self.ids_to_remove.clear();
        }

        tracing::trace!(
            event = %envelope.event.name(),
            sequence = self.sequence,
            subscribers = self.subscribers.len(),
            "published"
        );
        envelope
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Sequence number of the last published event (0 before the first).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<E: Event, T: Topic<E>> Default for ChangeBus<E, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event, T: Topic<E>> std::fmt::Debug for ChangeBus<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscribers.len())
            .field("sequence", &self.sequence)
            .finish()
    }
}
