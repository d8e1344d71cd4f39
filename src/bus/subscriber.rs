use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    Envelope, Event, Topic,
    bus::{Observer, Subscribe, SubscriberId},
};

pub(crate) enum Sink<E: Event> {
    Channel(UnboundedSender<Arc<Envelope<E>>>),
    Observer(Box<dyn Observer<E>>),
}

pub(crate) struct Subscriber<E: Event, T: Topic<E>> {
    pub id: SubscriberId,
    pub topics: Subscribe<T>,
    pub sink: Sink<E>,
}

impl<E: Event, T: Topic<E>> Subscriber<E, T> {
    pub fn new(id: SubscriberId, topics: Subscribe<T>, sink: Sink<E>) -> Subscriber<E, T> {
        Subscriber { id, topics, sink }
    }

    pub fn is_closed(&self) -> bool {
        match &self.sink {
            Sink::Channel(sender) => sender.is_closed(),
            Sink::Observer(_) => false,
        }
    }
}

impl<E: Event, T: Topic<E>> PartialEq for Subscriber<E, T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E: Event, T: Topic<E>> Eq for Subscriber<E, T> {}
