use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::stream::Stream;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

use crate::{Envelope, Event, bus::SubscriberId};

/// Receiving end of a [`ChangeBus::subscribe`] call.
///
/// Envelopes arrive in publish order. Read them synchronously with
/// [`try_recv`](Self::try_recv) / [`drain`](Self::drain), await them with
/// [`recv`](Self::recv), or consume the subscription as a `Stream`.
/// Dropping it unsubscribes on the next publish.
///
/// [`ChangeBus::subscribe`]: crate::ChangeBus::subscribe
#[derive(Debug)]
pub struct Subscription<E: Event> {
    id: SubscriberId,
    receiver: UnboundedReceiver<Arc<Envelope<E>>>,
}

impl<E: Event> Subscription<E> {
    pub(crate) fn new(id: SubscriberId, receiver: UnboundedReceiver<Arc<Envelope<E>>>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next pending envelope, if any.
    pub fn try_recv(&mut self) -> Option<Arc<Envelope<E>>> {
        match self.receiver.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// All pending envelopes, oldest first.
    pub fn drain(&mut self) -> Vec<Arc<Envelope<E>>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Waits for the next envelope. Returns `None` once the bus is dropped
    /// and every pending envelope has been read.
    pub async fn recv(&mut self) -> Option<Arc<Envelope<E>>> {
        self.receiver.recv().await
    }

    /// Number of envelopes waiting to be read.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl<E: Event> Stream for Subscription<E> {
    type Item = Arc<Envelope<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
