use crate::{Envelope, Event};

/// Synchronous change callback registered with [`ChangeBus::observe`].
///
/// Called after the mutation that produced the event has been fully
/// applied. An observer that panics is removed from the bus.
///
/// Closures taking `&Envelope<E>` implement this trait.
///
/// [`ChangeBus::observe`]: crate::ChangeBus::observe
pub trait Observer<E: Event>: Send {
    fn on_change(&mut self, envelope: &Envelope<E>);
}

impl<E, F> Observer<E> for F
where
    E: Event,
    F: FnMut(&Envelope<E>) + Send,
{
    fn on_change(&mut self, envelope: &Envelope<E>) {
        self(envelope)
    }
}
