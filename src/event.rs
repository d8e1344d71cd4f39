use std::borrow::Cow;

/// Marker trait for events carried by a [`ChangeBus`](crate::ChangeBus).
///
/// Events must be `Send + Sync + Clone + 'static` because they:
/// - Are wrapped in `Arc<Envelope<E>>` and shared between subscribers (Sync)
/// - May be moved into a task that awaits a subscription (Send, 'static)
///
/// The bus wraps events in an `Envelope` carrying metadata such as the
/// sequence number and timestamp.
///
/// # Event Names
///
/// The `name()` method returns a human-readable name for the event, used
/// for logging. The default implementation returns the full type name via
/// `std::any::type_name`.
pub trait Event: Send + Sync + Clone + 'static {
    /// Returns a human-readable name for this event.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}
