use std::borrow::Cow;

/// Human-readable name of a value, usually an enum variant.
///
/// Derive it with `#[derive(Label)]`; for enums the label is the variant
/// name (e.g. `ChangeKind::Locked` -> `"Locked"`).
pub trait Label {
    /// Returns a human-readable label for this item.
    /// This is used for logging and report messages.
    fn label(&self) -> Cow<'static, str>;
}
