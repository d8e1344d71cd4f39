use std::{collections::HashSet, hash::Hash};

/// Topic filter of a bus subscriber.
///
/// ```rust
/// use ipcsim::{ChangeKind, Subscribe};
///
/// let locks = Subscribe::to([ChangeKind::Locked, ChangeKind::Unlocked]);
/// assert!(locks.contains(&ChangeKind::Locked));
/// assert!(!locks.contains(&ChangeKind::Written));
/// assert!(Subscribe::all().contains(&ChangeKind::Written));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscribe<T: Eq + Hash> {
    /// Every topic
    All,
    /// Specific topics only
    Topics(HashSet<T>),
}

impl<T: Eq + Hash> Subscribe<T> {
    pub fn all() -> Self {
        Subscribe::All
    }

    pub fn to<I: IntoIterator<Item = T>>(topics: I) -> Self {
        Subscribe::Topics(topics.into_iter().collect())
    }

    pub fn contains(&self, topic: &T) -> bool {
        match self {
            Subscribe::All => true,
            Subscribe::Topics(topics) => topics.contains(topic),
        }
    }
}

impl<T: Eq + Hash + Clone> From<&[T]> for Subscribe<T> {
    fn from(topics: &[T]) -> Self {
        Subscribe::Topics(topics.iter().cloned().collect())
    }
}

impl<T: Eq + Hash, const N: usize> From<[T; N]> for Subscribe<T> {
    fn from(topics: [T; N]) -> Self {
        Subscribe::Topics(topics.into_iter().collect())
    }
}
