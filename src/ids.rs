use std::{hash::Hash, ops::Deref, str::FromStr, sync::Arc};

use uuid::Uuid;

macro_rules! resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(Uuid);

        impl $name {
            pub(crate) fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

resource_id!(
    /// Identity of a [`Channel`](crate::Channel).
    ChannelId
);

resource_id!(
    /// Identity of a [`Queue`](crate::Queue).
    QueueId
);

resource_id!(
    /// Identity of a [`Segment`](crate::Segment).
    SegmentId
);

/// Name of a simulated process.
///
/// Processes are not execution threads, just caller-supplied identifiers
/// used as lock holders, waiters, senders and receivers. Two ids are equal
/// when their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(Arc<str>);

impl ProcessId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for ProcessId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for ProcessId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for ProcessId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&ProcessId> for ProcessId {
    fn from(id: &ProcessId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for ProcessId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ProcessId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_value_equality() {
        let a = ProcessId::from("worker");
        let b = ProcessId::from(String::from("worker"));
        assert_eq!(a, b);
        assert_eq!(a, "worker");
        assert_eq!(a.name(), "worker");
    }

    #[test]
    fn test_resource_id_parse() {
        let id = SegmentId::new();
        let parsed: SegmentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<SegmentId>().is_err());
        assert_ne!(ChannelId::new(), ChannelId::new());
    }
}
