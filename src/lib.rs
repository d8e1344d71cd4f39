//! ipcsim - IPC simulation engine
//!
//! A small, deterministic model of three inter-process communication
//! primitives (bidirectional pipes, bounded message queues, lock-guarded
//! shared-memory segments) plus heuristics that flag bottlenecks and
//! suspected deadlocks.
//!
//! Every registry publishes a full snapshot of its collection through a
//! [`ChangeBus`] after each successful mutation. The [`AnalysisEngine`]
//! derives its reports from current snapshots on each call.
//!
//! See `demos/contention.rs`.

extern crate self as ipcsim;

mod change;
mod channel;
mod clock;
mod config;
mod envelope;
mod error;
mod event;
mod ids;
mod label;
mod meta;
mod payload;
mod queue;
mod segment;
mod simulator;
mod topic;
mod value;

pub mod analysis;
pub mod bus;

pub use analysis::{AnalysisEngine, Bottleneck, Deadlock, Severity, Transfer, TransferStats};
pub use bus::{ChangeBus, Observer, Subscribe, SubscriberId, Subscription};
pub use change::{Change, ChangeKind, Resource, ResourceKind};
pub use channel::{Channel, ChannelRegistry, ChannelStatus, Direction};
pub use clock::{Clock, MockClock, WallClock};
pub use config::{Config, Thresholds};
pub use envelope::Envelope;
pub use error::Error;
pub use event::Event;
pub use ids::{ChannelId, ProcessId, QueueId, SegmentId};
pub use label::Label;
pub use meta::Meta;
pub use payload::Payload;
pub use queue::{Message, Queue, QueueRegistry};
pub use segment::{LockGrant, LockInfo, Segment, SegmentRegistry, Wait};
pub use simulator::Simulator;
pub use topic::{DefaultTopic, Topic};
pub use value::{Document, Value};

pub use ipcsim_macros::Label;

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Milliseconds as reported by a [`Clock`].
pub type Timestamp = u64;

pub type EventId = u128;

pub mod prelude {
    pub use crate::analysis::AnalysisEngine;
    pub use crate::bus::{ChangeBus, Subscribe};
    pub use crate::change::{Change, ChangeKind};
    pub use crate::channel::{ChannelRegistry, Direction};
    pub use crate::clock::{Clock, MockClock, WallClock};
    pub use crate::config::Config;
    pub use crate::error::Error as IpcError;
    pub use crate::label::Label;
    pub use crate::queue::QueueRegistry;
    pub use crate::segment::SegmentRegistry;
    pub use crate::simulator::Simulator;
    pub use crate::value::{Document, Value};
}
