use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use crate::{
    ChangeBus, Clock, Config, Error, ProcessId, Result, Timestamp, WallClock,
    bus::{Observer, Subscribe, SubscriberId, Subscription},
    change::{Change, ChangeKind, Resource, ResourceKind},
    ids::SegmentId,
    value::{self, Document},
};

/// Current owner of a segment lock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockInfo {
    pub holder: ProcessId,
    pub acquired_at: Timestamp,
}

/// A process blocked on a segment lock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wait {
    /// Holder at the time of the failed attempt.
    pub blocked_by: ProcessId,
    pub since: Timestamp,
}

/// Successful outcome of [`SegmentRegistry::lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGrant {
    pub holder: ProcessId,
    pub acquired_at: Timestamp,
    /// The caller already held the lock; nothing changed.
    pub reentrant: bool,
}

/// Named key-value store guarded by an advisory exclusive lock.
///
/// Lock states: unlocked, or held by exactly one process. Processes that
/// fail to get access while another one holds the lock are remembered with
/// the holder and the time of their first failed attempt against it, until
/// they acquire the lock themselves. A wait only counts while that holder
/// keeps the lock.
///
/// Recording a wait is not a change: failed calls publish nothing, so
/// `waiting()` in a published snapshot shows the waits as of the last
/// successful mutation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    id: SegmentId,
    name: String,
    capacity_bytes: usize,
    content: Document,
    lock: Option<LockInfo>,
    waits: BTreeMap<ProcessId, Wait>,
    reads: u64,
    writes: u64,
    lock_acquisitions: u64,
    created_at: Timestamp,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advisory size. Writes are not checked against it.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn content(&self) -> &Document {
        &self.content
    }

    pub fn lock(&self) -> Option<&LockInfo> {
        self.lock.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn holder(&self) -> Option<&ProcessId> {
        self.lock.as_ref().map(|l| &l.holder)
    }

    /// When `process` first failed to get access, if it is still waiting.
    pub fn wait_started(&self, process: &ProcessId) -> Option<Timestamp> {
        self.waits.get(process).map(|w| w.since)
    }

    pub fn wait(&self, process: &ProcessId) -> Option<&Wait> {
        self.waits.get(process)
    }

    /// Start of the wait of `process`, provided the process that blocked it
    /// still holds the lock.
    pub fn active_wait(&self, process: &ProcessId) -> Option<Timestamp> {
        let wait = self.waits.get(process)?;
        (self.holder() == Some(&wait.blocked_by)).then_some(wait.since)
    }

    /// Waiting processes, longest wait first (ties by name).
    pub fn waiting(&self) -> Vec<(&ProcessId, Timestamp)> {
        let mut waiting: Vec<_> = self.waits.iter().map(|(p, w)| (p, w.since)).collect();
        waiting.sort_by_key(|(_, started)| *started);
        waiting
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn lock_acquisitions(&self) -> u64 {
        self.lock_acquisitions
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// `Err(LockHeld)` when another process holds the lock. The caller's
    /// wait clock starts on its first failed attempt and keeps running
    /// across later ones against the same holder. A new holder restarts it.
    fn check_access(
        &mut self,
        process: &ProcessId,
        now: Timestamp,
        threshold: Duration,
    ) -> Result {
        match &self.lock {
            Some(lock) if lock.holder != *process => {
                let wait = self.waits.entry(process.clone()).or_insert_with(|| Wait {
                    blocked_by: lock.holder.clone(),
                    since: now,
                });
                if wait.blocked_by != lock.holder {
                    *wait = Wait {
                        blocked_by: lock.holder.clone(),
                        since: now,
                    };
                }
                let started = wait.since;
                let deadlock_suspected = waited_long(started, now, threshold);
                if deadlock_suspected {
                    tracing::warn!(
                        segment = %self.id,
                        %process,
                        holder = %lock.holder,
                        waited_ms = now.saturating_sub(started),
                        "deadlock suspected"
                    );
                } else {
                    tracing::debug!(
                        segment = %self.id,
                        %process,
                        holder = %lock.holder,
                        "lock contention"
                    );
                }
                Err(Error::LockHeld {
                    owner: lock.holder.clone(),
                    deadlock_suspected,
                })
            }
            _ => Ok(()),
        }
    }
}

impl Resource for Segment {
    type Id = SegmentId;
    const KIND: ResourceKind = ResourceKind::Segment;

    fn id(&self) -> SegmentId {
        self.id
    }
}

pub(crate) fn waited_long(started: Timestamp, now: Timestamp, threshold: Duration) -> bool {
    now.saturating_sub(started) >= threshold.as_millis() as u64
}

/// Owns every shared-memory segment of a simulation.
pub struct SegmentRegistry {
    segments: Vec<Segment>,
    default_size: usize,
    deadlock_wait: Duration,
    clock: Arc<dyn Clock>,
    bus: ChangeBus<Change<Segment>, ChangeKind>,
}

impl SegmentRegistry {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            segments: Vec::new(),
            default_size: config.default_segment_size,
            deadlock_wait: config.deadlock_wait,
            clock,
            bus: ChangeBus::new(),
        }
    }

    pub fn create(&mut self, name: impl Into<String>, capacity_bytes: usize) -> Segment {
        let segment = Segment {
            id: SegmentId::new(),
            name: name.into(),
            capacity_bytes,
            content: Document::new(),
            lock: None,
            waits: BTreeMap::new(),
            reads: 0,
            writes: 0,
            lock_acquisitions: 0,
            created_at: self.clock.now(),
        };
        tracing::debug!(
            segment = %segment.id,
            name = %segment.name,
            capacity_bytes,
            "segment created"
        );
        self.segments.push(segment.clone());
        self.notify(ChangeKind::Created, segment.id);
        segment
    }

    /// Create a segment with the configured default size.
    pub fn create_default(&mut self, name: impl Into<String>) -> Segment {
        self.create(name, self.default_size)
    }

    /// Acquire the exclusive lock for `process`.
    ///
    /// Locking a segment already held by the caller succeeds without any
    /// change (`reentrant` is set, `acquired_at` keeps its original value
    /// and no notification is published).
    pub fn lock(&mut self, id: SegmentId, process: impl Into<ProcessId>) -> Result<LockGrant> {
        let process = process.into();
        let now = self.clock.now();
        let threshold = self.deadlock_wait;
        let segment = self.find_mut(id)?;

        if let Some(lock) = &segment.lock {
            if lock.holder == process {
                return Ok(LockGrant {
                    holder: process,
                    acquired_at: lock.acquired_at,
                    reentrant: true,
                });
            }
        }
        segment.check_access(&process, now, threshold)?;

        segment.lock = Some(LockInfo {
            holder: process.clone(),
            acquired_at: now,
        });
        segment.lock_acquisitions += 1;
        segment.waits.remove(&process);
        tracing::debug!(segment = %id, %process, "locked");
        self.notify(ChangeKind::Locked, id);
        Ok(LockGrant {
            holder: process,
            acquired_at: now,
            reentrant: false,
        })
    }

    /// Release the lock held by `process`. Returns the released lock.
    ///
    /// Other processes stay in the wait list, but their waits no longer
    /// count towards a deadlock; a failed attempt against the next holder
    /// starts a fresh wait.
    pub fn unlock(&mut self, id: SegmentId, process: impl Into<ProcessId>) -> Result<LockInfo> {
        let process = process.into();
        let segment = self.find_mut(id)?;
        match &segment.lock {
            None => return Err(Error::NotLocked),
            Some(lock) if lock.holder != process => {
                return Err(Error::WrongOwner {
                    owner: lock.holder.clone(),
                });
            }
            Some(_) => {}
        }
        let released = segment.lock.take().ok_or(Error::NotLocked)?;
        tracing::debug!(segment = %id, %process, "unlocked");
        self.notify(ChangeKind::Unlocked, id);
        Ok(released)
    }

    /// Shallow-merge `partial` into the segment content.
    ///
    /// Allowed when the segment is unlocked or locked by `process`.
    pub fn write(
        &mut self,
        id: SegmentId,
        process: impl Into<ProcessId>,
        partial: Document,
    ) -> Result {
        let process = process.into();
        let now = self.clock.now();
        let threshold = self.deadlock_wait;
        let segment = self.find_mut(id)?;
        segment.check_access(&process, now, threshold)?;

        let keys = partial.len();
        value::merge(&mut segment.content, partial);
        segment.writes += 1;
        tracing::debug!(segment = %id, %process, keys, "written");
        self.notify(ChangeKind::Written, id);
        Ok(())
    }

    /// Copy of the segment content.
    ///
    /// Allowed when the segment is unlocked or locked by `process`.
    pub fn read(&mut self, id: SegmentId, process: impl Into<ProcessId>) -> Result<Document> {
        let process = process.into();
        let now = self.clock.now();
        let threshold = self.deadlock_wait;
        let segment = self.find_mut(id)?;
        segment.check_access(&process, now, threshold)?;

        segment.reads += 1;
        let content = segment.content.clone();
        tracing::debug!(segment = %id, %process, "read");
        self.notify(ChangeKind::Read, id);
        Ok(content)
    }

    /// Whether `process` has been waiting on the segment for at least the
    /// deadlock threshold, behind a holder that has kept the lock since.
    ///
    /// This only looks at one process and one segment; it does not follow
    /// wait-for chains across segments.
    pub fn evaluate_wait(&self, id: SegmentId, process: &ProcessId) -> bool {
        let now = self.clock.now();
        self.get(id)
            .and_then(|s| s.active_wait(process))
            .is_some_and(|started| waited_long(started, now, self.deadlock_wait))
    }

    /// Empty the segment content, whoever holds the lock.
    pub fn clear(&mut self, id: SegmentId) -> Result {
        let segment = self.find_mut(id)?;
        segment.content.clear();
        tracing::debug!(segment = %id, "cleared");
        self.notify(ChangeKind::Cleared, id);
        Ok(())
    }

    /// Remove a segment together with its lock and wait bookkeeping.
    /// Returns `false` if it did not exist.
    pub fn delete(&mut self, id: SegmentId) -> bool {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        let removed = before != self.segments.len();
        if removed {
            tracing::debug!(segment = %id, "segment deleted");
            self.notify(ChangeKind::Deleted, id);
        }
        removed
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Copy of every segment, in creation order.
    pub fn list_all(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    /// Every segment, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn subscribe(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
    ) -> Subscription<Change<Segment>> {
        self.bus.subscribe(topics)
    }

    pub fn observe<O>(
        &mut self,
        topics: impl Into<Subscribe<ChangeKind>>,
        observer: O,
    ) -> SubscriberId
    where
        O: Observer<Change<Segment>> + 'static,
    {
        self.bus.observe(topics, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn find_mut(&mut self, id: SegmentId) -> Result<&mut Segment> {
        self.segments
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found(ResourceKind::Segment, id))
    }

    fn notify(&mut self, kind: ChangeKind, resource: SegmentId) {
        let snapshot: Arc<[Segment]> = self.segments.iter().cloned().collect();
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

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new(&Config::default(), Arc::new(WallClock))
    }
}

impl fmt::Debug for SegmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentRegistry")
            .field("segments", &self.segments.len())
            .field("deadlock_wait", &self.deadlock_wait)
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockClock, Value};

    fn setup() -> (MockClock, SegmentRegistry, SegmentId) {
        let clock = MockClock::new(0);
        let mut reg = SegmentRegistry::new(&Config::default(), Arc::new(clock.clone()));
        let id = reg.create("shm", 1024).id();
        (clock, reg, id)
    }

    fn doc(key: &str, value: impl Into<Value>) -> Document {
        Document::from([(key.to_string(), value.into())])
    }

    fn pid(name: &str) -> ProcessId {
        ProcessId::from(name)
    }

    #[test]
    fn test_lock_unlock_cycle() {
        let (clock, mut reg, id) = setup();
        clock.set(100);
        let grant = reg.lock(id, "A").unwrap();
        assert_eq!(grant.acquired_at, 100);
        assert!(!grant.reentrant);

        let seg = reg.get(id).unwrap();
        assert_eq!(seg.holder(), Some(&pid("A")));
        assert_eq!(seg.lock_acquisitions(), 1);

        let released = reg.unlock(id, "A").unwrap();
        assert_eq!(released.holder, "A");
        assert!(!reg.get(id).unwrap().is_locked());
    }

    #[test]
    fn test_competing_lock_keeps_holder() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        clock.set(50);

        let err = reg.lock(id, "B").unwrap_err();
        assert_eq!(
            err,
            Error::LockHeld {
                owner: pid("A"),
                deadlock_suspected: false
            }
        );
        let seg = reg.get(id).unwrap();
        assert_eq!(seg.holder(), Some(&pid("A")));
        assert_eq!(seg.wait_started(&pid("B")), Some(50));
        assert_eq!(seg.lock_acquisitions(), 1);
    }

    #[test]
    fn test_relock_by_holder_is_noop() {
        let (clock, mut reg, id) = setup();
        clock.set(10);
        reg.lock(id, "A").unwrap();
        let mut sub = reg.subscribe(Subscribe::all());
        clock.set(900);

        let grant = reg.lock(id, "A").unwrap();
        assert!(grant.reentrant);
        assert_eq!(grant.acquired_at, 10);

        let seg = reg.get(id).unwrap();
        assert_eq!(seg.lock().unwrap().acquired_at, 10);
        assert_eq!(seg.lock_acquisitions(), 1);
        assert!(seg.waiting().is_empty());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_first_failure_starts_wait_clock() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        clock.set(1_000);
        assert!(reg.lock(id, "B").is_err());
        clock.set(3_000);
        assert!(reg.lock(id, "B").is_err());
        assert_eq!(reg.get(id).unwrap().wait_started(&pid("B")), Some(1_000));
    }

    #[test]
    fn test_new_holder_restarts_wait_clock() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        assert!(reg.write(id, "B", doc("k", 1i64)).is_err());
        reg.unlock(id, "A").unwrap();
        assert!(!reg.evaluate_wait(id, &pid("B")));

        clock.set(6_000);
        reg.lock(id, "C").unwrap();
        assert!(!reg.evaluate_wait(id, &pid("B")));
        let err = reg.write(id, "B", doc("k", 2i64)).unwrap_err();
        assert_eq!(
            err,
            Error::LockHeld {
                owner: pid("C"),
                deadlock_suspected: false
            }
        );
        let wait = reg.get(id).unwrap().wait(&pid("B")).cloned().unwrap();
        assert_eq!(wait.blocked_by, "C");
        assert_eq!(wait.since, 6_000);

        clock.set(11_000);
        assert!(reg.evaluate_wait(id, &pid("B")));
        assert!(reg.read(id, "B").unwrap_err().deadlock_suspected());
    }

    #[test]
    fn test_wait_recorded_without_notification() {
        let (_clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        let mut sub = reg.subscribe(Subscribe::all());

        assert!(reg.lock(id, "B").is_err());
        assert!(reg.read(id, "C").is_err());
        assert!(sub.try_recv().is_none());
        assert_eq!(reg.get(id).unwrap().waiting().len(), 2);

        reg.unlock(id, "A").unwrap();
        let change = sub.try_recv().unwrap();
        assert_eq!(change.event.current().unwrap().waiting().len(), 2);
    }

    #[test]
    fn test_acquisition_clears_wait() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        assert!(reg.write(id, "B", doc("k", 1i64)).is_err());
        assert!(reg.get(id).unwrap().wait_started(&pid("B")).is_some());

        reg.unlock(id, "A").unwrap();
        clock.advance(Duration::from_millis(10));
        reg.lock(id, "B").unwrap();
        let seg = reg.get(id).unwrap();
        assert_eq!(seg.wait_started(&pid("B")), None);
        assert_eq!(seg.lock().unwrap().acquired_at, 10);
    }

    #[test]
    fn test_unlock_errors() {
        let (_clock, mut reg, id) = setup();
        assert_eq!(reg.unlock(id, "A"), Err(Error::NotLocked));
        reg.lock(id, "A").unwrap();
        assert_eq!(
            reg.unlock(id, "B"),
            Err(Error::WrongOwner { owner: pid("A") })
        );
        assert!(reg.get(id).unwrap().is_locked());
    }

    #[test]
    fn test_write_merges_shallow() {
        let (_clock, mut reg, id) = setup();
        reg.write(id, "A", doc("a", 1i64)).unwrap();
        reg.write(id, "B", doc("b", "two")).unwrap();
        reg.write(id, "A", doc("a", 3i64)).unwrap();

        let content = reg.read(id, "C").unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content["a"], Value::Int(3));
        assert_eq!(content["b"], Value::Text("two".into()));
        let seg = reg.get(id).unwrap();
        assert_eq!(seg.writes(), 3);
        assert_eq!(seg.reads(), 1);
    }

    #[test]
    fn test_holder_can_access_others_cannot() {
        let (_clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        reg.write(id, "A", doc("x", true)).unwrap();
        assert_eq!(reg.read(id, "A").unwrap()["x"], Value::Bool(true));

        assert!(matches!(
            reg.read(id, "B"),
            Err(Error::LockHeld { ref owner, .. }) if *owner == "A"
        ));
        assert!(reg.write(id, "B", doc("x", false)).is_err());

        let seg = reg.get(id).unwrap();
        assert_eq!(seg.content()["x"], Value::Bool(true));
        assert_eq!(seg.writes(), 1);
        assert_eq!(seg.reads(), 1);
    }

    #[test]
    fn test_deadlock_suspected_after_threshold() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();

        let err = reg.write(id, "B", doc("k", 1i64)).unwrap_err();
        assert!(!err.deadlock_suspected());
        assert!(!reg.evaluate_wait(id, &pid("B")));

        clock.advance(Duration::from_millis(4_999));
        assert!(!reg.read(id, "B").unwrap_err().deadlock_suspected());

        clock.advance(Duration::from_millis(1));
        assert!(reg.evaluate_wait(id, &pid("B")));
        assert!(reg.write(id, "B", doc("k", 1i64)).unwrap_err().deadlock_suspected());
        assert!(reg.lock(id, "B").unwrap_err().deadlock_suspected());
    }

    #[test]
    fn test_evaluate_wait_unknown() {
        let (_clock, reg, id) = setup();
        assert!(!reg.evaluate_wait(id, &pid("nobody")));
        assert!(!reg.evaluate_wait(SegmentId::new(), &pid("nobody")));
    }

    #[test]
    fn test_clear_ignores_lock() {
        let (_clock, mut reg, id) = setup();
        reg.write(id, "A", doc("k", 1i64)).unwrap();
        reg.lock(id, "A").unwrap();
        reg.clear(id).unwrap();
        assert!(reg.get(id).unwrap().content().is_empty());
        assert!(matches!(
            reg.clear(SegmentId::new()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_drops_lock_and_waits() {
        let (_clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        let _ = reg.lock(id, "B");
        assert!(reg.delete(id));
        assert!(!reg.delete(id));
        assert!(matches!(reg.lock(id, "B"), Err(Error::NotFound { .. })));
        assert!(!reg.evaluate_wait(id, &pid("B")));
    }

    #[test]
    fn test_waiting_order() {
        let (clock, mut reg, id) = setup();
        reg.lock(id, "A").unwrap();
        clock.set(20);
        let _ = reg.read(id, "Z");
        clock.set(30);
        let _ = reg.read(id, "B");
        let seg = reg.get(id).unwrap();
        let waiting: Vec<_> = seg.waiting().into_iter().map(|(p, t)| (p.name(), t)).collect();
        assert_eq!(waiting, vec![("Z", 20), ("B", 30)]);
    }

    #[test]
    fn test_notifications() {
        let (_clock, mut reg, id) = setup();
        let mut locks = reg.subscribe([ChangeKind::Locked, ChangeKind::Unlocked]);
        reg.lock(id, "A").unwrap();
        let _ = reg.lock(id, "B");
        reg.write(id, "A", doc("k", 1i64)).unwrap();
        reg.unlock(id, "A").unwrap();

        let changes = locks.drain();
        assert_eq!(changes.len(), 2);
        let locked = changes[0].event.current().unwrap();
        assert_eq!(locked.holder(), Some(&pid("A")));
        assert_eq!(changes[1].event.kind, ChangeKind::Unlocked);
        assert!(changes[0].meta.sequence() < changes[1].meta.sequence());
    }
}
