//! Per-identifier load state machine.
//!
//! Every identifier gets a lazily created slot holding its state, the thread
//! that owns `Loading` (if any) and a condition variable that is notified on
//! every transition. Slots live in a fixed set of shards so unrelated
//! identifiers never contend on one lock.

use std::collections::hash_map::{DefaultHasher, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::sync::mutex::{Condvar, Mutex, RwLock};

const DEFAULT_SHARDS: usize = 32;

/// Load state of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Not loaded (also the state of identifiers never seen).
    #[default]
    Unloaded,
    /// One thread holds exclusive loading rights.
    Loading,
    /// Loaded and safe to read.
    Loaded,
    /// The last load failed.
    Error,
    /// The resource is being torn down.
    Unloading,
}

impl ResourceState {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceState::Unloaded => "unloaded",
            ResourceState::Loading => "loading",
            ResourceState::Loaded => "loaded",
            ResourceState::Error => "error",
            ResourceState::Unloading => "unloading",
        }
    }

    /// Whether `self -> to` is a legal transition.
    fn allows(self, to: ResourceState) -> bool {
        use ResourceState::*;
        matches!(
            (self, to),
            (Unloaded, Loading)
                | (Loading, Loaded)
                | (Loading, Error)
                | (Loading, Unloaded)
                | (Loaded, Unloading)
                | (Error, Unloading)
                | (Error, Unloaded)
                | (Unloading, Unloaded)
        )
    }

    /// The other load outcome, for outcome waits.
    fn opposite_outcome(self) -> Option<ResourceState> {
        match self {
            ResourceState::Loaded => Some(ResourceState::Error),
            ResourceState::Error => Some(ResourceState::Loaded),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

struct SlotState {
    state: ResourceState,
    owner: Option<ThreadId>,
    changed_at: Instant,
}

impl SlotState {
    fn enter(&mut self, state: ResourceState, owner: Option<ThreadId>) {
        self.state = state;
        self.owner = owner;
        self.changed_at = Instant::now();
    }
}

struct StateSlot {
    inner: Mutex<SlotState>,
    changed: Condvar,
}

impl StateSlot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotState {
                state: ResourceState::Unloaded,
                owner: None,
                changed_at: Instant::now(),
            }),
            changed: Condvar::new(),
        }
    }
}

/// Tracks the load state of every identifier and arbitrates loading rights.
///
/// # Example
///
/// ```rust
/// use assetcore::{ResourceState, StateTracker};
///
/// let tracker = StateTracker::new();
/// let me = std::thread::current().id();
///
/// assert!(tracker.try_acquire_loading("tex1", me));
/// assert!(!tracker.try_acquire_loading("tex1", me));
/// assert!(tracker.set("tex1", ResourceState::Loaded, me));
/// assert!(tracker.is_safe_to_access("tex1"));
/// ```
pub struct StateTracker {
    shards: Vec<RwLock<HashMap<String, Arc<StateSlot>>>>,
}

impl StateTracker {
    /// Create a tracker with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a tracker with `count` shards (at least one).
    pub fn with_shards(count: usize) -> Self {
        Self {
            shards: (0..count.max(1))
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, identifier: &str) -> &RwLock<HashMap<String, Arc<StateSlot>>> {
        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn find(&self, identifier: &str) -> Option<Arc<StateSlot>> {
        self.shard(identifier).read().get(identifier).cloned()
    }

    fn slot(&self, identifier: &str) -> Arc<StateSlot> {
        if let Some(slot) = self.find(identifier) {
            return slot;
        }
        self.shard(identifier)
            .write()
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(StateSlot::new()))
            .clone()
    }

    /// Move `Unloaded -> Loading` for `thread` if and only if the identifier
    /// is currently `Unloaded`. Never blocks.
    pub fn try_acquire_loading(&self, identifier: &str, thread: ThreadId) -> bool {
        let slot = self.slot(identifier);
        let mut inner = slot.inner.lock();
        if inner.state != ResourceState::Unloaded {
            return false;
        }
        inner.enter(ResourceState::Loading, Some(thread));
        drop(inner);
        slot.changed.notify_all();
        crate::ac_log!(trace, "{}: loading rights taken by {:?}", identifier, thread);
        true
    }

    /// Request a transition on behalf of `thread`.
    ///
    /// Setting `Loading` is the same as [`try_acquire_loading`](Self::try_acquire_loading).
    /// Only the owner may leave `Loading`. Re-setting the current state is a
    /// successful no-op.
    pub fn set(&self, identifier: &str, state: ResourceState, thread: ThreadId) -> bool {
        if state == ResourceState::Loading && self.owner(identifier) != Some(thread) {
            return self.try_acquire_loading(identifier, thread);
        }

        let slot = self.slot(identifier);
        let mut inner = slot.inner.lock();
        let from = inner.state;

        if from == ResourceState::Loading && inner.owner != Some(thread) {
            let owner = inner.owner;
            drop(inner);
            crate::ac_emit_ctx!(
                AC201,
                "identifier={:?}, requested={}, owner={:?}",
                identifier,
                state,
                owner
            );
            return false;
        }
        if from == state {
            return true;
        }
        if !from.allows(state) {
            drop(inner);
            crate::ac_emit_ctx!(AC202, "identifier={:?}, {} -> {}", identifier, from, state);
            return false;
        }

        let owner = (state == ResourceState::Loading).then_some(thread);
        inner.enter(state, owner);
        drop(inner);
        slot.changed.notify_all();
        crate::ac_log!(trace, "{}: {} -> {}", identifier, from, state);
        true
    }

    /// Block until `target` is observed or `timeout` elapses.
    ///
    /// `None` waits indefinitely. While waiting for a load outcome
    /// (`Loaded` or `Error`), reaching the other outcome returns false.
    pub fn wait_for(
        &self,
        identifier: &str,
        target: ResourceState,
        timeout: Option<Duration>,
    ) -> bool {
        let opposite = target.opposite_outcome();
        self.wait_until(identifier, timeout, |state| {
            state == target || Some(state) == opposite
        }) == Some(target)
    }

    /// Millisecond variant of [`wait_for`](Self::wait_for); 0 waits indefinitely.
    pub fn wait_for_ms(&self, identifier: &str, target: ResourceState, timeout_ms: u64) -> bool {
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self.wait_for(identifier, target, timeout)
    }

    /// Block until `done(state)` holds, returning that state, or `None` on
    /// timeout.
    pub(crate) fn wait_until(
        &self,
        identifier: &str,
        timeout: Option<Duration>,
        mut done: impl FnMut(ResourceState) -> bool,
    ) -> Option<ResourceState> {
        let slot = self.slot(identifier);
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = slot.inner.lock();

        loop {
            if done(inner.state) {
                return Some(inner.state);
            }
            match deadline {
                None => slot.changed.wait(&mut inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    slot.changed.wait_for(&mut inner, deadline - now);
                }
            }
        }
    }

    /// Current state. Untracked identifiers are `Unloaded`.
    pub fn get(&self, identifier: &str) -> ResourceState {
        self.find(identifier)
            .map(|slot| slot.inner.lock().state)
            .unwrap_or_default()
    }

    /// True iff the identifier is `Loaded`.
    pub fn is_safe_to_access(&self, identifier: &str) -> bool {
        self.get(identifier) == ResourceState::Loaded
    }

    /// Thread holding `Loading`, if any.
    pub fn owner(&self, identifier: &str) -> Option<ThreadId> {
        self.find(identifier).and_then(|slot| slot.inner.lock().owner)
    }

    /// When the identifier last changed state.
    pub fn last_change(&self, identifier: &str) -> Option<Instant> {
        self.find(identifier).map(|slot| slot.inner.lock().changed_at)
    }

    /// Drop the slot of an `Unloaded` identifier nobody is waiting on.
    pub fn forget(&self, identifier: &str) -> bool {
        let mut shard = self.shard(identifier).write();
        let removable = match shard.get(identifier) {
            Some(slot) => {
                Arc::strong_count(slot) == 1
                    && slot.inner.lock().state == ResourceState::Unloaded
            }
            None => false,
        };
        if removable {
            shard.remove(identifier);
        }
        removable
    }

    /// Number of identifiers with a slot.
    pub fn tracked_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// `Loaded | Error -> Unloading`, silently. Returns whether it moved.
    pub(crate) fn begin_unload(&self, identifier: &str) -> bool {
        let Some(slot) = self.find(identifier) else {
            return false;
        };
        let mut inner = slot.inner.lock();
        if !matches!(inner.state, ResourceState::Loaded | ResourceState::Error) {
            return false;
        }
        inner.enter(ResourceState::Unloading, None);
        drop(inner);
        slot.changed.notify_all();
        true
    }

    /// `Unloading -> Unloaded`, silently.
    pub(crate) fn finish_unload(&self, identifier: &str) {
        let Some(slot) = self.find(identifier) else {
            return;
        };
        let mut inner = slot.inner.lock();
        if inner.state == ResourceState::Unloading {
            inner.enter(ResourceState::Unloaded, None);
            drop(inner);
            slot.changed.notify_all();
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTracker")
            .field("shards", &self.shards.len())
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn me() -> ThreadId {
        thread::current().id()
    }

    #[test]
    fn test_untracked_is_unloaded() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.get("nothing"), ResourceState::Unloaded);
        assert!(!tracker.is_safe_to_access("nothing"));
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_load_cycle() {
        let tracker = StateTracker::new();
        assert!(tracker.try_acquire_loading("a", me()));
        assert_eq!(tracker.owner("a"), Some(me()));
        assert!(tracker.set("a", ResourceState::Loaded, me()));
        assert_eq!(tracker.owner("a"), None);
        assert!(tracker.set("a", ResourceState::Loaded, me()));
        assert!(tracker.set("a", ResourceState::Unloading, me()));
        assert!(tracker.set("a", ResourceState::Unloaded, me()));
        assert!(tracker.try_acquire_loading("a", me()));
    }

    #[test]
    fn test_non_owner_cannot_leave_loading() {
        let tracker = Arc::new(StateTracker::new());
        assert!(tracker.try_acquire_loading("a", me()));

        let other = tracker.clone();
        let rejected = thread::spawn(move || {
            let id = thread::current().id();
            !other.set("a", ResourceState::Loaded, id) && !other.set("a", ResourceState::Loading, id)
        })
        .join()
        .unwrap();

        assert!(rejected);
        assert_eq!(tracker.get("a"), ResourceState::Loading);
    }

    #[test]
    fn test_invalid_transitions() {
        let tracker = StateTracker::new();
        assert!(!tracker.set("a", ResourceState::Loaded, me()));
        assert!(!tracker.set("a", ResourceState::Unloading, me()));

        assert!(tracker.set("a", ResourceState::Loading, me()));
        assert!(!tracker.set("a", ResourceState::Unloading, me()));
        assert!(tracker.set("a", ResourceState::Error, me()));
        assert!(!tracker.set("a", ResourceState::Loaded, me()));
        assert!(tracker.set("a", ResourceState::Unloaded, me()));
    }

    #[test]
    fn test_wait_for_timeout() {
        let tracker = StateTracker::new();
        tracker.try_acquire_loading("stuck", me());

        let start = Instant::now();
        assert!(!tracker.wait_for_ms("stuck", ResourceState::Loaded, 30));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_for_ms_zero_waits_indefinitely() {
        let tracker = Arc::new(StateTracker::new());
        assert!(tracker.try_acquire_loading("slow", me()));
        let delay = Duration::from_millis(80);

        let waiter = {
            let tracker = tracker.clone();
            thread::spawn(move || tracker.wait_for_ms("slow", ResourceState::Loaded, 0))
        };

        // Zero is no timeout: the waiter is still blocked.
        thread::sleep(delay);
        assert!(!waiter.is_finished());

        assert!(tracker.set("slow", ResourceState::Loaded, me()));
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_for_wakes_on_transition() {
        let tracker = Arc::new(StateTracker::new());
        let loader = tracker.clone();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let b = barrier.clone();

        let handle = thread::spawn(move || {
            let id = thread::current().id();
            assert!(loader.try_acquire_loading("tex", id));
            b.wait();
            thread::sleep(Duration::from_millis(10));
            loader.set("tex", ResourceState::Loaded, id);
        });

        barrier.wait();
        assert!(tracker.wait_for("tex", ResourceState::Loaded, Some(Duration::from_secs(5))));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_opposite_outcome() {
        let tracker = StateTracker::new();
        tracker.try_acquire_loading("bad", me());
        tracker.set("bad", ResourceState::Error, me());

        assert!(!tracker.wait_for("bad", ResourceState::Loaded, None));
        assert!(tracker.wait_for("bad", ResourceState::Error, None));
    }

    #[test]
    fn test_forget() {
        let tracker = StateTracker::new();
        tracker.try_acquire_loading("a", me());
        assert!(!tracker.forget("a"));

        tracker.set("a", ResourceState::Unloaded, me());
        let changed = tracker.last_change("a").unwrap();
        assert!(changed <= Instant::now());
        assert!(tracker.forget("a"));
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_unload_walk() {
        let tracker = StateTracker::new();
        assert!(!tracker.begin_unload("a"));

        tracker.try_acquire_loading("a", me());
        tracker.set("a", ResourceState::Loaded, me());
        assert!(tracker.begin_unload("a"));
        assert_eq!(tracker.get("a"), ResourceState::Unloading);
        tracker.finish_unload("a");
        assert_eq!(tracker.get("a"), ResourceState::Unloaded);
    }
}
