//! Reference-counted resource registry.
//!
//! Identifiers map to `Weak` back references in a fixed number of
//! independently locked buckets. Ownership lives in the `ResourceHandle`s
//! callers hold, so acquire and release are single atomic operations on the
//! shared pointer. A `Weak` whose count already reached zero can never be
//! upgraded, which is what keeps a dying entry from being resurrected.
//!
//! Lock discipline: no `Arc<Entry>` and no payload is ever dropped while a
//! bucket lock is held, because dropping the last handle re-enters the
//! bucket to remove itself.

use std::any::Any;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::api::category::AllocCategory;
use crate::api::config::RegistryConfig;
use crate::api::memory::MemorySystem;
use crate::resource::handle::{Destructor, Entry, Payload, ResourceHandle};
use crate::resource::state::StateTracker;
use crate::sync::mutex::{Mutex, RwLock};

type Bucket = RwLock<HashMap<String, Weak<Entry>>>;

/// State shared between the registry and every entry it created.
pub(crate) struct RegistryShared {
    buckets: Vec<Bucket>,
    hasher: RandomState,
    pub(crate) memory: MemorySystem,
    pub(crate) category: AllocCategory,
    pub(crate) tracker: Option<Arc<StateTracker>>,
}

impl RegistryShared {
    pub(crate) fn bucket(&self, index: usize) -> &Bucket {
        &self.buckets[index]
    }

    fn bucket_index(&self, identifier: &str) -> usize {
        let mut hasher = self.hasher.build_hasher();
        identifier.hash(&mut hasher);
        (hasher.finish() as usize) % self.buckets.len()
    }
}

/// Thread-safe store of `identifier -> resource` with reference counting.
///
/// # Example
///
/// ```rust
/// use assetcore::{MemorySystem, RegistryConfig, ResourceRegistry};
///
/// let registry = ResourceRegistry::new(RegistryConfig::default(), MemorySystem::default());
/// let handle = registry.create("tex1", vec![0u8; 16], 16, |_| {});
/// assert_eq!(handle.ref_count(), 1);
///
/// let again = registry.acquire("tex1").unwrap();
/// assert_eq!(registry.count_of("tex1"), 2);
///
/// drop(again);
/// registry.release(handle);
/// assert!(!registry.exists("tex1"));
/// ```
#[derive(Clone)]
pub struct ResourceRegistry {
    shared: Arc<RegistryShared>,
}

impl ResourceRegistry {
    /// Create a registry accounting size hints through `memory`.
    pub fn new(config: RegistryConfig, memory: MemorySystem) -> Self {
        Self::build(config, memory, None)
    }

    /// Create a registry that walks `tracker` to `Unloaded` as entries die.
    pub fn with_tracker(
        config: RegistryConfig,
        memory: MemorySystem,
        tracker: Arc<StateTracker>,
    ) -> Self {
        Self::build(config, memory, Some(tracker))
    }

    fn build(
        config: RegistryConfig,
        memory: MemorySystem,
        tracker: Option<Arc<StateTracker>>,
    ) -> Self {
        let buckets = (0..config.bucket_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shared: Arc::new(RegistryShared {
                buckets,
                hasher: RandomState::new(),
                memory,
                category: config.category,
                tracker,
            }),
        }
    }

    /// Register a typed payload.
    ///
    /// If `identifier` is already live this behaves like [`acquire`](Self::acquire):
    /// the new payload is dropped and `destructor` is never called.
    pub fn create<T, F>(
        &self,
        identifier: impl Into<String>,
        payload: T,
        size_hint: usize,
        destructor: F,
    ) -> ResourceHandle
    where
        T: Any + Send + Sync,
        F: FnOnce(T) + Send + 'static,
    {
        let destructor: Destructor = Box::new(move |payload: Payload| {
            if let Ok(payload) = payload.downcast::<T>() {
                destructor(*payload);
            }
        });
        self.create_boxed(identifier, Box::new(payload), size_hint, Some(destructor))
    }

    /// Register an already boxed payload. With no destructor the payload is
    /// simply dropped when the last handle goes away.
    pub fn create_boxed(
        &self,
        identifier: impl Into<String>,
        payload: Payload,
        size_hint: usize,
        destructor: Option<Destructor>,
    ) -> ResourceHandle {
        let identifier = identifier.into();
        let index = self.shared.bucket_index(&identifier);

        // Fast path: already live.
        if let Some(handle) = self.acquire(&identifier) {
            return handle;
        }

        let category = self.shared.category;
        let tracked = size_hint > 0 && self.shared.memory.track(category, size_hint);
        let mut payload = Some(payload);
        let mut destructor = destructor;

        let (outcome, replaced) = {
            let mut bucket = self.shared.bucket(index).write();
            match bucket.get(&identifier).and_then(Weak::upgrade) {
                Some(existing) => (Err(existing), None),
                None => {
                    let entry = Arc::new(Entry {
                        identifier: identifier.clone(),
                        bucket: index,
                        payload: payload.take(),
                        destructor: Mutex::new(destructor.take()),
                        size_hint,
                        category,
                        tracked,
                        shared: self.shared.clone(),
                    });
                    let replaced = bucket.insert(identifier, Arc::downgrade(&entry));
                    (Ok(entry), replaced)
                }
            }
        };
        drop(replaced);

        match outcome {
            Ok(entry) => {
                crate::ac_log!(
                    trace,
                    "registered resource {:?} ({} bytes)",
                    entry.identifier,
                    size_hint
                );
                ResourceHandle { entry }
            }
            Err(existing) => {
                // Lost a creation race: our payload is dropped, never destructed.
                drop(destructor);
                drop(payload);
                if tracked {
                    self.shared.memory.untrack(category, size_hint);
                }
                ResourceHandle { entry: existing }
            }
        }
    }

    /// Take another reference to a live resource.
    pub fn acquire(&self, identifier: &str) -> Option<ResourceHandle> {
        let index = self.shared.bucket_index(identifier);
        let entry = self
            .shared
            .bucket(index)
            .read()
            .get(identifier)
            .and_then(Weak::upgrade)?;
        Some(ResourceHandle { entry })
    }

    /// Give up a reference. The last release runs the destructor.
    pub fn release(&self, handle: ResourceHandle) {
        drop(handle);
    }

    /// Live handle count of the resource `handle` refers to.
    pub fn get_count(&self, handle: &ResourceHandle) -> usize {
        handle.ref_count()
    }

    /// Live handle count for `identifier` (0 if absent or dying).
    pub fn count_of(&self, identifier: &str) -> usize {
        let index = self.shared.bucket_index(identifier);
        self.shared
            .bucket(index)
            .read()
            .get(identifier)
            .map_or(0, Weak::strong_count)
    }

    /// Whether `identifier` has at least one live handle.
    pub fn exists(&self, identifier: &str) -> bool {
        self.count_of(identifier) > 0
    }

    /// Number of live resources.
    pub fn total_resources(&self) -> usize {
        self.shared
            .buckets
            .iter()
            .map(|bucket| {
                bucket
                    .read()
                    .values()
                    .filter(|weak| weak.strong_count() > 0)
                    .count()
            })
            .sum()
    }

    /// Identifiers of all live resources, in no particular order.
    pub fn identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        for bucket in &self.shared.buckets {
            let bucket = bucket.read();
            out.extend(
                bucket
                    .iter()
                    .filter(|(_, weak)| weak.strong_count() > 0)
                    .map(|(id, _)| id.clone()),
            );
        }
        out
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.shared.buckets.len()
    }

    /// Category size hints are accounted to.
    pub fn category(&self) -> AllocCategory {
        self.shared.category
    }

    /// Report identifiers that are still referenced. Nothing is released.
    pub fn shutdown(&self) -> Vec<String> {
        let mut live = Vec::new();
        for bucket in &self.shared.buckets {
            let bucket = bucket.read();
            for (id, weak) in bucket.iter() {
                let refs = weak.strong_count();
                if refs > 0 {
                    crate::ac_emit_ctx!(AC101, "identifier={:?}, refs={}", id, refs);
                    live.push(id.clone());
                }
            }
        }
        live
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("buckets", &self.bucket_count())
            .field("resources", &self.total_resources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::state::ResourceState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(RegistryConfig::default(), MemorySystem::default())
    }

    fn counting_destructor(counter: &Arc<AtomicUsize>) -> impl FnOnce(u32) + Send + 'static {
        let counter = counter.clone();
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_create_acquire_release() {
        let registry = registry();
        let destroyed = Arc::new(AtomicUsize::new(0));

        let a = registry.create("tex1", 7u32, 0, counting_destructor(&destroyed));
        let b = registry.acquire("tex1").unwrap();
        let c = b.clone();
        assert_eq!(registry.get_count(&a), 3);
        assert_eq!(c.payload::<u32>(), Some(&7));

        registry.release(a);
        registry.release(b);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(registry.exists("tex1"));

        registry.release(c);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!registry.exists("tex1"));
        assert!(registry.acquire("tex1").is_none());
        assert_eq!(registry.total_resources(), 0);
    }

    #[test]
    fn test_create_existing_acts_as_acquire() {
        let registry = registry();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = registry.create("mesh", 1u32, 0, counting_destructor(&first));
        let b = registry.create("mesh", 2u32, 0, counting_destructor(&second));

        assert!(a.ptr_eq(&b));
        assert_eq!(b.payload::<u32>(), Some(&1));
        assert_eq!(registry.count_of("mesh"), 2);

        drop(a);
        drop(b);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recreate_after_release() {
        let registry = registry();
        let handle = registry.create("x", 1u32, 0, |_| {});
        drop(handle);

        let handle = registry.create("x", 2u32, 0, |_| {});
        assert_eq!(handle.payload::<u32>(), Some(&2));
        assert_eq!(handle.ref_count(), 1);
    }

    #[test]
    fn test_size_hint_accounting() {
        let memory = MemorySystem::default();
        let registry = ResourceRegistry::new(
            RegistryConfig::default().with_category(AllocCategory::Textures),
            memory.clone(),
        );

        let handle = registry.create("big", (), 4096, |_| {});
        assert_eq!(memory.category_stats(AllocCategory::Textures).current_usage, 4096);
        assert_eq!(handle.category(), AllocCategory::Textures);

        drop(handle);
        let stats = memory.category_stats(AllocCategory::Textures);
        assert_eq!(stats.current_usage, 0);
        assert_eq!(stats.free_count, 1);
    }

    #[test]
    fn test_identifiers_and_buckets() {
        let registry = ResourceRegistry::new(
            RegistryConfig::default().with_bucket_count(4),
            MemorySystem::default(),
        );
        assert_eq!(registry.bucket_count(), 4);

        let handles: Vec<_> = (0..20)
            .map(|i| registry.create(format!("res{}", i), i, 0, |_| {}))
            .collect();
        let mut ids = registry.identifiers();
        ids.sort();
        assert_eq!(ids.len(), 20);
        assert_eq!(registry.total_resources(), 20);

        assert_eq!(registry.shutdown().len(), 20);
        drop(handles);
        assert!(registry.shutdown().is_empty());
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let registry = registry();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let root = registry.create("shared", 0u32, 0, counting_destructor(&destroyed));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let h = registry.acquire("shared").unwrap();
                        let h2 = h.clone();
                        drop(h);
                        drop(h2);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(root.ref_count(), 1);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        drop(root);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_racing_create_and_release() {
        let registry = registry();
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let created = created.clone();
                let destroyed = destroyed.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        created.fetch_add(1, Ordering::SeqCst);
                        let handle = registry.create("churn", 0u32, 0, counting_destructor(&destroyed));
                        drop(handle);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // Every entry that became live was destroyed once; losers never were.
        assert!(!registry.exists("churn"));
        assert!(destroyed.load(Ordering::SeqCst) <= created.load(Ordering::SeqCst));
        assert!(destroyed.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_destruction_walks_tracker() {
        let tracker = Arc::new(StateTracker::new());
        let registry = ResourceRegistry::with_tracker(
            RegistryConfig::default(),
            MemorySystem::default(),
            tracker.clone(),
        );
        let me = thread::current().id();

        tracker.try_acquire_loading("tex", me);
        let handle = registry.create("tex", 0u32, 0, {
            let tracker = tracker.clone();
            move |_| assert_eq!(tracker.get("tex"), ResourceState::Unloading)
        });
        tracker.set("tex", ResourceState::Loaded, me);

        drop(handle);
        assert_eq!(tracker.get("tex"), ResourceState::Unloaded);
    }

    #[test]
    fn test_destruction_forgets_tracker_slot() {
        let tracker = Arc::new(StateTracker::new());
        let registry = ResourceRegistry::with_tracker(
            RegistryConfig::default(),
            MemorySystem::default(),
            tracker.clone(),
        );
        let me = thread::current().id();

        for i in 0..500 {
            let id = format!("stream/chunk{}", i);
            assert!(tracker.try_acquire_loading(&id, me));
            let handle = registry.create(id.as_str(), i, 16, |_| {});
            assert!(tracker.set(&id, ResourceState::Loaded, me));
            drop(handle);
        }

        assert_eq!(registry.total_resources(), 0);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_failed_state_survives_destruction() {
        let tracker = Arc::new(StateTracker::new());
        let registry = ResourceRegistry::with_tracker(
            RegistryConfig::default(),
            MemorySystem::default(),
            tracker.clone(),
        );
        let me = thread::current().id();

        // An identifier that never reached the registry keeps its Error slot.
        tracker.try_acquire_loading("broken", me);
        tracker.set("broken", ResourceState::Error, me);

        let handle = registry.create("fine", 1u8, 1, |_| {});
        drop(handle);

        assert_eq!(tracker.get("broken"), ResourceState::Error);
        assert_eq!(tracker.tracked_count(), 1);
    }
}
