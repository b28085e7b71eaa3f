//! Reference-counted resource handles.

use std::any::Any;
use std::sync::Arc;

use crate::api::category::AllocCategory;
use crate::resource::registry::RegistryShared;
use crate::sync::mutex::Mutex;

/// Boxed payload stored in the registry.
pub type Payload = Box<dyn Any + Send + Sync>;

/// Destructor invoked exactly once with the payload when the last handle
/// goes away.
pub type Destructor = Box<dyn FnOnce(Payload) + Send>;

/// One live resource. Owned by its handles; the registry only keeps a
/// `Weak` back reference.
pub(crate) struct Entry {
    pub(crate) identifier: String,
    pub(crate) bucket: usize,
    pub(crate) payload: Option<Payload>,
    pub(crate) destructor: Mutex<Option<Destructor>>,
    pub(crate) size_hint: usize,
    pub(crate) category: AllocCategory,
    /// Whether `size_hint` was accepted by the allocator
    pub(crate) tracked: bool,
    pub(crate) shared: Arc<RegistryShared>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        let shared = self.shared.clone();

        // The bucket may already point at a replacement entry.
        let (ours, stale) = {
            let mut bucket = shared.bucket(self.bucket).write();
            let ours = bucket
                .get(&self.identifier)
                .map_or(false, |weak| std::ptr::eq(weak.as_ptr(), self as *const Entry));
            let stale = if ours {
                bucket.remove(&self.identifier)
            } else {
                None
            };
            (ours, stale)
        };
        drop(stale);

        let walked = ours
            && shared
                .tracker
                .as_ref()
                .map_or(false, |tracker| tracker.begin_unload(&self.identifier));

        let destructor = self.destructor.lock().take();
        if let (Some(destructor), Some(payload)) = (destructor, self.payload.take()) {
            destructor(payload);
        }

        if self.tracked {
            shared.memory.untrack(self.category, self.size_hint);
        }

        if walked {
            if let Some(tracker) = &shared.tracker {
                tracker.finish_unload(&self.identifier);
                // Kept while anyone still waits on the slot.
                tracker.forget(&self.identifier);
            }
        }

        crate::ac_log!(trace, "released resource {:?}", self.identifier);
    }
}

/// Shared ownership of a registered resource.
///
/// Cloning acquires another reference and dropping releases one. When the
/// last handle is dropped the destructor runs and the identifier is removed
/// from the registry.
pub struct ResourceHandle {
    pub(crate) entry: Arc<Entry>,
}

impl ResourceHandle {
    /// Identifier the resource is registered under.
    pub fn identifier(&self) -> &str {
        &self.entry.identifier
    }

    /// Current number of live handles.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.entry)
    }

    /// Size hint given at creation.
    pub fn size_hint(&self) -> usize {
        self.entry.size_hint
    }

    /// Category the size hint is accounted to.
    pub fn category(&self) -> AllocCategory {
        self.entry.category
    }

    /// Borrow the payload as `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.entry.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Borrow the payload untyped.
    pub fn payload_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.entry.payload.as_deref()
    }

    /// Whether both handles refer to the same entry.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl Clone for ResourceHandle {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
        }
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("identifier", &self.entry.identifier)
            .field("ref_count", &self.ref_count())
            .field("size_hint", &self.entry.size_hint)
            .finish()
    }
}
