//! Linear arena - bump allocator for scratch memory.
//!
//! The backing block is a single tracked allocation; allocations inside the
//! arena are not individually tracked and cannot be individually freed.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::allocators::heap::DEFAULT_ALIGN;
use crate::api::category::AllocCategory;
use crate::core::global::MemoryState;
use crate::util::layout::align_up;

/// A bump allocator carved out of one tracked block.
///
/// Allocations are extremely fast (just pointer increment).
/// All allocations are invalidated on `reset()`.
pub struct LinearArena {
    /// Base pointer of the arena
    base: NonNull<u8>,

    /// Current allocation head (offset from base)
    head: usize,

    /// Total capacity in bytes
    capacity: usize,

    /// Category the backing block is accounted to
    category: AllocCategory,

    /// Owner of the backing block
    memory: Arc<MemoryState>,
}

// SAFETY: the arena exclusively owns its backing block; `&mut self` is
// required for every mutation.
unsafe impl Send for LinearArena {}

impl LinearArena {
    /// Allocate the backing block. Returns `None` if it cannot be allocated.
    pub(crate) fn new(
        memory: Arc<MemoryState>,
        category: AllocCategory,
        capacity: usize,
    ) -> Option<Self> {
        let base = NonNull::new(memory.alloc(category, capacity, DEFAULT_ALIGN))?;
        Some(Self {
            base,
            head: 0,
            capacity,
            category,
            memory,
        })
    }

    /// Allocate memory for a value of type T.
    ///
    /// Returns null if the arena is exhausted.
    pub fn alloc<T>(&mut self) -> *mut T {
        self.alloc_layout(Layout::new::<T>()) as *mut T
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// Returns null if the arena is exhausted or `align` is not a power of two.
    pub fn alloc_bytes(&mut self, size: usize, align: usize) -> *mut u8 {
        match Layout::from_size_align(size, align) {
            Ok(layout) => self.alloc_layout(layout),
            Err(_) => std::ptr::null_mut(),
        }
    }

    /// Allocate memory with a specific layout.
    ///
    /// Returns null if the arena is exhausted.
    pub fn alloc_layout(&mut self, layout: Layout) -> *mut u8 {
        let base_addr = self.base.as_ptr() as usize;

        // Align the absolute address, the block is only DEFAULT_ALIGN aligned
        let aligned = align_up(base_addr + self.head, layout.align()) - base_addr;

        let end = match aligned.checked_add(layout.size()) {
            Some(end) if end <= self.capacity => end,
            _ => {
                crate::ac_emit_ctx!(
                    AC004,
                    "category={}, requested={}, remaining={}",
                    self.category,
                    layout.size(),
                    self.remaining()
                );
                return std::ptr::null_mut();
            }
        };

        self.head = end;

        // SAFETY: We've verified the allocation fits within our arena
        unsafe { self.base.as_ptr().add(aligned) }
    }

    /// Get current head position (for mark/restore).
    pub fn mark(&self) -> usize {
        self.head
    }

    /// Reset the arena, invalidating all allocations.
    pub fn reset(&mut self) {
        self.head = 0;

        if self.memory.config().debug_mode {
            // SAFETY: the whole backing block is ours
            unsafe {
                crate::debug::poison::poison_freed(self.base.as_ptr(), self.capacity);
            }
        }
    }

    /// Reset to a previously saved mark, invalidating everything after it.
    pub fn reset_to(&mut self, mark: usize) {
        debug_assert!(mark <= self.head, "Cannot reset forward");
        self.head = mark.min(self.head);
    }

    /// Get remaining capacity.
    pub fn remaining(&self) -> usize {
        self.capacity - self.head
    }

    /// Get total capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get bytes currently allocated.
    pub fn allocated(&self) -> usize {
        self.head
    }

    /// Category the backing block is accounted to.
    pub fn category(&self) -> AllocCategory {
        self.category
    }
}

impl Drop for LinearArena {
    fn drop(&mut self) {
        // SAFETY: We allocated this block in `new()` from the same state
        unsafe {
            self.memory.free(self.category, self.base.as_ptr());
        }
    }
}

impl std::fmt::Debug for LinearArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearArena")
            .field("category", &self.category)
            .field("allocated", &self.head)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::AllocConfig;

    fn arena(capacity: usize) -> LinearArena {
        let memory = Arc::new(MemoryState::new(AllocConfig::default()));
        LinearArena::new(memory, AllocCategory::Temporary, capacity).unwrap()
    }

    #[test]
    fn test_basic_allocation() {
        let mut arena = arena(1024);

        let ptr1 = arena.alloc::<u32>();
        assert!(!ptr1.is_null());

        let ptr2 = arena.alloc::<u64>();
        assert!(!ptr2.is_null());
        assert_eq!(ptr2 as usize % std::mem::align_of::<u64>(), 0);

        assert_ne!(ptr1 as *mut u8, ptr2 as *mut u8);
    }

    #[test]
    fn test_reset() {
        let mut arena = arena(1024);

        let ptr1 = arena.alloc::<u32>();
        arena.reset();
        assert_eq!(arena.mark(), 0);

        // New allocation should reuse the same memory
        let ptr2 = arena.alloc::<u32>();
        assert_eq!(ptr1, ptr2);
    }

    #[test]
    fn test_reset_to_mark() {
        let mut arena = arena(256);

        let _keep = arena.alloc_bytes(16, 8);
        let mark = arena.mark();
        let scratch = arena.alloc_bytes(64, 8);
        arena.reset_to(mark);

        assert_eq!(arena.allocated(), 16);
        assert_eq!(arena.alloc_bytes(64, 8), scratch);
    }

    #[test]
    fn test_exhaustion() {
        let mut arena = arena(32);

        let _ = arena.alloc::<[u8; 16]>();
        let _ = arena.alloc::<[u8; 16]>();

        let ptr = arena.alloc::<[u8; 16]>();
        assert!(ptr.is_null());
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_backing_block_is_tracked() {
        let memory = Arc::new(MemoryState::new(AllocConfig::default()));
        {
            let _arena = LinearArena::new(memory.clone(), AllocCategory::Temporary, 4096).unwrap();
            let stats = memory.stats();
            assert_eq!(stats.category(AllocCategory::Temporary).current_usage, 4096);
            assert_eq!(stats.category(AllocCategory::Temporary).allocation_count, 1);
        }
        let stats = memory.stats();
        assert_eq!(stats.category(AllocCategory::Temporary).current_usage, 0);
        assert_eq!(stats.category(AllocCategory::Temporary).free_count, 1);
    }
}
