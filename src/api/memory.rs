//! The category-tagged allocator.

use std::sync::Arc;

use crate::allocators::heap::DEFAULT_ALIGN;
use crate::allocators::linear::LinearArena;
use crate::api::category::AllocCategory;
use crate::api::config::AllocConfig;
use crate::api::stats::{CategoryStats, LeakReport, MemoryStats};
use crate::core::global::MemoryState;

/// Category-tagged allocator with per-category usage statistics.
///
/// Cheap to clone (internally uses `Arc`) and thread-safe. Every block
/// remembers its category, size and alignment in a small header, so `free`
/// only needs the pointer.
///
/// # Example
///
/// ```rust
/// use assetcore::{AllocCategory, AllocConfig, MemorySystem};
///
/// let memory = MemorySystem::new(AllocConfig::default());
/// let ptr = memory.alloc(AllocCategory::Textures, 256, 16);
/// assert!(!ptr.is_null());
/// unsafe { memory.free(AllocCategory::Textures, ptr) };
/// assert_eq!(memory.category_stats(AllocCategory::Textures).current_usage, 0);
/// ```
#[derive(Clone)]
pub struct MemorySystem {
    inner: Arc<MemoryState>,
}

impl MemorySystem {
    /// Create a new allocator with the given configuration.
    pub fn new(config: AllocConfig) -> Self {
        Self {
            inner: Arc::new(MemoryState::new(config)),
        }
    }

    /// Create an allocator with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(AllocConfig::default())
    }

    /// Get the configuration.
    pub fn config(&self) -> &AllocConfig {
        self.inner.config()
    }

    /// Allocate `size` bytes aligned to `align` in `category`.
    ///
    /// Returns null for a zero size, a non power-of-two alignment, when the
    /// memory limit would be exceeded, or when the system is out of memory.
    pub fn alloc(&self, category: AllocCategory, size: usize, align: usize) -> *mut u8 {
        self.inner.alloc(category, size, align)
    }

    /// Allocate with the default alignment.
    pub fn alloc_default(&self, category: AllocCategory, size: usize) -> *mut u8 {
        self.inner.alloc(category, size, DEFAULT_ALIGN)
    }

    /// Resize a block, preserving its contents and alignment.
    ///
    /// A null `ptr` allocates, a zero `new_size` frees and returns null. On
    /// failure null is returned and the original block stays valid.
    /// Allocation and free counts do not change.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live block from this allocator.
    pub unsafe fn realloc(
        &self,
        category: AllocCategory,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
    ) -> *mut u8 {
        self.inner.realloc(category, ptr, old_size, new_size)
    }

    /// Free a block. Null is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live block from this allocator.
    pub unsafe fn free(&self, category: AllocCategory, ptr: *mut u8) {
        self.inner.free(category, ptr)
    }

    /// Account `size` bytes owned elsewhere to `category`.
    ///
    /// Returns false (and records nothing) if the memory limit would be
    /// exceeded.
    pub fn track(&self, category: AllocCategory, size: usize) -> bool {
        self.inner.track(category, size)
    }

    /// Stop accounting bytes previously passed to [`track`](Self::track).
    pub fn untrack(&self, category: AllocCategory, size: usize) {
        self.inner.untrack(category, size)
    }

    /// Create a linear arena whose backing block is one tracked allocation.
    pub fn linear(&self, category: AllocCategory, capacity: usize) -> Option<LinearArena> {
        LinearArena::new(self.inner.clone(), category, capacity)
    }

    /// Snapshot of all categories.
    pub fn stats(&self) -> MemoryStats {
        self.inner.stats()
    }

    /// Snapshot of one category.
    pub fn category_stats(&self, category: AllocCategory) -> CategoryStats {
        self.inner.tracker().category(category)
    }

    /// Report categories that still hold memory.
    ///
    /// Emits one leak diagnostic per category. Nothing is freed.
    pub fn shutdown(&self) -> Vec<LeakReport> {
        let leaks = self.inner.leak_report();
        if leaks.is_empty() {
            crate::ac_log!(debug, "allocator shutdown clean");
        }
        leaks
    }
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for MemorySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySystem")
            .field("config", self.config())
            .field("current_usage", &self.inner.tracker().current_usage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_free_counts() {
        let memory = MemorySystem::with_defaults();

        let a = memory.alloc(AllocCategory::Audio, 100, 8);
        let b = memory.alloc(AllocCategory::Audio, 50, 8);
        assert!(!a.is_null() && !b.is_null());

        let stats = memory.category_stats(AllocCategory::Audio);
        assert_eq!(stats.current_usage, 150);
        assert_eq!(stats.active_allocations(), 2);

        unsafe {
            memory.free(AllocCategory::Audio, a);
            memory.free(AllocCategory::Audio, b);
        }

        let stats = memory.category_stats(AllocCategory::Audio);
        assert_eq!(stats.current_usage, 0);
        assert_eq!(stats.peak_usage, 150);
        assert_eq!(stats.total_allocated, 150);
        assert_eq!(stats.active_allocations(), 0);
    }

    #[test]
    fn test_zero_size_and_null_free() {
        let memory = MemorySystem::with_defaults();
        assert!(memory.alloc(AllocCategory::General, 0, 8).is_null());
        unsafe { memory.free(AllocCategory::General, std::ptr::null_mut()) };
        assert_eq!(memory.stats().total.allocation_count, 0);
        assert_eq!(memory.stats().total.free_count, 0);
    }

    #[test]
    fn test_memory_limit() {
        let memory = MemorySystem::new(AllocConfig::default().with_memory_limit(1024));

        let a = memory.alloc(AllocCategory::Textures, 1000, 16);
        assert!(!a.is_null());
        assert!(memory.alloc(AllocCategory::Scene, 100, 16).is_null());
        assert!(!memory.track(AllocCategory::Scene, 100));

        unsafe { memory.free(AllocCategory::Textures, a) };
        assert!(memory.track(AllocCategory::Scene, 100));
        memory.untrack(AllocCategory::Scene, 100);
    }

    #[test]
    fn test_realloc_null_and_zero() {
        let memory = MemorySystem::with_defaults();
        unsafe {
            let p = memory.realloc(AllocCategory::Ui, std::ptr::null_mut(), 0, 32);
            assert!(!p.is_null());
            assert_eq!(p as usize % DEFAULT_ALIGN, 0);
            assert_eq!(memory.category_stats(AllocCategory::Ui).allocation_count, 1);

            assert!(memory.realloc(AllocCategory::Ui, p, 32, 0).is_null());
        }
        let stats = memory.category_stats(AllocCategory::Ui);
        assert_eq!(stats.free_count, 1);
        assert_eq!(stats.current_usage, 0);
    }

    #[test]
    fn test_shutdown_reports_leaks() {
        let memory = MemorySystem::with_defaults();
        let p = memory.alloc(AllocCategory::Renderer, 64, 8);

        let leaks = memory.shutdown();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].category, AllocCategory::Renderer);
        assert_eq!(leaks[0].bytes, 64);
        assert_eq!(leaks[0].blocks, 1);

        unsafe { memory.free(AllocCategory::Renderer, p) };
        assert!(memory.shutdown().is_empty());
    }
}
