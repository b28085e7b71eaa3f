//! Shared allocator state.

use crate::allocators::heap::{HeapFailure, SystemHeap, DEFAULT_ALIGN};
use crate::api::category::AllocCategory;
use crate::api::config::AllocConfig;
use crate::api::stats::{LeakReport, MemoryStats};
use crate::core::tracker::CategoryTracker;

/// State shared by every clone of a `MemorySystem` and by the arenas and
/// registries built from it.
///
/// This is wrapped in an `Arc` by `MemorySystem` for thread-safe sharing.
pub struct MemoryState {
    /// Configuration
    config: AllocConfig,

    /// System heap for tracked blocks
    heap: SystemHeap,

    /// Per-category statistics
    tracker: CategoryTracker,
}

impl MemoryState {
    /// Create new state with the given configuration.
    pub fn new(config: AllocConfig) -> Self {
        Self {
            tracker: CategoryTracker::new(config.memory_limit),
            heap: SystemHeap::new(config.debug_mode),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AllocConfig {
        &self.config
    }

    /// Allocate a tracked block. Null on failure.
    pub fn alloc(&self, category: AllocCategory, size: usize, align: usize) -> *mut u8 {
        match self.heap.alloc(&self.tracker, category, size, align) {
            Ok(ptr) => ptr,
            Err(failure) => {
                self.report_failure(category, size, failure);
                std::ptr::null_mut()
            }
        }
    }

    /// Free a tracked block.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live block from [`alloc`](Self::alloc) or
    /// [`realloc`](Self::realloc).
    pub unsafe fn free(&self, category: AllocCategory, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let Some((size, recorded)) = self.heap.block_info(ptr) else {
            crate::ac_emit_ctx!(AC901, "free of unrecognised pointer {:p}", ptr);
            return;
        };
        if recorded != category {
            crate::ac_emit_ctx!(
                AC002,
                "freed as {}, allocated as {}, {} bytes",
                category,
                recorded,
                size
            );
        }
        self.heap.free(&self.tracker, ptr);
    }

    /// Resize a tracked block. See `MemorySystem::realloc` for the contract.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live block from this state.
    pub unsafe fn realloc(
        &self,
        category: AllocCategory,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
    ) -> *mut u8 {
        if ptr.is_null() {
            return self.alloc(category, new_size, DEFAULT_ALIGN);
        }
        if new_size == 0 {
            self.free(category, ptr);
            return std::ptr::null_mut();
        }

        let Some((recorded_size, recorded)) = self.heap.block_info(ptr) else {
            crate::ac_emit_ctx!(AC901, "realloc of unrecognised pointer {:p}", ptr);
            return std::ptr::null_mut();
        };
        if recorded != category {
            crate::ac_emit_ctx!(AC002, "realloc as {}, allocated as {}", category, recorded);
        }
        if recorded_size != old_size {
            crate::ac_emit_ctx!(
                AC005,
                "old_size={}, recorded={}, category={}",
                old_size,
                recorded_size,
                recorded
            );
        }

        match self.heap.realloc(&self.tracker, ptr, new_size) {
            Ok(ptr) => ptr,
            Err(failure) => {
                self.report_failure(recorded, new_size, failure);
                std::ptr::null_mut()
            }
        }
    }

    /// Account memory owned elsewhere. Returns false if over the limit.
    pub fn track(&self, category: AllocCategory, size: usize) -> bool {
        let accepted = self.tracker.try_record_alloc(category, size);
        if !accepted {
            self.report_failure(category, size, HeapFailure::LimitExceeded);
        }
        accepted
    }

    /// Stop accounting memory previously passed to [`track`](Self::track).
    pub fn untrack(&self, category: AllocCategory, size: usize) {
        self.tracker.record_free(category, size);
    }

    /// Get current statistics.
    pub fn stats(&self) -> MemoryStats {
        self.tracker.snapshot()
    }

    /// Get the usage tracker.
    pub fn tracker(&self) -> &CategoryTracker {
        &self.tracker
    }

    /// Report every category that still holds memory.
    pub fn leak_report(&self) -> Vec<LeakReport> {
        let leaks: Vec<LeakReport> = self
            .stats()
            .leaking_categories()
            .into_iter()
            .map(|(category, stats)| LeakReport {
                category,
                bytes: stats.current_usage,
                blocks: stats.active_allocations(),
            })
            .collect();

        for leak in &leaks {
            crate::ac_emit_ctx!(
                AC001,
                "category={}, {} bytes in {} blocks",
                leak.category,
                leak.bytes,
                leak.blocks
            );
        }
        leaks
    }

    fn report_failure(&self, category: AllocCategory, size: usize, failure: HeapFailure) {
        match failure {
            HeapFailure::InvalidRequest => {
                crate::ac_log!(debug, "rejected {} byte request in {}", size, category);
            }
            HeapFailure::LimitExceeded | HeapFailure::OutOfMemory => {
                crate::ac_emit_ctx!(
                    AC003,
                    "category={}, size={}, reason={:?}, in use={}, limit={}",
                    category,
                    size,
                    failure,
                    self.tracker.current_usage(),
                    self.tracker.memory_limit()
                );
            }
        }
    }
}
