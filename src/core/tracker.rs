//! Per-category usage accounting shared by every allocation path.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::category::AllocCategory;
use crate::api::stats::{CategoryStats, MemoryStats};
use crate::sync::atomics::{AtomicCounter, AtomicGauge};

/// Atomic counters for a single category.
#[derive(Default)]
struct CategoryCounters {
    total_allocated: AtomicCounter,
    current: AtomicGauge,
    peak: AtomicGauge,
    allocation_count: AtomicCounter,
    free_count: AtomicCounter,
}

impl CategoryCounters {
    fn snapshot(&self) -> CategoryStats {
        CategoryStats {
            total_allocated: self.total_allocated.get(),
            current_usage: self.current.get(),
            peak_usage: self.peak.get(),
            allocation_count: self.allocation_count.get(),
            free_count: self.free_count.get(),
        }
    }
}

/// Process-level usage tracker.
///
/// Each counter is updated with a single atomic operation, so readers never
/// block writers. The global current-usage counter doubles as the memory
/// limit gate: an allocation is only counted if it fits.
pub struct CategoryTracker {
    categories: [CategoryCounters; AllocCategory::COUNT],

    /// Global statistics (atomics)
    current_usage: AtomicUsize,
    peak_usage: AtomicGauge,
    total_allocated: AtomicCounter,
    allocation_count: AtomicCounter,
    free_count: AtomicCounter,

    /// Global memory limit (0 = unlimited)
    memory_limit: usize,
}

impl CategoryTracker {
    /// Create a tracker with the given global limit (0 = unlimited).
    pub fn new(memory_limit: usize) -> Self {
        Self {
            categories: std::array::from_fn(|_| CategoryCounters::default()),
            current_usage: AtomicUsize::new(0),
            peak_usage: AtomicGauge::new(0),
            total_allocated: AtomicCounter::new(0),
            allocation_count: AtomicCounter::new(0),
            free_count: AtomicCounter::new(0),
            memory_limit,
        }
    }

    /// Get the configured limit.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Reserve `size` bytes against the global limit.
    ///
    /// Returns false (and counts nothing) if the limit would be exceeded.
    fn reserve(&self, size: usize) -> bool {
        let limit = self.memory_limit;
        let reserved = self
            .current_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                let next = current.checked_add(size)?;
                (limit == 0 || next <= limit).then_some(next)
            });
        match reserved {
            Ok(previous) => {
                self.peak_usage.update_max(previous + size);
                true
            }
            Err(_) => false,
        }
    }

    fn unreserve(&self, size: usize) {
        let _ = self
            .current_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(size))
            });
    }

    /// Record a new block if it fits under the limit.
    pub fn try_record_alloc(&self, category: AllocCategory, size: usize) -> bool {
        if !self.reserve(size) {
            return false;
        }
        self.total_allocated.add(size as u64);
        self.allocation_count.increment();

        let counters = &self.categories[category.index()];
        counters.total_allocated.add(size as u64);
        counters.allocation_count.increment();
        let current = counters.current.add(size);
        counters.peak.update_max(current);
        true
    }

    /// Undo a successful [`try_record_alloc`](Self::try_record_alloc) whose
    /// backing allocation then failed.
    pub fn rollback_alloc(&self, category: AllocCategory, size: usize) {
        // Counted as a free so that live blocks stay allocation_count - free_count.
        self.record_free(category, size);
    }

    /// Record a block being released.
    pub fn record_free(&self, category: AllocCategory, size: usize) {
        self.unreserve(size);
        self.free_count.increment();

        let counters = &self.categories[category.index()];
        counters.free_count.increment();
        counters.current.sub(size);
    }

    /// Reserve growth for an in-place resize. Shrinking always succeeds.
    pub fn try_reserve_growth(&self, old_size: usize, new_size: usize) -> bool {
        new_size <= old_size || self.reserve(new_size - old_size)
    }

    /// Release a growth reservation after a failed resize.
    pub fn release_growth(&self, old_size: usize, new_size: usize) {
        if new_size > old_size {
            self.unreserve(new_size - old_size);
        }
    }

    /// Account a completed resize. Growth must already be reserved with
    /// [`try_reserve_growth`](Self::try_reserve_growth).
    ///
    /// Allocation and free counts are left untouched: the block stays live.
    pub fn record_resize(&self, category: AllocCategory, old_size: usize, new_size: usize) {
        let counters = &self.categories[category.index()];
        if new_size >= old_size {
            let growth = new_size - old_size;
            self.total_allocated.add(growth as u64);
            counters.total_allocated.add(growth as u64);
            let current = counters.current.add(growth);
            counters.peak.update_max(current);
        } else {
            let shrink = old_size - new_size;
            self.unreserve(shrink);
            counters.current.sub(shrink);
        }
    }

    /// Bytes currently allocated across every category.
    pub fn current_usage(&self) -> usize {
        self.current_usage.load(Ordering::Relaxed)
    }

    /// Get current statistics.
    pub fn snapshot(&self) -> MemoryStats {
        MemoryStats {
            categories: std::array::from_fn(|i| self.categories[i].snapshot()),
            total: CategoryStats {
                total_allocated: self.total_allocated.get(),
                current_usage: self.current_usage.load(Ordering::Relaxed),
                peak_usage: self.peak_usage.get(),
                allocation_count: self.allocation_count.get(),
                free_count: self.free_count.get(),
            },
        }
    }

    /// Get statistics for one category.
    pub fn category(&self, category: AllocCategory) -> CategoryStats {
        self.categories[category.index()].snapshot()
    }
}
