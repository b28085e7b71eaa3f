//! Memory statistics snapshots.

use crate::api::category::AllocCategory;
use crate::util::size::format_bytes;

/// Usage counters for one category (or the aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Total bytes ever allocated.
    pub total_allocated: u64,

    /// Bytes currently allocated.
    pub current_usage: usize,

    /// Peak bytes allocated (high water mark).
    pub peak_usage: usize,

    /// Number of allocations performed.
    pub allocation_count: u64,

    /// Number of frees performed.
    pub free_count: u64,
}

impl CategoryStats {
    /// Blocks that are currently live.
    pub fn active_allocations(&self) -> u64 {
        self.allocation_count.saturating_sub(self.free_count)
    }

    /// Whether this category still holds memory.
    pub fn is_leaking(&self) -> bool {
        self.current_usage > 0 || self.active_allocations() > 0
    }
}

/// Snapshot of every category plus the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Per-category counters, indexed by [`AllocCategory::index`].
    pub categories: [CategoryStats; AllocCategory::COUNT],

    /// Aggregate over all categories.
    ///
    /// `peak_usage` here is the process-wide high water mark, not the sum of
    /// per-category peaks.
    pub total: CategoryStats,
}

impl MemoryStats {
    /// Counters for one category.
    pub fn category(&self, category: AllocCategory) -> &CategoryStats {
        &self.categories[category.index()]
    }

    /// Categories that still hold memory, with their counters.
    pub fn leaking_categories(&self) -> Vec<(AllocCategory, CategoryStats)> {
        AllocCategory::ALL
            .iter()
            .map(|&c| (c, *self.category(c)))
            .filter(|(_, s)| s.is_leaking())
            .collect()
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Memory Statistics:")?;
        writeln!(f, "  Current:      {}", format_bytes(self.total.current_usage))?;
        writeln!(f, "  Peak:         {}", format_bytes(self.total.peak_usage))?;
        writeln!(f, "  Allocations:  {}", self.total.allocation_count)?;
        writeln!(f, "  Frees:        {}", self.total.free_count)?;
        writeln!(f, "  Active:       {}", self.total.active_allocations())?;
        for category in AllocCategory::ALL {
            let stats = self.category(category);
            if stats.allocation_count == 0 {
                continue;
            }
            writeln!(
                f,
                "  {:<12}  {} current, {} peak, {} live",
                category.name(),
                format_bytes(stats.current_usage),
                format_bytes(stats.peak_usage),
                stats.active_allocations()
            )?;
        }
        Ok(())
    }
}

/// A category that still held memory when the allocator was shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakReport {
    /// The leaking category.
    pub category: AllocCategory,
    /// Bytes still allocated.
    pub bytes: usize,
    /// Blocks still live.
    pub blocks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaking_categories() {
        let mut stats = MemoryStats::default();
        stats.categories[AllocCategory::Textures.index()] = CategoryStats {
            total_allocated: 64,
            current_usage: 64,
            peak_usage: 64,
            allocation_count: 2,
            free_count: 1,
        };

        let leaking = stats.leaking_categories();
        assert_eq!(leaking.len(), 1);
        assert_eq!(leaking[0].0, AllocCategory::Textures);
        assert_eq!(leaking[0].1.active_allocations(), 1);
    }

    #[test]
    fn test_display_skips_unused_categories() {
        let mut stats = MemoryStats::default();
        stats.categories[AllocCategory::Audio.index()].allocation_count = 1;
        let text = stats.to_string();
        assert!(text.contains("audio"));
        assert!(!text.contains("renderer"));
    }
}
