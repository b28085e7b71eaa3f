//! Configuration for the allocator, registry and loader.

use crate::api::category::AllocCategory;
use crate::util::size::{gb, mb};

/// Upper bound on loader worker threads.
pub const MAX_WORKERS: usize = 256;

/// Memory cap of the high-throughput preset, sized to the address space.
#[cfg(target_pointer_width = "64")]
pub const HIGH_THROUGHPUT_MEMORY_LIMIT: usize = gb(8);
/// Memory cap of the high-throughput preset, sized to the address space.
#[cfg(not(target_pointer_width = "64"))]
pub const HIGH_THROUGHPUT_MEMORY_LIMIT: usize = gb(2);

/// Configuration for the allocator layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocConfig {
    /// Total bytes that may be live across all categories (0 = unlimited)
    pub memory_limit: usize,

    /// Enable debug features (memory poisoning)
    pub debug_mode: bool,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            memory_limit: 0,
            debug_mode: cfg!(feature = "debug"),
        }
    }
}

impl AllocConfig {
    /// Builder pattern: set the global memory limit.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Builder pattern: enable debug mode.
    pub fn with_debug(mut self, enable: bool) -> Self {
        self.debug_mode = enable;
        self
    }
}

/// Configuration for the resource registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of independently locked buckets (clamped to at least 1)
    pub bucket_count: usize,

    /// Category that resource size hints are accounted to
    pub category: AllocCategory,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bucket_count: 64,
            category: AllocCategory::Assets,
        }
    }
}

impl RegistryConfig {
    /// Builder pattern: set the bucket count.
    pub fn with_bucket_count(mut self, count: usize) -> Self {
        self.bucket_count = count;
        self
    }

    /// Builder pattern: set the accounting category.
    pub fn with_category(mut self, category: AllocCategory) -> Self {
        self.category = category;
        self
    }
}

/// Configuration for an `AsyncLoader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Worker threads to spawn (0 = one per logical CPU)
    pub worker_count: usize,

    /// Maximum queued tasks before submission fails (0 = unbounded)
    pub max_queue_size: usize,

    /// Serve higher priorities first; otherwise one FIFO lane
    pub priority_enabled: bool,

    /// Prefix for worker thread names
    pub thread_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_queue_size: 0,
            priority_enabled: true,
            thread_name: "assetcore-loader".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Builder pattern: set the worker count.
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Builder pattern: bound the queue.
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Builder pattern: enable or disable priority lanes.
    pub fn with_priority(mut self, enable: bool) -> Self {
        self.priority_enabled = enable;
        self
    }

    /// Builder pattern: set the worker thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Worker count after resolving 0 to the CPU count.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Check the configuration before spawning threads.
    pub fn validate(&self) -> Result<(), String> {
        if self.resolved_worker_count() > MAX_WORKERS {
            return Err(format!(
                "worker_count {} exceeds the maximum of {}",
                self.worker_count, MAX_WORKERS
            ));
        }
        if self.thread_name.contains('\0') {
            return Err("thread_name contains a NUL byte".to_string());
        }
        Ok(())
    }
}

/// Everything needed to build an `AssetContext`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreConfig {
    /// Allocator layer settings
    pub alloc: AllocConfig,

    /// Resource registry settings
    pub registry: RegistryConfig,

    /// Default settings for loaders spawned from the context
    pub loader: LoaderConfig,
}

impl CoreConfig {
    /// Small footprint: one worker, few buckets, 256 MB cap.
    pub fn minimal() -> Self {
        Self {
            alloc: AllocConfig::default().with_memory_limit(mb(256)),
            registry: RegistryConfig::default().with_bucket_count(8),
            loader: LoaderConfig::default().with_workers(1).with_max_queue_size(256),
        }
    }

    /// Many buckets and an unbounded queue for large streaming workloads.
    ///
    /// Caps memory at 8 GB on 64-bit targets and 2 GB elsewhere.
    pub fn high_throughput() -> Self {
        Self {
            alloc: AllocConfig::default().with_memory_limit(HIGH_THROUGHPUT_MEMORY_LIMIT),
            registry: RegistryConfig::default().with_bucket_count(256),
            loader: LoaderConfig::default(),
        }
    }

    /// Builder pattern: replace the allocator settings.
    pub fn with_alloc(mut self, alloc: AllocConfig) -> Self {
        self.alloc = alloc;
        self
    }

    /// Builder pattern: replace the registry settings.
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Builder pattern: replace the loader settings.
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.alloc.memory_limit, 0);
        assert_eq!(config.registry.bucket_count, 64);
        assert_eq!(config.registry.category, AllocCategory::Assets);
        assert!(config.loader.priority_enabled);
        assert!(config.loader.resolved_worker_count() >= 1);
    }

    #[test]
    fn test_loader_validation() {
        assert!(LoaderConfig::default().with_workers(4).validate().is_ok());
        assert!(LoaderConfig::default()
            .with_workers(MAX_WORKERS + 1)
            .validate()
            .is_err());
        assert!(LoaderConfig::default()
            .with_thread_name("bad\0name")
            .validate()
            .is_err());
    }

    #[test]
    fn test_presets() {
        let minimal = CoreConfig::minimal();
        assert_eq!(minimal.loader.resolved_worker_count(), 1);
        assert_eq!(minimal.alloc.memory_limit, mb(256));
        assert!(CoreConfig::high_throughput().registry.bucket_count > minimal.registry.bucket_count);
    }

    #[test]
    fn test_high_throughput_limit_fits_address_space() {
        let limit = CoreConfig::high_throughput().alloc.memory_limit;
        assert_eq!(limit, HIGH_THROUGHPUT_MEMORY_LIMIT);
        assert!(limit > mb(256));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(limit, gb(8));
        #[cfg(target_pointer_width = "32")]
        assert_eq!(limit, gb(2));
    }
}
