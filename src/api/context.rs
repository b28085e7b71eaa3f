//! The explicitly constructed owner of every shared component.

use std::sync::Arc;

use crate::api::config::{CoreConfig, LoaderConfig};
use crate::api::memory::MemorySystem;
use crate::api::stats::LeakReport;
use crate::loader::{AsyncLoader, LoaderError};
use crate::resource::registry::ResourceRegistry;
use crate::resource::state::StateTracker;

/// Leaks found by [`AssetContext::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Identifiers still referenced by a handle
    pub live_resources: Vec<String>,
    /// Categories still holding memory
    pub leaks: Vec<LeakReport>,
}

impl ShutdownReport {
    /// Nothing was left behind.
    pub fn is_clean(&self) -> bool {
        self.live_resources.is_empty() && self.leaks.is_empty()
    }
}

/// Allocator, registry and state tracker, wired together.
///
/// Cheap to clone (internally uses `Arc`) and thread-safe. Create one at
/// startup and pass it to whatever needs it.
///
/// # Example
///
/// ```rust
/// use assetcore::{AssetContext, CoreConfig, ResourceState};
///
/// let ctx = AssetContext::new(CoreConfig::default());
/// let me = std::thread::current().id();
///
/// assert!(ctx.tracker().try_acquire_loading("tex1", me));
/// let handle = ctx.registry().create("tex1", [0u8; 4], 4, |_| {});
/// ctx.tracker().set("tex1", ResourceState::Loaded, me);
///
/// drop(handle);
/// assert_eq!(ctx.tracker().get("tex1"), ResourceState::Unloaded);
/// assert!(ctx.shutdown().is_clean());
/// ```
#[derive(Clone)]
pub struct AssetContext {
    memory: MemorySystem,
    registry: ResourceRegistry,
    tracker: Arc<StateTracker>,
    config: Arc<CoreConfig>,
}

impl AssetContext {
    /// Build every component from `config`.
    pub fn new(config: CoreConfig) -> Self {
        crate::diagnostics::init_from_env();

        let memory = MemorySystem::new(config.alloc.clone());
        let tracker = Arc::new(StateTracker::new());
        let registry =
            ResourceRegistry::with_tracker(config.registry.clone(), memory.clone(), tracker.clone());

        crate::ac_log!(
            debug,
            "asset context created ({} registry buckets, memory limit {})",
            registry.bucket_count(),
            config.alloc.memory_limit
        );

        Self {
            memory,
            registry,
            tracker,
            config: Arc::new(config),
        }
    }

    /// Build with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CoreConfig::default())
    }

    /// The configuration the context was built from.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The allocator layer.
    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    /// The resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The state tracker.
    pub fn tracker(&self) -> &Arc<StateTracker> {
        &self.tracker
    }

    /// Start a loader with the context's loader configuration. The calling
    /// thread becomes its owning thread.
    pub fn spawn_loader(&self) -> Result<AsyncLoader, LoaderError> {
        AsyncLoader::new(self, self.config.loader.clone())
    }

    /// Start a loader with an explicit configuration.
    pub fn spawn_loader_with(&self, config: LoaderConfig) -> Result<AsyncLoader, LoaderError> {
        AsyncLoader::new(self, config)
    }

    /// Report resources and memory still held. Nothing is released.
    pub fn shutdown(&self) -> ShutdownReport {
        let report = ShutdownReport {
            live_resources: self.registry.shutdown(),
            leaks: self.memory.shutdown(),
        };
        if report.is_clean() {
            crate::ac_log!(info, "asset context shut down clean");
        } else {
            crate::ac_log!(
                warn,
                "asset context shut down with {} live resources and {} leaking categories",
                report.live_resources.len(),
                report.leaks.len()
            );
        }
        report
    }
}

impl Default for AssetContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for AssetContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetContext")
            .field("memory", &self.memory)
            .field("registry", &self.registry)
            .field("tracker", &self.tracker)
            .finish()
    }
}
