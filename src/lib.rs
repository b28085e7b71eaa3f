//! # assetcore
//!
//! Resource lifecycle and asynchronous loading for real-time applications.
//!
//! ## Features
//!
//! - Category-tagged allocation with per-category usage statistics
//! - Linear arenas for scratch memory
//! - Reference-counted resource registry with destructors
//! - Per-identifier load state machine with exclusive loading rights
//! - Worker pool with priority lanes, cancellation and main-thread callbacks
//! - Coded diagnostics, optional `log` integration and strict mode for CI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assetcore::{
//!     on_complete, AssetContext, AssetKind, CoreConfig, DecodedAsset, LoadError, TaskPriority,
//! };
//!
//! let ctx = AssetContext::new(CoreConfig::default());
//! let loader = ctx.spawn_loader().unwrap();
//!
//! loader.set_decoder(AssetKind::Texture, |path: &str| -> Result<DecodedAsset, LoadError> {
//!     let bytes = std::fs::read(path)?;
//!     let size = bytes.len();
//!     Ok(DecodedAsset::new(bytes, size))
//! });
//!
//! let task = loader
//!     .submit_texture_load(
//!         "textures/grass.png",
//!         TaskPriority::High,
//!         on_complete(|task| println!("{} finished: {:?}", task.label(), task.status())),
//!     )
//!     .unwrap();
//!
//! // Main loop
//! loader.process_completed(0);
//! ```

pub mod api;
pub mod diagnostics;
pub mod loader;
pub mod resource;

mod allocators;
mod core;
mod debug;
mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use api::category::AllocCategory;
pub use api::config::{AllocConfig, CoreConfig, LoaderConfig, RegistryConfig};
pub use api::context::{AssetContext, ShutdownReport};
pub use api::memory::MemorySystem;
pub use api::stats::{CategoryStats, LeakReport, MemoryStats};

pub use allocators::linear::LinearArena;

pub use resource::{Destructor, Payload, ResourceHandle, ResourceRegistry, ResourceState, StateTracker};

pub use loader::{
    on_complete, AssetDecoder, AssetKind, AsyncLoader, DecodedAsset, LoadError, LoaderError,
    LoaderStats, ShutdownMode, SubmitError, Task, TaskCallback, TaskHandle, TaskKind,
    TaskPriority, TaskResult, TaskStatus,
};

// Diagnostics - core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, CollectingSink};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{
    AC001, AC002, AC003, AC004, AC005, AC101, AC201, AC202, AC301, AC302, AC303, AC304, AC901,
};

pub use util::size::{format_bytes, gb, kb, mb};
