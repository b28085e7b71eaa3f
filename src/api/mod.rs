//! Public API for assetcore.
//!
//! Configuration, the allocator front end, statistics and the context that
//! ties the components together.

pub mod category;
pub mod config;
pub mod context;
pub mod memory;
pub mod stats;
