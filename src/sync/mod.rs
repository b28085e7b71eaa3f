//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot locks, plus atomic
//! statistics helpers.

pub(crate) mod atomics;
pub(crate) mod mutex;
