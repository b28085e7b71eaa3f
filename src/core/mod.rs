//! Shared allocator state and accounting.

pub(crate) mod global;
pub(crate) mod tracker;
