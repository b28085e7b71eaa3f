//! Allocation backends.
//!
//! This module contains the raw allocator implementations.
//! **These are the only modules that should contain `unsafe` code.**

pub(crate) mod heap;
pub mod linear;
