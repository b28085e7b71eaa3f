//! Debug helpers for catching use-after-free.
//!
//! Active when `AllocConfig::debug_mode` is set, which defaults to on with
//! the `debug` feature.

pub(crate) mod poison;
