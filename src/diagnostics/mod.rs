//! Runtime diagnostics.
//!
//! This module provides:
//! - **Coded diagnostics**: caller-bug and resource-leak reports with stable codes
//! - **Backends**: stderr in debug builds, the `log` crate with the `log` feature
//! - **Sinks**: install a [`DiagnosticSink`] to capture diagnostics (tests, overlays)
//! - **Strict mode**: optional panic-on-error for CI
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                        |
//! |-------|--------------------------------|
//! | AC0xx | Memory / allocator issues      |
//! | AC1xx | Resource registry issues       |
//! | AC2xx | Load-state issues              |
//! | AC3xx | Task loader issues             |
//! | AC9xx | Internal errors                |
//!
//! Programming errors (e.g. leaving `Loading` without owning it) are still
//! reported to the caller through a `false`/`Err` return; the diagnostic is
//! the side channel that tells a developer why.

pub mod context;
pub mod emit;
pub mod kind;
pub mod macros;
pub mod strict;

pub use emit::{
    add_sink, emit, emit_with_context, remove_sink, suppress_diagnostics, CollectingSink,
    DiagnosticSink,
};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{
    AC001, AC002, AC003, AC004, AC005, AC101, AC201, AC202, AC301, AC302, AC303, AC304, AC901,
};
