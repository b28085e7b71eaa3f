//! Diagnostic kinds and core types.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - a caller bug that should be fixed.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `AC0xx` - Memory / allocator issues
/// - `AC1xx` - Resource registry issues
/// - `AC2xx` - Load-state issues
/// - `AC3xx` - Task loader issues
/// - `AC9xx` - Internal errors
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "AC001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// Predefined diagnostics (AC0xx - Memory)
// =============================================================================

/// AC001: Category still holds memory at shutdown.
pub const AC001: Diagnostic = Diagnostic::warning(
    "AC001",
    "allocation category still holds memory at shutdown"
).with_note("blocks allocated in this category were never freed")
 .with_help("free every block before calling shutdown(), or check for leaked resource handles");

/// AC002: Block freed under a different category than it was allocated with.
pub const AC002: Diagnostic = Diagnostic::error(
    "AC002",
    "block freed with a category that does not match its allocation"
).with_note("the block is accounted against the category recorded at allocation time")
 .with_help("pass the same AllocCategory to free()/realloc() that was passed to alloc()");

/// AC003: Allocation denied.
pub const AC003: Diagnostic = Diagnostic::warning(
    "AC003",
    "allocation failed, returning null"
).with_note("the request exceeded the configured memory limit or the system allocator failed")
 .with_help("treat a null return as recoverable, or raise memory_limit in AllocConfig");

/// AC004: Linear arena exhausted.
pub const AC004: Diagnostic = Diagnostic::warning(
    "AC004",
    "linear arena exhausted, allocation failed"
).with_help("increase the arena capacity or reset() it more often");

/// AC005: realloc called with a stale size.
pub const AC005: Diagnostic = Diagnostic::warning(
    "AC005",
    "realloc old_size does not match the recorded block size"
).with_note("the recorded size is used for accounting");

// =============================================================================
// Predefined diagnostics (AC1xx - Registry)
// =============================================================================

/// AC101: Resources still referenced at shutdown.
pub const AC101: Diagnostic = Diagnostic::warning(
    "AC101",
    "resource still referenced at registry shutdown"
).with_note("a ResourceHandle for this identifier is still alive")
 .with_help("drop or release every handle before shutting down the context");

// =============================================================================
// Predefined diagnostics (AC2xx - Load state)
// =============================================================================

/// AC201: Leaving `Loading` without owning it.
pub const AC201: Diagnostic = Diagnostic::error(
    "AC201",
    "load state changed by a thread that does not own loading rights"
).with_note("only the thread that won try_acquire_loading() may leave the Loading state")
 .with_help("check try_acquire_loading() and wait_for() instead of forcing the state");

/// AC202: Transition not allowed by the state machine.
pub const AC202: Diagnostic = Diagnostic::error(
    "AC202",
    "invalid load state transition"
).with_note("valid path: Unloaded -> Loading -> Loaded|Error -> Unloading -> Unloaded");

// =============================================================================
// Predefined diagnostics (AC3xx - Loader)
// =============================================================================

/// AC301: Freeing a task that is not terminal.
pub const AC301: Diagnostic = Diagnostic::error(
    "AC301",
    "free_task called on a task that has not reached a terminal status"
).with_help("wait_for_task() or observe Completed/Failed/Cancelled before freeing");

/// AC302: Completions drained off the owning thread.
pub const AC302: Diagnostic = Diagnostic::error(
    "AC302",
    "process_completed called from a thread that does not own the loader"
).with_note("callbacks must never run concurrently with the owning thread")
 .with_help("call process_completed() from the thread that created the AsyncLoader");

/// AC303: Submission rejected because the queue is full.
pub const AC303: Diagnostic = Diagnostic::warning(
    "AC303",
    "task queue is full, submission rejected"
).with_help("raise max_queue_size in LoaderConfig or drain work faster");

/// AC304: Task body panicked.
pub const AC304: Diagnostic = Diagnostic::error(
    "AC304",
    "task body panicked, task marked Failed"
);

// =============================================================================
// Predefined diagnostics (AC9xx - Internal)
// =============================================================================

/// AC901: Internal error.
pub const AC901: Diagnostic = Diagnostic::error(
    "AC901",
    "internal assetcore error"
).with_note("this indicates a bug in assetcore");
