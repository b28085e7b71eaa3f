//! Diagnostic emission backend.
//!
//! Handles outputting diagnostics to stderr, the `log` crate, or an
//! installed sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};
use crate::sync::mutex::RwLock;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Installed sinks, receiving every diagnostic that is not suppressed.
static SINKS: RwLock<Vec<Arc<dyn DiagnosticSink>>> = RwLock::new(Vec::new());

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Install a sink that receives every emitted diagnostic.
pub fn add_sink(sink: Arc<dyn DiagnosticSink>) {
    SINKS.write().push(sink);
}

/// Remove a previously installed sink.
pub fn remove_sink(sink: &Arc<dyn DiagnosticSink>) {
    SINKS.write().retain(|s| !Arc::ptr_eq(s, sink));
}

/// Emit a diagnostic.
///
/// With the `log` feature this goes through the `log` crate. Otherwise it is
/// written to stderr in debug builds, or in release builds with the
/// `diagnostics` feature.
pub fn emit(diag: &Diagnostic) {
    dispatch(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    dispatch(diag, Some(context));
}

fn dispatch(diag: &Diagnostic, context: Option<&str>) {
    if is_suppressed() {
        return;
    }

    for sink in SINKS.read().iter() {
        sink.emit(diag, context);
    }

    #[cfg(feature = "log")]
    emit_to_log(diag, context);

    #[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
    emit_to_stderr(diag, context);

    let fatal = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note => false,
    };
    if fatal {
        match context {
            Some(ctx) => panic!(
                "[assetcore][{}] {}\nContext: {}\nStrict mode enabled - errors are fatal.",
                diag.code, diag.message, ctx
            ),
            None => panic!(
                "[assetcore][{}] {}\nStrict mode enabled - errors are fatal.",
                diag.code, diag.message
            ),
        }
    }
}

/// Internal: emit to stderr.
#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();

    let _ = writeln!(
        stderr,
        "[assetcore][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );
    if let Some(ctx) = context {
        let _ = writeln!(stderr, "  context: {}", ctx);
    }
    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }
    let _ = writeln!(stderr);
}

/// Emit a diagnostic using the log crate.
#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    let context = context.unwrap_or("-");
    match diag.kind {
        DiagnosticKind::Error => {
            log::error!("[{}] {} ({})", diag.code, diag.message, context);
        }
        DiagnosticKind::Warning => {
            log::warn!("[{}] {} ({})", diag.code, diag.message, context);
        }
        DiagnosticKind::Note => {
            log::info!("[{}] {} ({})", diag.code, diag.message, context);
        }
    }

    if let Some(note) = diag.note {
        log::debug!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::debug!("  help: {}", help);
    }
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic.
    fn emit(&self, diag: &Diagnostic, context: Option<&str>);
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: crate::sync::mutex::Mutex<Vec<(Diagnostic, Option<String>)>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<(Diagnostic, Option<String>)> {
        self.diagnostics.lock().clone()
    }

    /// Count collected diagnostics with the given code.
    pub fn count(&self, code: &str) -> usize {
        self.diagnostics
            .lock()
            .iter()
            .filter(|(d, _)| d.code == code)
            .count()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|(d, _)| d.kind == DiagnosticKind::Error)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: Option<&str>) {
        self.diagnostics
            .lock()
            .push((diag.clone(), context.map(String::from)));
    }
}
