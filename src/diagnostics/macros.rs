//! Diagnostic and logging macros.

/// Emit a predefined diagnostic by code.
///
/// # Example
///
/// ```rust,ignore
/// ac_emit!(AC004);
/// ```
#[macro_export]
macro_rules! ac_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
}

/// Emit a predefined diagnostic with formatted context.
///
/// The calling thread is appended to the context automatically.
///
/// # Example
///
/// ```rust,ignore
/// ac_emit_ctx!(AC201, "identifier={:?}", identifier);
/// ```
#[macro_export]
macro_rules! ac_emit_ctx {
    ($code:ident, $($arg:tt)+) => {{
        let ctx = $crate::diagnostics::context::DiagContext::capture(format!($($arg)+));
        $crate::diagnostics::emit::emit_with_context(
            &$crate::diagnostics::$code,
            &ctx.format(),
        );
    }};
}

/// Assert a condition or emit a diagnostic.
///
/// # Example
///
/// ```rust,ignore
/// ac_assert!(header.category == category, AC002);
/// ```
#[macro_export]
macro_rules! ac_assert {
    ($cond:expr, $code:ident) => {{
        if !$cond {
            $crate::ac_emit!($code);
        }
    }};
}

/// Lifecycle logging through the `log` crate.
///
/// Compiles to nothing observable without the `log` feature, but still
/// type-checks its arguments.
#[doc(hidden)]
#[macro_export]
macro_rules! ac_log {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "log")]
        {
            ::log::$level!(target: "assetcore", $($arg)+);
        }
        #[cfg(not(feature = "log"))]
        {
            if false {
                let _ = format_args!($($arg)+);
            }
        }
    }};
}
