//! Build script for assetcore.
//!
//! Warns about feature combinations that are easy to ship by accident.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let diagnostics_enabled = env::var("CARGO_FEATURE_DIAGNOSTICS").is_ok();
    let is_release = env::var("PROFILE").map(|p| p == "release").unwrap_or(false);

    if debug_enabled && is_release {
        emit_warning("'debug' feature enabled in a release build");
        emit_note("freed and fresh blocks are poisoned on every allocation");
    }

    if diagnostics_enabled && log_enabled {
        emit_note("'diagnostics' has no effect while 'log' is enabled; diagnostics go through log");
    }
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[assetcore] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[assetcore]    {}", msg);
}
