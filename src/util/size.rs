//! Byte size helpers for configuration and reporting.

/// Kilobytes to bytes.
#[inline]
pub const fn kb(n: usize) -> usize {
    n * 1024
}

/// Megabytes to bytes.
#[inline]
pub const fn mb(n: usize) -> usize {
    n * 1024 * 1024
}

/// Gigabytes to bytes.
#[inline]
pub const fn gb(n: usize) -> usize {
    n * 1024 * 1024 * 1024
}

/// Human-readable byte count, e.g. `"1.50 MB"`.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [(&str, usize); 3] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];

    for (unit, scale) in UNITS {
        if bytes >= scale {
            return format!("{:.2} {}", bytes as f64 / scale as f64, unit);
        }
    }
    format!("{} B", bytes)
}
