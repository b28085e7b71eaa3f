//! Memory poisoning.
//!
//! Fills fresh and freed memory with known patterns so stale reads stand out.

/// Pattern written over freed memory.
pub const FREED_PATTERN: u8 = 0xCD;

/// Pattern written over freshly allocated memory.
pub const UNINIT_PATTERN: u8 = 0xAB;

/// Poison a region of memory with the freed pattern.
///
/// # Safety
///
/// The memory region must be valid and writable.
pub unsafe fn poison_freed(ptr: *mut u8, size: usize) {
    std::ptr::write_bytes(ptr, FREED_PATTERN, size);
}

/// Poison a region of memory with the uninitialized pattern.
///
/// # Safety
///
/// The memory region must be valid and writable.
pub unsafe fn poison_uninit(ptr: *mut u8, size: usize) {
    std::ptr::write_bytes(ptr, UNINIT_PATTERN, size);
}

/// Whether the first `size` bytes all carry the freed pattern.
///
/// # Safety
///
/// The memory region must be valid and readable.
#[cfg(test)]
pub unsafe fn is_freed_poison(ptr: *const u8, size: usize) -> bool {
    std::slice::from_raw_parts(ptr, size)
        .iter()
        .all(|&b| b == FREED_PATTERN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poison_patterns() {
        let mut buf = [0u8; 24];
        unsafe {
            poison_uninit(buf.as_mut_ptr(), buf.len());
            assert!(!is_freed_poison(buf.as_ptr(), buf.len()));
            poison_freed(buf.as_mut_ptr(), 8);
            assert!(is_freed_poison(buf.as_ptr(), 8));
            assert!(!is_freed_poison(buf.as_ptr(), 9));
        }
    }
}
