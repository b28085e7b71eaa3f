//! Alignment arithmetic.

/// Round `size` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}
