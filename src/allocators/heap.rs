//! System heap wrapper with per-block headers.
//!
//! Every block carries a small header in front of the returned pointer that
//! records its size, alignment and category. This lets `free` work from the
//! pointer alone and lets `realloc` keep the original alignment.

use std::alloc::{alloc, dealloc, realloc, Layout};
use std::mem::{align_of, size_of};
use std::ptr;

use crate::api::category::AllocCategory;
use crate::core::tracker::CategoryTracker;
use crate::util::layout::align_up;

/// Alignment used when the caller does not specify one.
pub const DEFAULT_ALIGN: usize = 16;

const HEADER_MAGIC: u32 = 0xA55E_7C0E;

/// Header stored immediately before every user pointer.
#[repr(C)]
struct BlockHeader {
    size: usize,
    align: usize,
    category: u32,
    magic: u32,
}

impl BlockHeader {
    /// Distance from the start of the system block to the user pointer.
    #[inline]
    fn offset_for(align: usize) -> usize {
        align_up(size_of::<BlockHeader>(), align)
    }

    fn layout_for(size: usize, align: usize) -> Option<Layout> {
        let total = Self::offset_for(align).checked_add(size)?;
        Layout::from_size_align(total, align).ok()
    }
}

/// Why a heap operation returned null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapFailure {
    /// Zero size, non power-of-two alignment or an overflowing layout.
    InvalidRequest,
    /// The configured memory limit would be exceeded.
    LimitExceeded,
    /// The system allocator returned null.
    OutOfMemory,
}

/// Wrapper around the system allocator for tracked allocations.
#[derive(Debug, Default)]
pub struct SystemHeap {
    /// Fill fresh and freed blocks with known patterns
    poison: bool,
}

impl SystemHeap {
    /// Create a new system heap wrapper.
    pub fn new(poison: bool) -> Self {
        Self { poison }
    }

    /// Allocate `size` bytes aligned to `align` and account them to `category`.
    pub fn alloc(
        &self,
        tracker: &CategoryTracker,
        category: AllocCategory,
        size: usize,
        align: usize,
    ) -> Result<*mut u8, HeapFailure> {
        if size == 0 || !align.is_power_of_two() {
            return Err(HeapFailure::InvalidRequest);
        }
        let align = align.max(align_of::<BlockHeader>());
        let layout = BlockHeader::layout_for(size, align).ok_or(HeapFailure::InvalidRequest)?;

        if !tracker.try_record_alloc(category, size) {
            return Err(HeapFailure::LimitExceeded);
        }

        // SAFETY: layout has a non-zero size.
        let base = unsafe { alloc(layout) };
        if base.is_null() {
            tracker.rollback_alloc(category, size);
            return Err(HeapFailure::OutOfMemory);
        }

        // SAFETY: the block is at least offset + size bytes, and the offset is
        // a multiple of the header alignment.
        unsafe {
            let user = base.add(BlockHeader::offset_for(align));
            write_header(user, size, align, category);

            if self.poison {
                crate::debug::poison::poison_uninit(user, size);
            }

            Ok(user)
        }
    }

    /// Release a block and return the category it was accounted to.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap and not freed since.
    pub unsafe fn free(&self, tracker: &CategoryTracker, ptr: *mut u8) -> AllocCategory {
        let header = read_header(ptr);
        let category = header_category(&header);
        let offset = BlockHeader::offset_for(header.align);
        let layout = Layout::from_size_align_unchecked(offset + header.size, header.align);

        (*header_ptr(ptr)).magic = 0;

        if self.poison {
            crate::debug::poison::poison_freed(ptr, header.size);
        }

        dealloc(ptr.sub(offset), layout);
        tracker.record_free(category, header.size);
        category
    }

    /// Resize a block in place or by moving it, keeping its alignment.
    ///
    /// On failure the original block is untouched and still valid.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap and not freed since.
    /// `new_size` must be non-zero.
    pub unsafe fn realloc(
        &self,
        tracker: &CategoryTracker,
        ptr: *mut u8,
        new_size: usize,
    ) -> Result<*mut u8, HeapFailure> {
        let header = read_header(ptr);
        let category = header_category(&header);
        let offset = BlockHeader::offset_for(header.align);
        let old_layout = Layout::from_size_align_unchecked(offset + header.size, header.align);
        if BlockHeader::layout_for(new_size, header.align).is_none() {
            return Err(HeapFailure::InvalidRequest);
        }

        if !tracker.try_reserve_growth(header.size, new_size) {
            return Err(HeapFailure::LimitExceeded);
        }

        let base = realloc(ptr.sub(offset), old_layout, offset + new_size);
        if base.is_null() {
            tracker.release_growth(header.size, new_size);
            return Err(HeapFailure::OutOfMemory);
        }

        let user = base.add(offset);
        write_header(user, new_size, header.align, category);
        tracker.record_resize(category, header.size, new_size);
        Ok(user)
    }

    /// Recorded size and category of a live block, or `None` if the header
    /// does not look like one of ours.
    ///
    /// # Safety
    ///
    /// `ptr` must point at least one header's worth past a readable address.
    pub unsafe fn block_info(&self, ptr: *const u8) -> Option<(usize, AllocCategory)> {
        let header = read_header(ptr);
        if header.magic != HEADER_MAGIC {
            return None;
        }
        Some((header.size, header_category(&header)))
    }
}

#[inline]
unsafe fn header_ptr(user: *const u8) -> *mut BlockHeader {
    user.sub(size_of::<BlockHeader>()) as *mut BlockHeader
}

unsafe fn write_header(user: *mut u8, size: usize, align: usize, category: AllocCategory) {
    ptr::write(
        header_ptr(user),
        BlockHeader {
            size,
            align,
            category: category.index() as u32,
            magic: HEADER_MAGIC,
        },
    );
}

unsafe fn read_header(user: *const u8) -> BlockHeader {
    ptr::read(header_ptr(user))
}

fn header_category(header: &BlockHeader) -> AllocCategory {
    AllocCategory::from_index(header.category as usize).unwrap_or_default()
}
