//! Allocators backed by the C heap.

use crate::{
    alloc::{AlignedAllocator, Allocator, StatelessAllocator},
    block::MemoryBlock,
    contract::{DefaultHandler, FailureHandler},
    layout_ext,
};
use std::{cmp, mem};

/// Alignment `malloc` guarantees on the supported platforms.
pub const MALLOC_ALIGNMENT: usize = 2 * mem::size_of::<usize>();

/// The shared [`HeapAllocator`] instance.
pub static HEAP: HeapAllocator = HeapAllocator;

/// The shared [`AlignedHeapAllocator`] instance.
pub static ALIGNED_HEAP: AlignedHeapAllocator = AlignedHeapAllocator::new();

/// A block that stands for a successful zero-length allocation. It is never
/// passed to the C heap.
#[inline]
fn empty_block() -> MemoryBlock {
    MemoryBlock::new(MALLOC_ALIGNMENT as *mut u8, 0)
}

/// `malloc`/`free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

unsafe impl Allocator for HeapAllocator {
    const ALIGNMENT: usize = MALLOC_ALIGNMENT;

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        if size == 0 {
            return empty_block();
        }
        let ptr = unsafe { libc::malloc(size) } as *mut u8;
        if ptr.is_null() {
            MemoryBlock::null()
        } else {
            MemoryBlock::new(ptr, size)
        }
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if blk.is_null() || blk.is_empty() {
            return;
        }
        libc::free(blk.ptr() as *mut libc::c_void)
    }
}

impl StatelessAllocator for HeapAllocator {
    const INSTANCE: Self = HeapAllocator;
}

/// Heap allocator that honours caller-chosen alignments.
///
/// Requested alignments below [`MALLOC_ALIGNMENT`] are raised to it. Blocks
/// must be returned to an `AlignedHeapAllocator`, never to [`HeapAllocator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AlignedHeapAllocator<H: FailureHandler = DefaultHandler> {
    handler: H,
}

impl AlignedHeapAllocator {
    pub const fn new() -> Self {
        AlignedHeapAllocator {
            handler: DefaultHandler,
        }
    }
}

impl<H: FailureHandler> AlignedHeapAllocator<H> {
    pub const fn with_handler(handler: H) -> Self {
        AlignedHeapAllocator { handler }
    }
}

unsafe impl<H: FailureHandler> Allocator for AlignedHeapAllocator<H> {
    const ALIGNMENT: usize = MALLOC_ALIGNMENT;

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        self.allocate_aligned(size, MALLOC_ALIGNMENT)
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if blk.is_null() || blk.is_empty() {
            return;
        }
        sys::aligned_free(blk.ptr())
    }
}

impl<H: FailureHandler> AlignedAllocator for AlignedHeapAllocator<H> {
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        if !contract!(
            self.handler,
            layout_ext::is_valid_alignment(align),
            "alignment {} is not a power of two",
            align
        ) {
            return MemoryBlock::null();
        }
        let align = cmp::max(align, MALLOC_ALIGNMENT);
        if size == 0 {
            return MemoryBlock::new(align as *mut u8, 0);
        }
        let ptr = unsafe { sys::aligned_alloc(size, align) };
        if ptr.is_null() {
            MemoryBlock::null()
        } else {
            MemoryBlock::new(ptr, size)
        }
    }
}

impl StatelessAllocator for AlignedHeapAllocator {
    const INSTANCE: Self = AlignedHeapAllocator::new();
}

#[cfg(unix)]
mod sys {
    use std::ptr;

    pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
        let mut out = ptr::null_mut();
        // `align` is a power of two and at least a pointer wide.
        if libc::posix_memalign(&mut out, align, size) == 0 {
            out as *mut u8
        } else {
            ptr::null_mut()
        }
    }

    pub unsafe fn aligned_free(ptr: *mut u8) {
        libc::free(ptr as *mut libc::c_void)
    }
}

#[cfg(windows)]
mod sys {
    pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
        libc::aligned_malloc(size, align) as *mut u8
    }

    pub unsafe fn aligned_free(ptr: *mut u8) {
        libc::aligned_free(ptr as *mut libc::c_void)
    }
}
