//! An allocator that never allocates.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator, StatelessAllocator},
    block::MemoryBlock,
    contract::{DefaultHandler, FailureHandler},
};

/// Fails every request.
///
/// Useful to terminate a fallback chain or to switch off one side of a
/// segregator. Only the null block may be handed back to it; anything else is
/// reported to the failure handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAllocator<H: FailureHandler = DefaultHandler> {
    handler: H,
}

impl NullAllocator {
    pub const fn new() -> Self {
        NullAllocator {
            handler: DefaultHandler,
        }
    }
}

impl<H: FailureHandler> NullAllocator<H> {
    pub const fn with_handler(handler: H) -> Self {
        NullAllocator { handler }
    }
}

unsafe impl<H: FailureHandler> Allocator for NullAllocator<H> {
    // Nothing is ever handed out, so every alignment holds.
    const ALIGNMENT: usize = 1 << (usize::BITS - 1);

    #[inline]
    fn allocate(&mut self, _size: usize) -> MemoryBlock {
        MemoryBlock::null()
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        contract!(
            self.handler,
            blk.is_null(),
            "{:?} was handed to the null allocator",
            blk
        );
    }
}

impl<H: FailureHandler> OwningAllocator for NullAllocator<H> {
    #[inline]
    fn owns(&self, blk: MemoryBlock) -> bool {
        blk.is_null()
    }
}

impl<H: FailureHandler> AlignedAllocator for NullAllocator<H> {
    #[inline]
    fn allocate_aligned(&mut self, _size: usize, _align: usize) -> MemoryBlock {
        MemoryBlock::null()
    }
}

impl<H: FailureHandler> BulkFreeAllocator for NullAllocator<H> {
    #[inline]
    fn deallocate_all(&mut self) {}
}

impl StatelessAllocator for NullAllocator {
    const INSTANCE: Self = NullAllocator::new();
}
