//! Routing requests by size.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator, StatelessAllocator},
    block::MemoryBlock,
    layout_ext,
};

/// Sends requests of at most `THRESHOLD` bytes to `S` and larger ones to `L`.
///
/// Blocks are routed back by their length, so `S` must never hand out a block
/// longer than `THRESHOLD` (checked in debug builds). With two stateless
/// children the segregator is itself zero-sized and stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegregateAllocator<const THRESHOLD: usize, S: Allocator, L: Allocator> {
    small: S,
    large: L,
}

impl<const THRESHOLD: usize, S: Allocator, L: Allocator> SegregateAllocator<THRESHOLD, S, L> {
    pub const fn new(small: S, large: L) -> Self {
        SegregateAllocator { small, large }
    }

    pub fn small(&self) -> &S {
        &self.small
    }

    pub fn large(&self) -> &L {
        &self.large
    }

    #[inline]
    fn is_small(size: usize) -> bool {
        size <= THRESHOLD
    }

    fn check_small(blk: MemoryBlock) -> MemoryBlock {
        debug_assert!(
            blk.len() <= THRESHOLD,
            "{:?} from the small allocator exceeds the {}-byte threshold",
            blk,
            THRESHOLD
        );
        blk
    }
}

unsafe impl<const THRESHOLD: usize, S: Allocator, L: Allocator> Allocator
    for SegregateAllocator<THRESHOLD, S, L>
{
    const ALIGNMENT: usize = layout_ext::min_alignment(S::ALIGNMENT, L::ALIGNMENT);

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        if Self::is_small(size) {
            Self::check_small(self.small.allocate(size))
        } else {
            self.large.allocate(size)
        }
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if blk.is_null() {
            return;
        }
        if Self::is_small(blk.len()) {
            self.small.deallocate(blk)
        } else {
            self.large.deallocate(blk)
        }
    }
}

impl<const THRESHOLD: usize, S: OwningAllocator, L: OwningAllocator> OwningAllocator
    for SegregateAllocator<THRESHOLD, S, L>
{
    fn owns(&self, blk: MemoryBlock) -> bool {
        if Self::is_small(blk.len()) {
            self.small.owns(blk)
        } else {
            self.large.owns(blk)
        }
    }
}

impl<const THRESHOLD: usize, S: AlignedAllocator, L: AlignedAllocator> AlignedAllocator
    for SegregateAllocator<THRESHOLD, S, L>
{
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        if Self::is_small(size) {
            Self::check_small(self.small.allocate_aligned(size, align))
        } else {
            self.large.allocate_aligned(size, align)
        }
    }
}

impl<const THRESHOLD: usize, S: BulkFreeAllocator, L: BulkFreeAllocator> BulkFreeAllocator
    for SegregateAllocator<THRESHOLD, S, L>
{
    fn deallocate_all(&mut self) {
        self.small.deallocate_all();
        self.large.deallocate_all();
    }
}

impl<const THRESHOLD: usize, S: StatelessAllocator, L: StatelessAllocator> StatelessAllocator
    for SegregateAllocator<THRESHOLD, S, L>
{
    const INSTANCE: Self = SegregateAllocator::new(S::INSTANCE, L::INSTANCE);
}
