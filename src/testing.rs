//! Helpers shared by the unit tests.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator},
    block::MemoryBlock,
};

/// Forwards to `A` and counts the calls that reach it.
#[derive(Debug, Default)]
pub struct CountingAllocator<A> {
    pub inner: A,
    pub allocations: usize,
    pub deallocations: usize,
}

impl<A: Allocator> CountingAllocator<A> {
    pub fn new(inner: A) -> Self {
        CountingAllocator {
            inner,
            allocations: 0,
            deallocations: 0,
        }
    }

    /// Number of blocks handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.allocations - self.deallocations
    }
}

unsafe impl<A: Allocator> Allocator for CountingAllocator<A> {
    const ALIGNMENT: usize = A::ALIGNMENT;

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        let blk = self.inner.allocate(size);
        if !blk.is_null() {
            self.allocations += 1;
        }
        blk
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if !blk.is_null() {
            self.deallocations += 1;
        }
        self.inner.deallocate(blk)
    }
}

impl<A: OwningAllocator> OwningAllocator for CountingAllocator<A> {
    fn owns(&self, blk: MemoryBlock) -> bool {
        self.inner.owns(blk)
    }
}

impl<A: AlignedAllocator> AlignedAllocator for CountingAllocator<A> {
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        let blk = self.inner.allocate_aligned(size, align);
        if !blk.is_null() {
            self.allocations += 1;
        }
        blk
    }
}

impl<A: BulkFreeAllocator> BulkFreeAllocator for CountingAllocator<A> {
    fn deallocate_all(&mut self) {
        self.allocations = 0;
        self.deallocations = 0;
        self.inner.deallocate_all()
    }
}
