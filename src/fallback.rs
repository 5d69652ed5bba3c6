//! Trying one allocator, then another.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator, StatelessAllocator},
    block::MemoryBlock,
    layout_ext,
};

/// Serves requests from `P` and turns to `F` whenever `P` fails.
///
/// Deallocation is routed with [`OwningAllocator::owns`] on the primary, which
/// is why the primary has to be an owning allocator. The composite owns blocks
/// itself only when the fallback does too.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackAllocator<P: OwningAllocator, F: Allocator> {
    primary: P,
    fallback: F,
}

impl<P: OwningAllocator, F: Allocator> FallbackAllocator<P, F> {
    pub const fn new(primary: P, fallback: F) -> Self {
        FallbackAllocator { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut P {
        &mut self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub fn fallback_mut(&mut self) -> &mut F {
        &mut self.fallback
    }

    pub fn into_inner(self) -> (P, F) {
        (self.primary, self.fallback)
    }
}

unsafe impl<P: OwningAllocator, F: Allocator> Allocator for FallbackAllocator<P, F> {
    const ALIGNMENT: usize = layout_ext::min_alignment(P::ALIGNMENT, F::ALIGNMENT);

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        let blk = self.primary.allocate(size);
        if blk.is_null() {
            self.fallback.allocate(size)
        } else {
            blk
        }
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if self.primary.owns(blk) {
            self.primary.deallocate(blk)
        } else {
            self.fallback.deallocate(blk)
        }
    }
}

impl<P: OwningAllocator, F: OwningAllocator> OwningAllocator for FallbackAllocator<P, F> {
    fn owns(&self, blk: MemoryBlock) -> bool {
        self.primary.owns(blk) || self.fallback.owns(blk)
    }
}

impl<P, F> AlignedAllocator for FallbackAllocator<P, F>
where
    P: OwningAllocator + AlignedAllocator,
    F: AlignedAllocator,
{
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        let blk = self.primary.allocate_aligned(size, align);
        if blk.is_null() {
            self.fallback.allocate_aligned(size, align)
        } else {
            blk
        }
    }
}

impl<P, F> BulkFreeAllocator for FallbackAllocator<P, F>
where
    P: OwningAllocator + BulkFreeAllocator,
    F: BulkFreeAllocator,
{
    fn deallocate_all(&mut self) {
        self.primary.deallocate_all();
        self.fallback.deallocate_all();
    }
}

impl<P, F> StatelessAllocator for FallbackAllocator<P, F>
where
    P: OwningAllocator + StatelessAllocator,
    F: StatelessAllocator,
{
    const INSTANCE: Self = FallbackAllocator::new(P::INSTANCE, F::INSTANCE);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        heap::{AlignedHeapAllocator, HeapAllocator},
        null::NullAllocator,
        stack::StackAllocator,
    };
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use std::mem;

    #[test]
    fn allocate() {
        let mut a = FallbackAllocator::new(StackAllocator::<64>::new(), HeapAllocator);
        let b = a.allocate(mem::size_of::<usize>());
        assert_eq!(b.len(), mem::size_of::<usize>());
        assert!(a.primary().owns(b));
        unsafe { (b.ptr() as *mut usize).write_unaligned(42) };
    }

    #[test]
    fn falls_back() {
        let mut a = FallbackAllocator::new(StackAllocator::<64>::new(), HeapAllocator);
        let b = a.allocate(mem::size_of::<usize>() * 32);
        assert!(!b.is_null());
        assert!(!a.primary().owns(b));
        unsafe {
            (b.ptr() as *mut usize).add(31).write_unaligned(42);
            a.deallocate(b);
        }
    }

    #[test]
    fn owns() {
        let mut a = FallbackAllocator::new(StackAllocator::<64>::new(), StackAllocator::<512>::new());
        let small = a.allocate(mem::size_of::<usize>());
        let large = a.allocate(128);
        assert!(a.owns(small));
        assert!(a.owns(large));
        assert!(a.primary().owns(small));
        assert!(a.fallback().owns(large));
        unsafe {
            a.deallocate(large);
            a.deallocate(small);
        }
        assert_eq!(a.primary().used(), 0);
        assert_eq!(a.fallback().used(), 0);
    }

    #[test]
    fn deallocate() {
        let mut a = FallbackAllocator::new(StackAllocator::<64>::new(), HeapAllocator);
        let blk = a.allocate(mem::size_of::<usize>());
        unsafe {
            a.deallocate(blk);
            a.deallocate(MemoryBlock::null());
        }
        assert_eq!(a.primary().used(), 0);
    }

    #[test]
    fn null_terminated_chain() {
        let mut a = FallbackAllocator::new(StackAllocator::<16>::new(), NullAllocator::new());
        assert!(!a.allocate(16).is_null());
        assert!(a.allocate(1).is_null());
        assert!(a.owns(MemoryBlock::null()));
    }

    #[test]
    fn aligned_and_bulk() {
        let mut a = FallbackAllocator::new(StackAllocator::<64>::new(), StackAllocator::<256>::new());
        let blk = a.allocate_aligned(48, 32);
        assert_eq!(blk.ptr() as usize % 32, 0);
        let spill = a.allocate_aligned(48, 64);
        assert_eq!(spill.ptr() as usize % 64, 0);
        a.deallocate_all();
        assert_eq!(a.primary().used(), 0);
        assert_eq!(a.fallback().used(), 0);

        let mut b = FallbackAllocator::new(StackAllocator::<64>::new(), AlignedHeapAllocator::new());
        let big = b.allocate_aligned(1024, 128);
        assert_eq!(big.ptr() as usize % 128, 0);
        assert!(!b.primary().owns(big));
        unsafe { b.deallocate(big) };
    }

    #[test]
    fn stateless_composition() {
        type Chain = FallbackAllocator<NullAllocator, HeapAllocator>;
        assert_eq!(mem::size_of::<Chain>(), 0);
        let mut chain = Chain::instance();
        let blk = chain.allocate(10);
        assert!(!blk.is_null());
        unsafe { chain.deallocate(blk) };
    }

    #[quickcheck]
    fn succeeds_when_fallback_does(size: u16) -> TestResult {
        let mut a = FallbackAllocator::new(StackAllocator::<128>::new(), StackAllocator::<4096>::new());
        let mut alone = StackAllocator::<4096>::new();
        let expected = !alone.allocate(size as usize).is_null();
        let blk = a.allocate(size as usize);
        TestResult::from_bool(!blk.is_null() == expected)
    }
}
