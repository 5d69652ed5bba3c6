//! The allocator capability traits.
//!
//! Every building block implements [`Allocator`]. The remaining traits are
//! capabilities a type may or may not have; composite allocators pick them up
//! only when their children do, so asking a composite for something its
//! children cannot provide is a compile error rather than a runtime one.

use crate::{
    block::MemoryBlock,
    capability::AssertStateless,
    contract::Violation,
};
use snafu::{ensure, OptionExt, Snafu};
use std::{mem, ptr::NonNull};

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("Allocation of {} bytes failed", size))]
    AllocationFailed { size: usize },

    #[snafu(display("Allocation of {} items of {} bytes overflows", items, size))]
    ArrayOverflow { items: usize, size: usize },

    #[snafu(display(
        "Alignment {} exceeds the {} bytes guaranteed by the allocator",
        align,
        guaranteed
    ))]
    Misaligned { align: usize, guaranteed: usize },

    #[snafu(display("{}", violation))]
    ContractViolation { violation: Violation },
}

/// A source of memory blocks.
///
/// # Safety
///
/// A non-null block returned by `allocate(n)` must describe at least `n` bytes
/// that are valid for reads and writes, aligned to [`Allocator::ALIGNMENT`],
/// and not handed out again until the block is deallocated (or released in
/// bulk). Composite allocators rely on this to carve and route blocks.
#[diagnostic::on_unimplemented(message = "`{Self}` is not an allocator")]
pub unsafe trait Allocator {
    /// Alignment every non-null block returned by [`allocate`] satisfies.
    ///
    /// [`allocate`]: Allocator::allocate
    const ALIGNMENT: usize = 1;

    /// Allocates `size` bytes.
    ///
    /// Returns [`MemoryBlock::null`] when the request cannot be satisfied.
    /// Zero-length requests may succeed with a non-null, zero-length block.
    /// Allocators that round the length up accept the block back with either
    /// the requested or the returned length.
    fn allocate(&mut self, size: usize) -> MemoryBlock;

    /// Releases a block.
    ///
    /// Passing a null block is a no-op.
    ///
    /// # Safety
    ///
    /// `blk` must have been returned by this allocator (or by the chain it
    /// roots), must still be live, and must be passed back with the pointer it
    /// was returned with.
    unsafe fn deallocate(&mut self, blk: MemoryBlock);

    /// Allocates a block large enough for one `T`.
    ///
    /// Only the size is taken into account; see
    /// [`AlignedAllocator::allocate_aligned_one`] for an aligned version.
    fn allocate_one<T>(&mut self) -> MemoryBlock
    where
        Self: Sized,
    {
        self.allocate(mem::size_of::<T>())
    }

    /// Allocates a block large enough for `count` instances of `T`.
    ///
    /// Returns a null block when the total size overflows.
    fn allocate_array<T>(&mut self, count: usize) -> MemoryBlock
    where
        Self: Sized,
    {
        match mem::size_of::<T>().checked_mul(count) {
            Some(size) => self.allocate(size),
            None => MemoryBlock::null(),
        }
    }

    /// Allocates storage for a `T`.
    ///
    /// # Errors
    ///
    /// Fails when the allocation fails, or when `T` needs a stronger alignment
    /// than the allocator guarantees.
    fn try_allocate_one<T>(&mut self) -> Result<NonNull<T>, Error>
    where
        Self: Sized,
    {
        self.try_allocate_array::<T>(1)
    }

    /// Allocates storage for `count` instances of `T`.
    ///
    /// # Errors
    ///
    /// Fails on size overflow, allocation failure, or when `T` needs a
    /// stronger alignment than the allocator guarantees.
    fn try_allocate_array<T>(&mut self, count: usize) -> Result<NonNull<T>, Error>
    where
        Self: Sized,
    {
        let align = mem::align_of::<T>();
        ensure!(
            align <= Self::ALIGNMENT,
            Misaligned {
                align,
                guaranteed: Self::ALIGNMENT
            }
        );
        let size = mem::size_of::<T>()
            .checked_mul(count)
            .context(ArrayOverflow {
                items: count,
                size: mem::size_of::<T>(),
            })?;
        self.allocate(size)
            .as_non_null()
            .map(NonNull::cast)
            .context(AllocationFailed { size })
    }
}

/// An allocator that can tell whether a block came from it.
///
/// The answer may be approximate ("this range could have come from me"), but
/// must never be `false` for a live block the allocator handed out.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot tell which blocks it owns",
    label = "an owning allocator is required here"
)]
pub trait OwningAllocator: Allocator {
    fn owns(&self, blk: MemoryBlock) -> bool;
}

/// An allocator that honours caller-chosen alignments.
#[diagnostic::on_unimplemented(message = "`{Self}` does not support aligned allocation")]
pub trait AlignedAllocator: Allocator {
    /// Allocates `size` bytes at an address that is a multiple of `align`.
    ///
    /// `align` must be a power of two; anything else is a contract violation.
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock;

    fn allocate_aligned_one<T>(&mut self) -> MemoryBlock
    where
        Self: Sized,
    {
        self.allocate_aligned(mem::size_of::<T>(), mem::align_of::<T>())
    }

    fn allocate_aligned_array<T>(&mut self, count: usize) -> MemoryBlock
    where
        Self: Sized,
    {
        match mem::size_of::<T>().checked_mul(count) {
            Some(size) => self.allocate_aligned(size, mem::align_of::<T>()),
            None => MemoryBlock::null(),
        }
    }
}

/// An allocator that can release everything it handed out at once.
#[diagnostic::on_unimplemented(message = "`{Self}` cannot release all of its blocks at once")]
pub trait BulkFreeAllocator: Allocator {
    /// Releases every outstanding block.
    ///
    /// Blocks handed out earlier become dangling; their holders are not told.
    fn deallocate_all(&mut self);
}

/// An allocator without any state, which makes every instance
/// interchangeable with [`StatelessAllocator::INSTANCE`].
///
/// Implementing this for a type that is not zero-sized is a compile error.
#[diagnostic::on_unimplemented(message = "`{Self}` carries state")]
pub trait StatelessAllocator: Allocator + Copy {
    /// The shared instance.
    const INSTANCE: Self;

    fn instance() -> Self {
        let () = AssertStateless::<Self>::OK;
        Self::INSTANCE
    }
}

unsafe impl<A: Allocator> Allocator for &mut A {
    const ALIGNMENT: usize = A::ALIGNMENT;

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        A::allocate(self, size)
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        A::deallocate(self, blk)
    }
}

impl<A: OwningAllocator> OwningAllocator for &mut A {
    fn owns(&self, blk: MemoryBlock) -> bool {
        A::owns(self, blk)
    }
}

impl<A: AlignedAllocator> AlignedAllocator for &mut A {
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        A::allocate_aligned(self, size, align)
    }
}

impl<A: BulkFreeAllocator> BulkFreeAllocator for &mut A {
    fn deallocate_all(&mut self) {
        A::deallocate_all(self)
    }
}

// A shared reference to a stateless allocator is as good as the allocator.
unsafe impl<A: StatelessAllocator> Allocator for &A {
    const ALIGNMENT: usize = A::ALIGNMENT;

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        A::instance().allocate(size)
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        A::instance().deallocate(blk)
    }
}

impl<A: StatelessAllocator + OwningAllocator> OwningAllocator for &A {
    fn owns(&self, blk: MemoryBlock) -> bool {
        A::owns(self, blk)
    }
}

impl<A: StatelessAllocator + AlignedAllocator> AlignedAllocator for &A {
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        A::instance().allocate_aligned(size, align)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{heap::HeapAllocator, stack::StackAllocator};

    #[test]
    fn typed_helpers() {
        let mut a = StackAllocator::<64>::new();
        let one = a.allocate_one::<u32>();
        assert_eq!(one.len(), 4);
        let many = a.allocate_array::<u16>(8);
        assert_eq!(many.len(), 16);
        assert!(a.allocate_array::<u64>(usize::MAX).is_null());
    }

    #[test]
    fn aligned_helpers() {
        let mut a = StackAllocator::<64>::new();
        let _pad = a.allocate(1);
        let blk = a.allocate_aligned_one::<u64>();
        assert_eq!(blk.len(), 8);
        assert_eq!(blk.ptr() as usize % mem::align_of::<u64>(), 0);
        let arr = a.allocate_aligned_array::<u32>(3);
        assert_eq!(arr.len(), 12);
        assert_eq!(arr.ptr() as usize % 4, 0);
    }

    #[test]
    fn try_helpers() {
        let mut heap = HeapAllocator;
        let p = heap.try_allocate_one::<u64>().unwrap();
        unsafe {
            p.as_ptr().write(42);
            assert_eq!(p.as_ptr().read(), 42);
            heap.deallocate(MemoryBlock::new(p.as_ptr().cast(), 8));
        }

        match heap.try_allocate_array::<u32>(usize::MAX) {
            Err(Error::ArrayOverflow { items, size }) => {
                assert_eq!(items, usize::MAX);
                assert_eq!(size, 4);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn try_helpers_respect_alignment() {
        let mut stack = StackAllocator::<64>::new();
        match stack.try_allocate_one::<u64>() {
            Err(Error::Misaligned { align, guaranteed }) => {
                assert_eq!(align, mem::align_of::<u64>());
                assert_eq!(guaranteed, 1);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(stack.try_allocate_array::<u8>(128).is_err());
        assert!(stack.try_allocate_array::<u8>(64).is_ok());
    }

    #[test]
    fn through_mutable_reference() {
        fn round_trip<A: OwningAllocator>(mut a: A) {
            let blk = a.allocate(8);
            assert!(a.owns(blk));
            unsafe { a.deallocate(blk) };
        }

        let mut stack = StackAllocator::<32>::new();
        round_trip(&mut stack);
        assert_eq!(stack.used(), 0);
    }
}
