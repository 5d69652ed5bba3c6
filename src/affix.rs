//! Metadata attached before and after each block.

use crate::{
    alloc::{Allocator, BulkFreeAllocator, OwningAllocator, StatelessAllocator},
    block::MemoryBlock,
    layout_ext,
};
use std::{fmt, marker::PhantomData, mem, mem::MaybeUninit};

/// Grows every allocation of the parent `A` by room for a `P` in front of the
/// block and an `S` behind it.
///
/// The block handed to the caller spans exactly the requested bytes; the
/// affixes are reached with [`prefix`](AffixAllocator::prefix) and
/// [`suffix`](AffixAllocator::suffix). Only raw storage is provided: nothing
/// is constructed or dropped in the affix slots.
///
/// The prefix sits at the start of the parent block, so the parent has to
/// guarantee the prefix alignment. The suffix follows the caller's bytes,
/// rounded up to its own alignment.
pub struct AffixAllocator<A: Allocator, P = (), S = ()> {
    parent: A,
    _affixes: PhantomData<(fn() -> P, fn() -> S)>,
}

impl<A: Allocator, P, S> AffixAllocator<A, P, S> {
    const VALID: () = assert!(
        mem::size_of::<P>() == 0 || A::ALIGNMENT >= mem::align_of::<P>(),
        "the parent allocator does not guarantee the prefix alignment"
    );

    const HAS_PREFIX: () = assert!(mem::size_of::<P>() != 0, "the prefix type is empty");
    const HAS_SUFFIX: () = assert!(mem::size_of::<S>() != 0, "the suffix type is empty");

    const PREFIX_LEN: usize = mem::size_of::<P>();

    // Worst case padding between the caller's bytes and the suffix.
    const SUFFIX_SLACK: usize = if mem::size_of::<S>() == 0 {
        0
    } else {
        mem::align_of::<S>() - 1
    };

    const SUFFIX_LEN: usize = mem::size_of::<S>();

    pub const fn new(parent: A) -> Self {
        let () = Self::VALID;
        AffixAllocator {
            parent,
            _affixes: PhantomData,
        }
    }

    pub fn parent(&self) -> &A {
        &self.parent
    }

    /// Size of the parent block carrying `size` bytes for the caller.
    fn outer_len(size: usize) -> Option<usize> {
        Self::PREFIX_LEN
            .checked_add(size)?
            .checked_add(Self::SUFFIX_SLACK)?
            .checked_add(Self::SUFFIX_LEN)
    }

    /// The parent block a caller's block was carved from.
    fn outer(blk: MemoryBlock) -> MemoryBlock {
        let len = Self::PREFIX_LEN
            .saturating_add(blk.len())
            .saturating_add(Self::SUFFIX_SLACK + Self::SUFFIX_LEN);
        MemoryBlock::new(blk.ptr().wrapping_sub(Self::PREFIX_LEN), len)
    }

    /// The prefix slot of `blk`.
    ///
    /// Using this on an allocator without a prefix type fails to compile.
    ///
    /// # Safety
    ///
    /// `blk` must be a live block returned by this allocator, and the returned
    /// reference must not outlive it or alias another reference to the slot.
    pub unsafe fn prefix<'a>(&self, blk: MemoryBlock) -> &'a mut MaybeUninit<P> {
        let () = Self::HAS_PREFIX;
        &mut *(blk.ptr().sub(Self::PREFIX_LEN) as *mut MaybeUninit<P>)
    }

    /// The suffix slot of `blk`.
    ///
    /// Using this on an allocator without a suffix type fails to compile.
    ///
    /// # Safety
    ///
    /// Same as for [`prefix`](AffixAllocator::prefix).
    pub unsafe fn suffix<'a>(&self, blk: MemoryBlock) -> &'a mut MaybeUninit<S> {
        let () = Self::HAS_SUFFIX;
        let addr = layout_ext::align_up(blk.end(), mem::align_of::<S>());
        &mut *(addr as *mut MaybeUninit<S>)
    }
}

impl<A: Allocator + Default, P, S> Default for AffixAllocator<A, P, S> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: Allocator + Clone, P, S> Clone for AffixAllocator<A, P, S> {
    fn clone(&self) -> Self {
        Self::new(self.parent.clone())
    }
}

impl<A: Allocator + Copy, P, S> Copy for AffixAllocator<A, P, S> {}

impl<A: Allocator + fmt::Debug, P, S> fmt::Debug for AffixAllocator<A, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffixAllocator")
            .field("parent", &self.parent)
            .field("prefix", &Self::PREFIX_LEN)
            .field("suffix", &Self::SUFFIX_LEN)
            .finish()
    }
}

unsafe impl<A: Allocator, P, S> Allocator for AffixAllocator<A, P, S> {
    // Caller blocks start right after the prefix.
    const ALIGNMENT: usize = layout_ext::min_alignment(
        A::ALIGNMENT,
        layout_ext::alignment_of_size(mem::size_of::<P>()),
    );

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        let outer = match Self::outer_len(size) {
            Some(len) => self.parent.allocate(len),
            None => return MemoryBlock::null(),
        };
        if outer.is_null() {
            return outer;
        }
        // The parent block holds at least `PREFIX_LEN + size` bytes.
        MemoryBlock::new(unsafe { outer.ptr().add(Self::PREFIX_LEN) }, size)
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if blk.is_null() {
            return;
        }
        self.parent.deallocate(Self::outer(blk))
    }
}

impl<A: OwningAllocator, P, S> OwningAllocator for AffixAllocator<A, P, S> {
    fn owns(&self, blk: MemoryBlock) -> bool {
        if blk.is_null() {
            return self.parent.owns(blk);
        }
        self.parent.owns(Self::outer(blk))
    }
}

impl<A: BulkFreeAllocator, P, S> BulkFreeAllocator for AffixAllocator<A, P, S> {
    fn deallocate_all(&mut self) {
        self.parent.deallocate_all()
    }
}

impl<A: StatelessAllocator, P, S> StatelessAllocator for AffixAllocator<A, P, S> {
    const INSTANCE: Self = AffixAllocator::new(A::INSTANCE);
}
