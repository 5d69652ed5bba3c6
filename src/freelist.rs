//! A pool of fixed-size blocks kept for reuse.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator},
    block::MemoryBlock,
    layout_ext,
};
use log::{debug, trace};
use std::{fmt, mem, ptr, ptr::NonNull};

/// Caches freed blocks whose length lies in `MIN..=MAX` and hands them out
/// again before asking the parent `A` for memory.
///
/// Every request in range is served with a block of exactly `MAX` bytes. When
/// the cache is empty a chunk of `BATCH` nodes is fetched from the parent at
/// once, until `MAX_NODES` nodes have been carved that way; after that, single
/// `MAX`-byte blocks are fetched instead. Carved nodes always return to the
/// cache, single blocks only while carved and cached single blocks together
/// number fewer than `MAX_NODES`; the surplus goes back to the parent. The pool
/// thus never holds more than `MAX_NODES` nodes. Requests out of range go
/// straight to the parent.
///
/// Blocks are released to the parent in no particular order, so the parent
/// must not require ordered deallocation. Free nodes are linked through their
/// own first bytes.
pub struct FreelistAllocator<
    A: Allocator,
    const MIN: usize,
    const MAX: usize,
    const BATCH: usize = 8,
    const MAX_NODES: usize = 64,
> {
    parent: A,
    // Free nodes carved from chunks.
    head: Option<NonNull<u8>>,
    // Free single blocks fetched once the carving budget ran out.
    spare: Option<NonNull<u8>>,
    spares: usize,
    cached: usize,
    // Most recently fetched chunk; each chunk links to the previous one through
    // a trailer placed after its nodes.
    chunks: Option<NonNull<u8>>,
    carved: usize,
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize>
    FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: Allocator,
{
    const VALID: () = {
        assert!(MIN <= MAX, "the cached size range is empty");
        assert!(
            MAX >= mem::size_of::<*mut u8>(),
            "a cached block cannot hold a free list link"
        );
        assert!(BATCH > 0, "a refill has to carve at least one node");
    };

    const NODES_LEN: usize = match BATCH.checked_mul(MAX) {
        Some(len) => len,
        None => panic!("a chunk of nodes overflows the address space"),
    };

    const CHUNK_LEN: usize = match Self::NODES_LEN.checked_add(mem::size_of::<*mut u8>()) {
        Some(len) => len,
        None => panic!("a chunk of nodes overflows the address space"),
    };

    pub const fn new(parent: A) -> Self {
        let () = Self::VALID;
        FreelistAllocator {
            parent,
            head: None,
            spare: None,
            spares: 0,
            cached: 0,
            chunks: None,
            carved: 0,
        }
    }

    /// Number of blocks currently waiting in the cache.
    #[inline]
    pub fn cached(&self) -> usize {
        self.cached
    }

    pub fn parent(&self) -> &A {
        &self.parent
    }

    #[inline]
    fn in_range(size: usize) -> bool {
        MIN <= size && size <= MAX
    }

    /// Location of the link to the previous chunk.
    #[inline]
    unsafe fn trailer(chunk: NonNull<u8>) -> *mut *mut u8 {
        chunk.as_ptr().add(Self::NODES_LEN) as *mut *mut u8
    }

    fn unlink(list: &mut Option<NonNull<u8>>) -> Option<NonNull<u8>> {
        let node = (*list)?;
        *list = NonNull::new(unsafe { (node.as_ptr() as *mut *mut u8).read_unaligned() });
        Some(node)
    }

    /// # Safety
    ///
    /// `node` must point to `MAX` unused bytes.
    unsafe fn link(list: &mut Option<NonNull<u8>>, node: NonNull<u8>) {
        let next = list.map_or(ptr::null_mut(), NonNull::as_ptr);
        (node.as_ptr() as *mut *mut u8).write_unaligned(next);
        *list = Some(node);
    }

    fn pop(&mut self) -> Option<NonNull<u8>> {
        let node = match Self::unlink(&mut self.head) {
            Some(node) => node,
            None => {
                let node = Self::unlink(&mut self.spare)?;
                self.spares -= 1;
                node
            }
        };
        self.cached -= 1;
        Some(node)
    }

    /// # Safety
    ///
    /// `node` must be an unused node carved from one of the chunks.
    unsafe fn push(&mut self, node: NonNull<u8>) {
        Self::link(&mut self.head, node);
        self.cached += 1;
    }

    /// Keeps a single block for reuse if the node budget allows it.
    ///
    /// # Safety
    ///
    /// `node` must be an unused `MAX`-byte block of the parent.
    unsafe fn keep_spare(&mut self, node: NonNull<u8>) -> bool {
        if self.carved + self.spares >= MAX_NODES {
            return false;
        }
        Self::link(&mut self.spare, node);
        self.spares += 1;
        self.cached += 1;
        true
    }

    /// Checks whether `node` was carved from one of the chunks.
    fn is_carved(&self, node: *mut u8) -> bool {
        let addr = node as usize;
        let mut chunk = self.chunks;
        while let Some(base) = chunk {
            let start = base.as_ptr() as usize;
            if addr >= start && addr < start + Self::NODES_LEN {
                return true;
            }
            chunk = NonNull::new(unsafe { Self::trailer(base).read_unaligned() });
        }
        false
    }

    /// Fetches memory from the parent for an empty cache and returns one node.
    fn refill(&mut self) -> Option<NonNull<u8>> {
        if MAX_NODES - self.carved < BATCH {
            trace!("carving budget spent, fetching a single {}-byte block", MAX);
            return self.parent.allocate(MAX).as_non_null();
        }

        let base = self.parent.allocate(Self::CHUNK_LEN).as_non_null()?;
        unsafe {
            let previous = self.chunks.map_or(ptr::null_mut(), NonNull::as_ptr);
            Self::trailer(base).write_unaligned(previous);
            for i in (1..BATCH).rev() {
                self.push(NonNull::new_unchecked(base.as_ptr().add(i * MAX)));
            }
        }
        self.chunks = Some(base);
        self.carved += BATCH;
        debug!(
            "carved {} nodes of {} bytes from {:?} ({} carved so far)",
            BATCH, MAX, base, self.carved
        );
        Some(base)
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize> Default
    for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::new(A::default())
    }
}

unsafe impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize>
    Allocator for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: Allocator,
{
    // Nodes sit `MAX` bytes apart inside a chunk.
    const ALIGNMENT: usize =
        layout_ext::min_alignment(A::ALIGNMENT, layout_ext::alignment_of_size(MAX));

    fn allocate(&mut self, size: usize) -> MemoryBlock {
        if !Self::in_range(size) {
            return self.parent.allocate(size);
        }
        match self.pop().or_else(|| self.refill()) {
            Some(node) => MemoryBlock::new(node.as_ptr(), MAX),
            None => MemoryBlock::null(),
        }
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        let node = match blk.as_non_null() {
            Some(node) => node,
            None => return,
        };
        if !Self::in_range(blk.len()) {
            return self.parent.deallocate(blk);
        }
        if self.is_carved(node.as_ptr()) {
            self.push(node);
        } else if !self.keep_spare(node) {
            trace!("cache is full, releasing {:?}", blk);
            self.parent.deallocate(MemoryBlock::new(node.as_ptr(), MAX));
        }
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize>
    OwningAllocator for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: OwningAllocator,
{
    fn owns(&self, blk: MemoryBlock) -> bool {
        if Self::in_range(blk.len()) {
            self.parent.owns(MemoryBlock::new(blk.ptr(), MAX))
        } else {
            self.parent.owns(blk)
        }
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize>
    AlignedAllocator for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: AlignedAllocator,
{
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        if !Self::in_range(size) {
            return self.parent.allocate_aligned(size, align);
        }
        if layout_ext::is_valid_alignment(align) && align <= Self::ALIGNMENT {
            return self.allocate(size);
        }
        // Invalid alignments are reported by the parent.
        self.parent.allocate_aligned(MAX, align)
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize>
    BulkFreeAllocator for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: BulkFreeAllocator,
{
    fn deallocate_all(&mut self) {
        self.head = None;
        self.spare = None;
        self.spares = 0;
        self.cached = 0;
        self.chunks = None;
        self.carved = 0;
        self.parent.deallocate_all();
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize> Drop
    for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: Allocator,
{
    fn drop(&mut self) {
        while let Some(node) = Self::unlink(&mut self.spare) {
            unsafe { self.parent.deallocate(MemoryBlock::new(node.as_ptr(), MAX)) };
        }
        while let Some(base) = self.chunks {
            unsafe {
                self.chunks = NonNull::new(Self::trailer(base).read_unaligned());
                self.parent
                    .deallocate(MemoryBlock::new(base.as_ptr(), Self::CHUNK_LEN));
            }
            trace!("released chunk {:?}", base);
        }
    }
}

impl<A, const MIN: usize, const MAX: usize, const BATCH: usize, const MAX_NODES: usize> fmt::Debug
    for FreelistAllocator<A, MIN, MAX, BATCH, MAX_NODES>
where
    A: Allocator + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreelistAllocator")
            .field("parent", &self.parent)
            .field("sizes", &(MIN..=MAX))
            .field("cached", &self.cached)
            .field("spares", &self.spares)
            .field("carved", &self.carved)
            .finish()
    }
}
