//! Bump allocation out of an inline buffer.

use crate::{
    alloc::{AlignedAllocator, Allocator, BulkFreeAllocator, OwningAllocator},
    block::MemoryBlock,
    contract::{DefaultHandler, FailureHandler},
    layout_ext,
};
use std::{cell::UnsafeCell, fmt, mem, mem::MaybeUninit};

#[repr(C, align(16))]
struct Buffer<const S: usize>(UnsafeCell<[MaybeUninit<u8>; S]>);

// Written at the end of an aligned block's padding: the padding length and the
// depth of the previous padded block.
type Header = [usize; 2];

const HEADER_LEN: usize = mem::size_of::<Header>();

const NOT_PADDED: usize = usize::MAX;

/// Serves requests from `S` bytes of storage embedded in the allocator by
/// advancing a cursor.
///
/// Blocks must be released in the reverse order of their allocation, or all
/// at once with [`BulkFreeAllocator::deallocate_all`]. Releasing any other
/// block is a contract violation, reported to the failure handler `H`.
///
/// An aligned block that needs padding gets at least `2 * size_of::<usize>()`
/// bytes of it, and the last of those bytes record how far the cursor has to
/// move back once the block is released. Releasing a block therefore returns
/// its padding too.
///
/// Since the storage lives inside the allocator, the allocator must not be
/// moved while any of its blocks are live.
// The fields after the buffer keep its one-past-the-end address from starting
// another allocator's storage.
#[repr(C)]
pub struct StackAllocator<const S: usize, H: FailureHandler = DefaultHandler> {
    buffer: Buffer<S>,
    // Offset of the first free byte.
    cursor: usize,
    // Number of blocks handed out and not yet released.
    live: usize,
    // Depth of the topmost live block preceded by a header.
    padded: usize,
    handler: H,
}

impl<const S: usize> StackAllocator<S> {
    pub const fn new() -> Self {
        Self::with_handler(DefaultHandler)
    }
}

impl<const S: usize> Default for StackAllocator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const S: usize, H: FailureHandler> StackAllocator<S, H> {
    pub const fn with_handler(handler: H) -> Self {
        StackAllocator {
            buffer: Buffer(UnsafeCell::new([MaybeUninit::uninit(); S])),
            cursor: 0,
            live: 0,
            padded: NOT_PADDED,
            handler,
        }
    }

    /// Total number of bytes the allocator can hand out.
    #[inline]
    pub const fn capacity(&self) -> usize {
        S
    }

    /// Number of bytes consumed by live blocks and their alignment padding.
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        S - self.cursor
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.buffer.0.get() as *mut u8
    }

    /// Hands out `size` bytes located `padding` bytes past the cursor.
    ///
    /// A non-zero `padding` must be at least `HEADER_LEN`.
    fn bump(&mut self, padding: usize, size: usize) -> MemoryBlock {
        let offset = match self.cursor.checked_add(padding) {
            Some(offset) => offset,
            None => return MemoryBlock::null(),
        };
        match offset.checked_add(size) {
            Some(end) if end <= S => {}
            _ => return MemoryBlock::null(),
        }

        // `offset <= S`: a zero-length block may point one past the buffer.
        let ptr = unsafe { self.base().add(offset) };
        if padding != 0 {
            debug_assert!(padding >= HEADER_LEN);
            let header: Header = [padding, self.padded];
            unsafe { (ptr.sub(HEADER_LEN) as *mut Header).write_unaligned(header) };
            self.padded = self.live;
        }
        self.cursor = offset + size;
        self.live += 1;
        MemoryBlock::new(ptr, size)
    }

    /// Padding placing a block at a multiple of `align`, leaving room for a
    /// header whenever there is any padding at all.
    fn padding_for(&self, align: usize) -> usize {
        let top = self.base() as usize + self.cursor;
        match layout_ext::padding_needed_for(top, align) {
            0 => 0,
            padding if padding >= HEADER_LEN => padding,
            _ => HEADER_LEN + layout_ext::padding_needed_for(top.wrapping_add(HEADER_LEN), align),
        }
    }
}

unsafe impl<const S: usize, H: FailureHandler> Allocator for StackAllocator<S, H> {
    fn allocate(&mut self, size: usize) -> MemoryBlock {
        self.bump(0, size)
    }

    unsafe fn deallocate(&mut self, blk: MemoryBlock) {
        if blk.is_null() {
            return;
        }
        if !contract!(
            self.handler,
            self.owns(blk),
            "{:?} was not allocated by this stack",
            blk
        ) {
            return;
        }

        let start = blk.ptr() as usize - self.base() as usize;
        let end = start + blk.len();
        if !contract!(
            self.handler,
            self.live > 0 && end == self.cursor,
            "{:?} was deallocated out of order",
            blk
        ) {
            return;
        }

        self.live -= 1;
        if self.padded == self.live && start >= HEADER_LEN {
            let header = self.base().add(start - HEADER_LEN) as *const Header;
            let [padding, previous] = header.read_unaligned();
            self.padded = previous;
            self.cursor = start.saturating_sub(padding);
        } else {
            self.cursor = start;
        }
    }
}

impl<const S: usize, H: FailureHandler> OwningAllocator for StackAllocator<S, H> {
    fn owns(&self, blk: MemoryBlock) -> bool {
        if blk.is_null() {
            return false;
        }
        let base = self.base() as usize;
        let start = blk.ptr() as usize;
        start >= base && blk.end() <= base + S
    }
}

impl<const S: usize, H: FailureHandler> AlignedAllocator for StackAllocator<S, H> {
    fn allocate_aligned(&mut self, size: usize, align: usize) -> MemoryBlock {
        if !contract!(
            self.handler,
            layout_ext::is_valid_alignment(align),
            "alignment {} is not a power of two",
            align
        ) {
            return MemoryBlock::null();
        }
        let padding = self.padding_for(align);
        self.bump(padding, size)
    }
}

impl<const S: usize, H: FailureHandler> BulkFreeAllocator for StackAllocator<S, H> {
    fn deallocate_all(&mut self) {
        self.cursor = 0;
        self.live = 0;
        self.padded = NOT_PADDED;
    }
}

impl<const S: usize, H: FailureHandler> fmt::Debug for StackAllocator<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAllocator")
            .field("base", &self.base())
            .field("capacity", &S)
            .field("cursor", &self.cursor)
            .field("live", &self.live)
            .finish()
    }
}
