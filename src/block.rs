//! The memory block descriptor passed between allocators and their clients.

use std::{fmt, ptr::NonNull, slice};

/// A contiguous range of bytes: a starting address and a length.
///
/// A block does not own the memory it describes. Whoever produced it is the
/// only valid target for the matching `deallocate` call.
///
/// The canonical "no allocation" value is [`MemoryBlock::null`]: a null
/// pointer and a zero length.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryBlock {
    ptr: *mut u8,
    len: usize,
}

/// Short name for [`MemoryBlock`].
pub type Blk = MemoryBlock;

impl MemoryBlock {
    /// The failed allocation.
    #[inline]
    pub const fn null() -> Self {
        MemoryBlock {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Describes `len` bytes starting at `ptr`.
    #[inline]
    pub const fn new(ptr: *mut u8, len: usize) -> Self {
        MemoryBlock { ptr, len }
    }

    #[inline]
    pub const fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the block describes no allocation at all.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Checks whether the block spans no bytes. A zero-length block may still
    /// be a successful allocation.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_non_null(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.ptr)
    }

    /// Address of the first byte past the block.
    #[inline]
    pub fn end(&self) -> usize {
        (self.ptr as usize).wrapping_add(self.len)
    }

    /// Checks whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &MemoryBlock) -> bool {
        !self.is_null()
            && !other.is_null()
            && other.ptr as usize >= self.ptr as usize
            && other.end() <= self.end()
    }

    /// Views the block as a byte slice.
    ///
    /// # Safety
    ///
    /// The block must be a live, non-null allocation whose bytes have been
    /// initialized, and no mutable view of it may exist.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        slice::from_raw_parts(self.ptr, self.len)
    }

    /// Views the block as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The block must be a live, non-null allocation whose bytes have been
    /// initialized, and no other view of it may exist.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        slice::from_raw_parts_mut(self.ptr, self.len)
    }
}

impl Default for MemoryBlock {
    fn default() -> Self {
        MemoryBlock::null()
    }
}

impl fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryBlock(ptr={:?}, length={})", self.ptr, self.len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_is_default() {
        let b = MemoryBlock::default();
        assert!(b.is_null());
        assert!(b.is_empty());
        assert_eq!(b, MemoryBlock::null());
        assert_eq!(b.as_non_null(), None);
    }

    #[test]
    fn containment() {
        let mut bytes = [0u8; 32];
        let outer = MemoryBlock::new(bytes.as_mut_ptr(), 32);
        let inner = MemoryBlock::new(unsafe { bytes.as_mut_ptr().add(8) }, 24);
        let past = MemoryBlock::new(unsafe { bytes.as_mut_ptr().add(8) }, 25);
        assert!(outer.contains(&inner));
        assert!(!outer.contains(&past));
        assert!(!outer.contains(&MemoryBlock::null()));
        assert_eq!(outer.end(), inner.end());
    }

    #[test]
    fn debug_output() {
        let text = format!("{:?}", MemoryBlock::null());
        assert!(text.starts_with("MemoryBlock(ptr="));
        assert!(text.ends_with("length=0)"));
    }
}
