//! Alignment arithmetic shared by the allocators.
//!
//! Everything here works on plain addresses and sizes; callers are
//! responsible for only passing valid alignments (see [`is_valid_alignment`]).

/// Checks that `align` is a usable alignment, i.e. a non-zero power of two.
#[inline]
pub const fn is_valid_alignment(align: usize) -> bool {
    align != 0 && align & (align - 1) == 0
}

/// Number of bytes that have to be skipped from `addr` to reach the next
/// multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn padding_needed_for(addr: usize, align: usize) -> usize {
    // Rounded up value is:
    //   addr_rounded_up = (addr + align - 1) & !(align - 1);
    // and then we return the padding difference: `addr_rounded_up - addr`.
    //
    // `addr + align - 1` can overflow by at most `align - 1`, in which case
    // the mask brings `addr_rounded_up` to 0 and the wrapping difference is
    // still the distance to the next boundary modulo the address space. Such
    // an address can never be followed by a usable block, so the caller's
    // capacity check rejects it anyway.
    let addr_rounded_up = addr.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1);
    addr_rounded_up.wrapping_sub(addr)
}

/// Rounds `addr` up to a multiple of `align`.
#[inline]
pub const fn align_up(addr: usize, align: usize) -> usize {
    addr.wrapping_add(padding_needed_for(addr, align))
}

/// The largest power of two dividing `size`, i.e. the alignment preserved
/// when stepping over `size` bytes from an aligned address.
///
/// A zero size preserves every alignment; the largest representable power of
/// two is returned for it.
#[inline]
pub const fn alignment_of_size(size: usize) -> usize {
    if size == 0 {
        1 << (usize::BITS - 1)
    } else {
        size & size.wrapping_neg()
    }
}

#[inline]
pub const fn min_alignment(a: usize, b: usize) -> usize {
    if a < b {
        a
    } else {
        b
    }
}
