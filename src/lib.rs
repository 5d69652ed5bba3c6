//! Composable allocator building blocks.
//!
//! Each allocator here does one thing (bump a cursor, call the C heap, cache
//! fixed-size blocks, ...) and the composites combine them into the allocator
//! an application actually needs. Which operations a composite supports is
//! decided at compile time from what its children support.
//!
//! ```rust
//! use alloc_blocks::{
//!     Allocator, FallbackAllocator, HeapAllocator, OwningAllocator, SegregateAllocator,
//!     StackAllocator,
//! };
//!
//! // Small requests come from an inline buffer while it lasts, everything else
//! // from the heap.
//! let mut a = SegregateAllocator::<128, _, _>::new(
//!     FallbackAllocator::new(StackAllocator::<1024>::new(), HeapAllocator),
//!     HeapAllocator,
//! );
//!
//! let small = a.allocate(100);
//! let large = a.allocate(4096);
//! assert!(a.small().primary().owns(small));
//! assert_eq!(large.len(), 4096);
//!
//! unsafe {
//!     a.deallocate(large);
//!     a.deallocate(small);
//! }
//! ```

#[macro_use]
pub mod contract;

pub mod affix;
pub mod alloc;
pub mod block;
pub mod capability;
pub mod fallback;
pub mod freelist;
pub mod heap;
pub mod layout_ext;
pub mod null;
pub mod segregator;
pub mod stack;

#[cfg(test)]
mod testing;

pub use affix::AffixAllocator;
pub use alloc::{
    AlignedAllocator, Allocator, BulkFreeAllocator, Error, OwningAllocator, StatelessAllocator,
};
pub use block::{Blk, MemoryBlock};
pub use contract::{
    ContinueHandler, DefaultHandler, FailureHandler, RaiseHandler, Response, Violation,
};
pub use fallback::FallbackAllocator;
pub use freelist::FreelistAllocator;
pub use heap::{AlignedHeapAllocator, HeapAllocator, ALIGNED_HEAP, HEAP};
pub use null::NullAllocator;
pub use segregator::SegregateAllocator;
pub use stack::StackAllocator;
