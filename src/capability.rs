//! Compile-time questions about allocator types.
//!
//! The capability traits in [`crate::alloc`] are the predicates themselves;
//! this module adds ways to ask them:
//!
//! * [`supports!`](crate::supports) evaluates to a `bool` saying whether a
//!   concrete type implements a capability;
//! * [`assert_allocator!`](crate::assert_allocator) refuses to build unless a
//!   type implements the listed capabilities;
//! * [`is_stateless`] and [`state_size`] report how much state a type carries.

use std::{marker::PhantomData, mem};

/// Size of the state carried by `T`; zero for empty types.
#[inline]
pub const fn state_size<T>() -> usize {
    mem::size_of::<T>()
}

/// Checks whether `T` carries no state at all.
#[inline]
pub const fn is_stateless<T>() -> bool {
    state_size::<T>() == 0
}

/// Post-monomorphization check that `T` is zero-sized.
pub(crate) struct AssertStateless<T>(PhantomData<T>);

impl<T> AssertStateless<T> {
    pub(crate) const OK: () = assert!(
        is_stateless::<T>(),
        "a stateless allocator must be a zero-sized type"
    );
}

/// Evaluates to `true` when the concrete type implements the named capability
/// trait of this crate, and to `false` otherwise.
///
/// The answer is decided during type checking, so the expression folds to a
/// constant.
///
/// ```rust
/// use alloc_blocks::{supports, HeapAllocator, StackAllocator};
///
/// assert!(supports!(StackAllocator<64>, OwningAllocator));
/// assert!(supports!(StackAllocator<64>, BulkFreeAllocator));
/// assert!(!supports!(HeapAllocator, OwningAllocator));
/// assert!(supports!(HeapAllocator, StatelessAllocator));
/// ```
#[macro_export]
macro_rules! supports {
    ($ty:ty, $capability:ident) => {{
        struct Probe<T>(::std::marker::PhantomData<T>);

        trait Implemented {
            fn answer(&self) -> bool {
                true
            }
        }
        impl<T: $crate::$capability> Implemented for Probe<T> {}

        trait Missing {
            fn answer(&self) -> bool {
                false
            }
        }
        impl<T> Missing for &Probe<T> {}

        // Method lookup tries `Probe<T>` before auto-referencing to
        // `&Probe<T>`, so `Implemented` wins whenever its bound holds.
        (&Probe::<$ty>(::std::marker::PhantomData)).answer()
    }};
}

/// Fails to compile unless the type is an allocator with all of the listed
/// capabilities.
///
/// ```rust
/// use alloc_blocks::{assert_allocator, FallbackAllocator, HeapAllocator, StackAllocator};
///
/// assert_allocator!(StackAllocator<64>: OwningAllocator, AlignedAllocator, BulkFreeAllocator);
/// assert_allocator!(FallbackAllocator<StackAllocator<64>, HeapAllocator>);
/// ```
///
/// ```compile_fail
/// use alloc_blocks::{assert_allocator, HeapAllocator};
///
/// assert_allocator!(HeapAllocator: OwningAllocator);
/// ```
#[macro_export]
macro_rules! assert_allocator {
    ($ty:ty $(: $($capability:ident),+)?) => {
        const _: fn() = || {
            fn check<T: $crate::Allocator $($(+ $crate::$capability)+)?>() {}
            check::<$ty>();
        };
    };
}
