//! # Error Handling
//!
//! The public API keeps a C-flavored contract: `malloc`/`calloc`/
//! `realloc` return a raw, possibly-null pointer, never a `Result`. This
//! mirrors the original `mm_malloc`/`mm_calloc`/`mm_realloc`, which also
//! return a raw pointer rather than wrapping failure in a `Result`.
//!
//! What *is* idiomatic Rust here is recording *why* the last failure
//! happened, queryable after the fact — the typed analogue of checking
//! `errno` after a C allocator call returns `NULL`.

/// Why the most recent fallible operation on a [`crate::heap::KrHeap`]
/// returned a null pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The free list could not satisfy the request and the backing
  /// [`crate::region::Region`] refused to grow any further.
  OutOfMemory,
  /// `calloc`'s `count * size` overflowed `usize` before a request was
  /// ever made to the free list.
  Overflow,
}
