//! # kralloc - A K&R-Style Free-List Memory Allocator
//!
//! This crate provides a first-fit, boundary-tag free-list allocator in
//! the style of the classic K&R `malloc`/`free`, managing memory grown
//! from a pluggable [`Region`] (typically `sbrk(2)` on Unix).
//!
//! ## Overview
//!
//! Unlike a bump allocator, freed blocks are tracked on a circular,
//! doubly-linked free list and can be reused by later allocations:
//!
//! ```text
//!   Free-List Allocator Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬───────────┬─────┬───────────┬─────┬────────────────────┐  │
//!   │   │ A1  │  free (f1)│ A2  │  free (f2)│ A3  │     untouched      │  │
//!   │   └─────┴───────────┴─────┴───────────┴─────┴────────────────────┘  │
//!   │                ▲                 ▲                                  │
//!   │                └──────freep──────┘  (f1 <-> f2, circular)           │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   malloc searches the free list starting just after freep (first-fit),
//!   splitting a block that's bigger than needed and growing the region
//!   only once the whole list has been walked without success.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   kralloc
//!   ├── align     - Alignment helpers (align!, align_up, align_down)
//!   ├── region    - Region trait: SbrkRegion (real sbrk), BoundedRegion (tests)
//!   ├── block     - Header/footer cell layout, size accounting
//!   ├── freelist  - Circular doubly-linked free-list splice primitives
//!   ├── error     - AllocError, the errno-style failure reason
//!   └── heap      - KrHeap: malloc/free/realloc/calloc/lifecycle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kralloc::{KrHeap, SbrkRegion};
//!
//! fn main() {
//!     let mut heap = KrHeap::new(SbrkRegion::new());
//!     heap.init();
//!
//!     let p = heap.malloc(64) as *mut u64;
//!     unsafe {
//!         *p = 42;
//!         println!("Value: {}", *p);
//!     }
//!     heap.free(p as *mut u8);
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block carries a header and a footer cell of identical size,
//! recorded in units of `max_align_t`-sized [`Cell`](block)s:
//!
//! ```text
//!   Single Free Block:
//!   ┌───────────────────────┬────────────────────────┬─────────────────┐
//!   │    Header (1 unit)    │     Payload (N units)   │  Footer (1 unit) │
//!   │  ┌──────────────────┐ │                         │ ┌──────────────┐ │
//!   │  │ next: ptr/null   │ │   usable or free space  │ │ prev: ptr/null│ │
//!   │  │ size: N + 2      │ │                         │ │ size: N + 2  │ │
//!   │  └──────────────────┘ │                         │ └──────────────┘ │
//!   └───────────────────────┴─────────────────────────┴─────────────────┘
//!                            ▲
//!                            └── Pointer returned to user (payload())
//! ```
//!
//! An allocated block's header `next` field is kept nil; that's the only
//! free/allocated discriminator the engine relies on.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; wrap a
//!   `KrHeap` in your own mutex to share it across threads.
//! - **No shrink-in-place on realloc**: shrinking always returns the same
//!   pointer, but growing always moves, copies, and frees.
//! - **Unix-only production backend**: `SbrkRegion` requires `libc` and
//!   `sbrk` (POSIX systems); bring your own `Region` impl elsewhere.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! The public [`KrHeap`] API itself is safe to call; the `unsafe` lives in
//! [`block`] and [`region`], where raw pointers are threaded through the
//! heap's own storage.

pub mod align;
mod block;
mod error;
mod freelist;
mod heap;
mod region;

pub use error::AllocError;
pub use heap::KrHeap;
pub use region::{BoundedRegion, Region, SbrkRegion};
