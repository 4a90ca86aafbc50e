//! # Allocation Engine, Deallocation & Coalescing, Lifecycle
//!
//! [`KrHeap`] is the free-list allocator itself: first-fit search with
//! splitting on allocation, bidirectional coalescing on deallocation, and
//! the `realloc`/`calloc`/lifecycle operations built on top of those two.
//! It is a direct Rust port of `mm_malloc`/`mm_free`/`mm_realloc`/
//! `mm_calloc`/`morecore`/`visualize` in `mm_kr_heap.c`, generalized over
//! a [`Region`] instead of calling `sbrk` inline.
//!
//! Unlike the original's process-wide `static Header *freep`, every piece
//! of mutable state lives on the `KrHeap` value itself, so independent
//! heaps can coexist.

use std::ptr;

use crate::block::{Block, bytes_for, units_for};
use crate::error::AllocError;
use crate::region::Region;

/// A K&R-style free-list heap allocator growing its memory from a
/// [`Region`].
///
/// `R` is almost always [`crate::region::SbrkRegion`] in production code;
/// tests use [`crate::region::BoundedRegion`] so out-of-memory behavior is
/// reproducible without depending on the real process heap limit.
pub struct KrHeap<R: Region> {
  region: R,
  freep: Option<Block>,
  last_error: Option<AllocError>,
  trace: bool,
}

impl<R: Region> KrHeap<R> {
  /// Wraps `region` in a fresh, uninitialized heap. Call [`KrHeap::init`]
  /// before issuing any allocation.
  pub fn new(region: R) -> Self {
    Self { region, freep: None, last_error: None, trace: false }
  }

  /// Enables or disables the `trace` feature's pre/post-operation free
  /// list dumps (no-op unless this crate is built with `--features trace`).
  pub fn set_trace(
    &mut self,
    enabled: bool,
  ) {
    self.trace = enabled;
  }

  /// The [`AllocError`] that caused the most recent null return, if any.
  ///
  /// This is the typed analogue of checking `errno` after a C allocator
  /// call returns `NULL` (see `src/error.rs`). It is left set until the
  /// next failing call overwrites it; a successful call does not clear it.
  pub fn last_error(&self) -> Option<AllocError> {
    self.last_error
  }

  /// Initializes the backing region and empties the free list.
  ///
  /// Panics if the region's reported low bound is not unit-aligned — the
  /// whole block layout assumes every header/footer sits on a unit
  /// boundary (see the "Unit size and alignment" design note).
  pub fn init(&mut self) {
    self.region.init();
    assert_eq!(
      self.region.lo() as usize % crate::block::UNIT,
      0,
      "region base must be unit-aligned"
    );
    self.freep = None;
    self.last_error = None;
  }

  /// Resets the backing region to its initial bounds and empties the free
  /// list, without releasing the region entirely.
  pub fn reset(&mut self) {
    self.trace_dump("RESET");
    self.region.reset();
    self.freep = None;
  }

  /// Releases the backing region. A subsequent [`KrHeap::init`] is
  /// required before the heap can be used again.
  pub fn deinit(&mut self) {
    self.region.deinit();
    self.freep = None;
  }

  /// Total free bytes currently on the free list, including per-block
  /// header/footer overhead.
  pub fn getfree(&self) -> usize {
    let Some(head) = self.freep else {
      return 0;
    };
    let mut total = head.size();
    let mut p = head;
    loop {
      let next = p.next().expect("free block missing next pointer");
      if next == head {
        break;
      }
      total += next.size();
      p = next;
    }
    bytes_for(total)
  }

  /// Dumps the free list to stderr: one line per block with its address,
  /// size in units, and size in bytes. Purely diagnostic — ported from
  /// `visualize()` in `mm_kr_heap.c`.
  pub fn visualize(
    &self,
    msg: &str,
  ) {
    eprintln!("\n--- Free list after \"{msg}\":");

    let Some(head) = self.freep else {
      eprintln!("    List is empty or not exist\n");
      return;
    };

    if head.next() == Some(head) {
      eprintln!("    List has 1 block\n");
      eprintln!("    ptr: {:p} size: {:3} blks - {:5} bytes", head.as_ptr(), head.size(), bytes_for(head.size()));
      return;
    }

    let mut sep = "    ";
    let mut p = head.next().expect("free block missing next pointer");
    loop {
      eprintln!("{sep}ptr: {:p} size: {:3} blks - {:5} bytes", p.as_ptr(), p.size(), bytes_for(p.size()));
      sep = " -> ";
      if p == head {
        break;
      }
      p = p.next().expect("free block missing next pointer");
    }
    eprintln!("--- end\n");
  }

  fn trace_dump(
    &self,
    msg: &str,
  ) {
    #[cfg(feature = "trace")]
    if self.trace {
      self.visualize(msg);
    }
    #[cfg(not(feature = "trace"))]
    let _ = msg;
  }

  /// Allocates `nbytes` of payload, or returns null on out-of-memory.
  ///
  /// First-fit search over the circular free list, growing the heap via
  /// [`KrHeap::morecore`] whenever a full traversal finds nothing big
  /// enough. See `mm_malloc` in `mm_kr_heap.c` for the algorithm this is
  /// ported from.
  pub fn malloc(
    &mut self,
    nbytes: usize,
  ) -> *mut u8 {
    self.trace_dump("PRE-MALLOC");

    let n = units_for(nbytes);

    if self.freep.is_none() {
      match self.morecore(n) {
        Some(block) => self.freep = Some(block),
        None => {
          self.last_error = Some(AllocError::OutOfMemory);
          return ptr::null_mut();
        }
      }
    }

    let mut p = self.freep.unwrap().next().expect("free block missing next pointer");
    loop {
      if p.size() >= n {
        let result = if p.size() == n || p.size() == n + 1 {
          // Exact fit (the "+1" absorbs a remainder too small to host a
          // footer of its own).
          if self.freep == Some(p) {
            self.freep = p.prev();
          }
          crate::freelist::unlink(&mut self.freep, p);
          p
        } else {
          // Split: shrink p in place and carve the allocated tail off its
          // high end, so p's own address (and list linkage) never moves.
          let prev = p.prev().expect("free block missing prev pointer");
          let next = p.next().expect("free block missing next pointer");
          p.set_size(p.size() - n);
          p.set_prev(Some(prev));
          p.set_next(Some(next));
          let tail = unsafe { Block::from_raw(p.add_units(p.size())) };
          tail.set_size(n);
          tail.set_next(None);
          tail.set_prev(None);
          self.freep = Some(prev);
          tail
        };
        self.trace_dump("POST-MALLOC");
        return result.payload().as_ptr();
      }

      if Some(p) == self.freep {
        match self.morecore(n) {
          Some(grown) => {
            self.freep = Some(grown);
            p = grown;
          }
          None => {
            self.last_error = Some(AllocError::OutOfMemory);
            return ptr::null_mut();
          }
        }
      }

      p = p.next().expect("free block missing next pointer");
    }
  }

  /// Frees a payload pointer previously returned by `malloc`/`calloc`/
  /// `realloc` on this heap. A null pointer is a no-op.
  ///
  /// Coalesces with both neighbors before reinserting, so no two free
  /// blocks are ever left address-adjacent. Ported from `mm_free` in
  /// `mm_kr_heap.c`.
  pub fn free(
    &mut self,
    ap: *mut u8,
  ) {
    self.trace_dump("PRE-FREE");

    let Some(ap) = ptr::NonNull::new(ap) else {
      return;
    };
    let mut b = unsafe { Block::from_payload(ap) };

    assert!(
      b.size() > 0 && bytes_for(b.size()) <= self.region.size(),
      "free: block header is corrupted or does not belong to this heap"
    );

    if self.freep.is_none() {
      b.set_next(Some(b));
      b.set_prev(Some(b));
      self.freep = Some(b);
      return;
    }

    // Upper-neighbor coalesce: a block is free iff its header's next
    // field is non-nil.
    if let Some(upper) = b.after(self.region.hi()) {
      if upper.next().is_some() {
        if self.freep == Some(upper) {
          self.freep = upper.prev();
        }
        crate::freelist::unlink(&mut self.freep, upper);
        b.set_size(b.size() + upper.size());
        b.set_next(None);
        b.set_prev(None);
      }
    }

    // Lower-neighbor coalesce.
    if let Some(lower) = b.before(self.region.lo()) {
      if lower.next().is_some() {
        if self.freep == Some(lower) {
          self.freep = lower.prev();
        }
        crate::freelist::unlink(&mut self.freep, lower);
        lower.set_size(lower.size() + b.size());
        b.set_next(None);
        b.set_prev(None);
        lower.set_next(None);
        lower.set_prev(None);
        b = lower;
      }
    }

    crate::freelist::link(&mut self.freep, b, self.freep);
    self.freep = b.prev();

    self.trace_dump("POST-FREE");
  }

  /// Resizes the allocation at `ap` to `nbytes`, preserving its contents
  /// up to `min(old, new)` bytes. `ap == null` behaves as `malloc`.
  ///
  /// If the existing block already holds enough units, it is returned
  /// unchanged (no in-place shrink — see §4.F). Otherwise a fresh block
  /// is allocated, the old payload copied over, and the old block freed.
  pub fn realloc(
    &mut self,
    ap: *mut u8,
    nbytes: usize,
  ) -> *mut u8 {
    let Some(ap_nn) = ptr::NonNull::new(ap) else {
      return self.malloc(nbytes);
    };
    let b = unsafe { Block::from_payload(ap_nn) };

    if nbytes > 0 && b.size() >= units_for(nbytes) {
      return ap;
    }

    let new_ap = self.malloc(nbytes);
    if new_ap.is_null() {
      return ptr::null_mut();
    }

    // bytes_for(size - 2) subtracts both the header and footer unit; see
    // DESIGN.md for why this departs from the original's off-by-one.
    let old_payload_bytes = bytes_for(b.size().saturating_sub(2));
    let copy_len = old_payload_bytes.min(nbytes);
    unsafe {
      ptr::copy_nonoverlapping(ap, new_ap, copy_len);
    }
    self.free(ap);
    new_ap
  }

  /// Allocates `count * size` zero-filled bytes, or null on overflow or
  /// out-of-memory.
  pub fn calloc(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(nbytes) = count.checked_mul(size) else {
      self.last_error = Some(AllocError::Overflow);
      return ptr::null_mut();
    };

    let p = self.malloc(nbytes);
    if !p.is_null() {
      unsafe {
        ptr::write_bytes(p, 0, nbytes);
      }
    }
    p
  }

  /// Grows the heap by at least `n` units (rounded up to a whole number
  /// of host pages), then hands the new span straight to [`KrHeap::free`]
  /// so it immediately coalesces with any abutting free tail block.
  /// Returns the resulting free-list head.
  fn morecore(
    &mut self,
    n: usize,
  ) -> Option<Block> {
    let unit = crate::block::UNIT;
    let nalloc = (self.region.pagesize() / unit).max(1);
    let n = n.max(nalloc);
    let nbytes = bytes_for(n);

    let raw = self.region.sbrk(nbytes)?;
    let block = unsafe { Block::from_raw(raw.as_ptr()) };
    block.set_size(n);
    self.free(block.payload().as_ptr());

    self.freep
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::region::BoundedRegion;

  const PAGE: usize = 256;

  fn heap_with_capacity(capacity: usize) -> KrHeap<BoundedRegion> {
    let mut heap = KrHeap::new(BoundedRegion::new(capacity, PAGE));
    heap.init();
    heap
  }

  #[test]
  fn empty_to_first_alloc_then_free_restores_space() {
    let mut heap = heap_with_capacity(PAGE * 4);

    let p = heap.malloc(100);
    assert!(!p.is_null());
    assert_eq!(heap.getfree(), 0, "the single growth block was fully consumed by the split");

    heap.free(p);
    assert!(heap.getfree() >= PAGE);
  }

  #[test]
  fn exact_fit_reuses_freed_block_without_split() {
    let mut heap = heap_with_capacity(PAGE * 4);

    let a = heap.malloc(100);
    let b = heap.malloc(100);
    assert!(!a.is_null() && !b.is_null());

    heap.free(b);
    let free_before = heap.getfree();

    // Request exactly the payload capacity of b's block minus one unit,
    // so malloc's "size == n || size == n + 1" exact-fit rule reuses b's
    // block whole rather than splitting it.
    let exact_request = bytes_for(units_for(100)) - crate::block::UNIT;
    let c = heap.malloc(exact_request);

    assert_eq!(c, b, "exact-fit request should reuse the freed block's address");
    assert_eq!(heap.getfree(), free_before, "no split means no fragment returned to the list");
  }

  #[test]
  fn split_carves_tail_off_high_end_of_large_block() {
    let mut heap = heap_with_capacity(PAGE * 8);

    // Force one big free block up front via a large allocation, then
    // free it so the whole thing sits on the free list as one block.
    let seed = heap.malloc(PAGE * 6);
    assert!(!seed.is_null());
    heap.free(seed);
    let big_block_units = heap.freep.unwrap().size();

    let p = heap.malloc(16);
    assert!(!p.is_null());

    let remaining = heap.freep.unwrap();
    assert_eq!(remaining.size(), big_block_units - units_for(16));
  }

  #[test]
  fn bidirectional_coalesce_merges_three_freed_neighbors() {
    let mut heap = heap_with_capacity(PAGE * 4);

    let a = heap.malloc(32);
    let b = heap.malloc(32);
    let c = heap.malloc(32);
    assert!(!a.is_null() && !b.is_null() && !c.is_null());

    let free_before_any = heap.getfree();

    heap.free(a);
    heap.free(c);
    heap.free(b);

    // One merged block should now cover a, b, and c plus whatever was
    // already free; a single-block free list means head.next() == head.
    let head = heap.freep.unwrap();
    assert_eq!(head.next(), Some(head));
    assert!(heap.getfree() > free_before_any);
  }

  #[test]
  fn out_of_memory_then_recovers_after_free() {
    // Small enough that a handful of allocations exhaust it, but not so
    // small that morecore's page-size rounding can't ever succeed once.
    let mut heap = heap_with_capacity(PAGE);

    let mut allocations = Vec::new();
    loop {
      let p = heap.malloc(16);
      if p.is_null() {
        break;
      }
      allocations.push(p);
    }

    assert_eq!(heap.last_error(), Some(AllocError::OutOfMemory));

    let freed = allocations.pop().unwrap();
    heap.free(freed);

    let recovered = heap.malloc(16);
    assert!(!recovered.is_null(), "freeing space should let a same-size request succeed again");
  }

  #[test]
  fn calloc_overflow_returns_null_without_allocating() {
    let mut heap = heap_with_capacity(PAGE * 2);
    let free_before = {
      // Touch the region once so getfree() reflects post-growth state.
      let p = heap.malloc(8);
      heap.free(p);
      heap.getfree()
    };

    let p = heap.calloc(usize::MAX, 2);
    assert!(p.is_null());
    assert_eq!(heap.last_error(), Some(AllocError::Overflow));
    assert_eq!(heap.getfree(), free_before, "heap state must be unchanged after an overflow");
  }

  #[test]
  fn calloc_zeroes_the_full_requested_span() {
    let mut heap = heap_with_capacity(PAGE * 2);

    let p = heap.calloc(16, 4) as *mut u8;
    assert!(!p.is_null());
    let bytes = unsafe { std::slice::from_raw_parts(p, 64) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn realloc_grow_preserves_prefix_and_frees_original_block() {
    let mut heap = heap_with_capacity(PAGE * 8);

    let p = heap.malloc(8);
    assert!(!p.is_null());
    unsafe {
      ptr::copy_nonoverlapping([1u8, 2, 3, 4, 5, 6, 7, 8].as_ptr(), p, 8);
    }

    let q = heap.realloc(p, 1024);
    assert!(!q.is_null());
    let prefix = unsafe { std::slice::from_raw_parts(q, 8) };
    assert_eq!(prefix, &[1, 2, 3, 4, 5, 6, 7, 8]);
  }

  #[test]
  fn realloc_with_sufficient_room_returns_same_pointer() {
    let mut heap = heap_with_capacity(PAGE * 4);

    let p = heap.malloc(1024);
    assert!(!p.is_null());

    let q = heap.realloc(p, 8);
    assert_eq!(q, p, "shrinking in place must not move the allocation");
  }

  #[test]
  fn free_of_null_is_a_no_op() {
    let mut heap = heap_with_capacity(PAGE);
    heap.free(ptr::null_mut());
    assert_eq!(heap.getfree(), 0);
  }

  #[test]
  fn realloc_of_null_behaves_as_malloc() {
    let mut heap = heap_with_capacity(PAGE * 2);
    let p = heap.realloc(ptr::null_mut(), 32);
    assert!(!p.is_null());
  }
}
