//! # Block Layout
//!
//! A block is a run of `unit`-sized [`Cell`]s bounded by a header (the
//! first cell) and a footer (the last cell), both carrying the block's
//! size. Free blocks additionally thread the circular free list through
//! these same cells: the header's pointer field is the list successor,
//! the footer's pointer field is the list predecessor. This mirrors the
//! K&R `union Header` this module is ported from (`mm_kr_heap.c`):
//! `s.ptr` doubles as `next` in the header position and `prev` in the
//! footer position, and `s.size` is redundantly stored in both.
//!
//! Allocated blocks zero out both pointer fields — that's the sole
//! allocated/free discriminator the rest of the engine relies on
//! (`Block::next` returning `None`).

use std::mem;
use std::ptr::NonNull;

/// The raw record stored at every unit boundary of the heap: a free-list
/// link and a size, both always present so the same cell can serve as a
/// header (`link` = next) or a footer (`link` = prev).
///
/// `align(16)` forces `size_of::<Cell>()` to a multiple of 16, matching
/// `max_align_t` on every Unix target this crate's `sbrk`-based region
/// supports — the maximum scalar alignment a `unit` is defined against.
#[repr(C, align(16))]
struct Cell {
  link: *mut Cell,
  size: usize,
}

/// Size in bytes of one heap unit (one header/footer cell).
pub const UNIT: usize = mem::size_of::<Cell>();

/// Smallest number of units that can hold `nbytes` of payload plus a
/// header and footer.
///
/// The `+1` covers the header itself; `2 * UNIT - 1` reserves room for
/// the footer and rounds the payload up to a whole number of units. The
/// threshold is taken from `mm_units` in `mm_kr_heap.c` verbatim — see
/// `DESIGN.md` for why it is not generalized.
pub fn units_for(nbytes: usize) -> usize {
  (nbytes + 2 * UNIT - 1) / UNIT + 1
}

/// Size in bytes of `nunits` heap units.
pub fn bytes_for(nunits: usize) -> usize {
  nunits * UNIT
}

/// A handle to a block's header cell. Copy because a `Block` is just an
/// address into the heap the allocator already owns; no block is ever
/// dropped through this handle.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Block(NonNull<Cell>);

impl Block {
  /// Wraps a raw header-cell pointer as a `Block`.
  ///
  /// # Safety
  ///
  /// `raw` must point at a valid, live header cell within the heap.
  pub unsafe fn from_raw(raw: *mut u8) -> Self {
    Block(unsafe { NonNull::new_unchecked(raw as *mut Cell) })
  }

  /// The address of this block's header cell, as raw bytes.
  pub fn as_ptr(self) -> *mut u8 {
    self.0.as_ptr() as *mut u8
  }

  /// Size of this block in units, as currently recorded in the header.
  pub fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  /// Writes `units` to both the header and footer size fields — they must
  /// always agree.
  pub fn set_size(
    self,
    units: usize,
  ) {
    unsafe {
      (*self.0.as_ptr()).size = units;
      (*self.footer_ptr(units)).size = units;
    }
  }

  fn footer_ptr(
    self,
    units: usize,
  ) -> *mut Cell {
    unsafe { self.0.as_ptr().add(units - 1) }
  }

  /// Free-list successor, read from the header. `None` both for the sole
  /// list member's self-reference (never constructed — see
  /// [`crate::freelist`]) and, crucially, for an allocated block, where
  /// this field is kept nil by convention.
  pub fn next(self) -> Option<Block> {
    let raw = unsafe { (*self.0.as_ptr()).link };
    NonNull::new(raw).map(Block)
  }

  /// Writes the free-list successor into the header.
  pub fn set_next(
    self,
    next: Option<Block>,
  ) {
    unsafe {
      (*self.0.as_ptr()).link = next.map_or(std::ptr::null_mut(), |b| b.0.as_ptr());
    }
  }

  /// Free-list predecessor, read from the footer.
  pub fn prev(self) -> Option<Block> {
    let footer = self.footer_ptr(self.size());
    let raw = unsafe { (*footer).link };
    NonNull::new(raw).map(Block)
  }

  /// Writes the free-list predecessor into the footer.
  pub fn set_prev(
    self,
    prev: Option<Block>,
  ) {
    let footer = self.footer_ptr(self.size());
    unsafe {
      (*footer).link = prev.map_or(std::ptr::null_mut(), |b| b.0.as_ptr());
    }
  }

  /// Address `units` whole cells above this block's header, as raw bytes.
  ///
  /// Used by the allocation engine to carve the tail block off a split:
  /// the tail always starts `self.size()` units above `self`'s header.
  pub fn add_units(
    self,
    units: usize,
  ) -> *mut u8 {
    unsafe { self.0.as_ptr().add(units) as *mut u8 }
  }

  /// The payload pointer a client receives: one unit past the header.
  pub fn payload(self) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(self.0.as_ptr().add(1) as *mut u8) }
  }

  /// Recovers the owning block's header from a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been returned by a prior call to [`Block::payload`]
  /// on a still-live block.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Block {
    unsafe { Block(NonNull::new_unchecked((payload.as_ptr() as *mut Cell).sub(1))) }
  }

  /// The block immediately below this one in memory, or `None` if this
  /// block sits at `heap_lo`.
  ///
  /// Reads the unit just before this block's header as a footer and
  /// walks back by its recorded size — only valid because header and
  /// footer sizes always agree, for every block, free or not.
  pub fn before(
    self,
    heap_lo: *mut u8,
  ) -> Option<Block> {
    if (self.0.as_ptr() as usize) <= (heap_lo as usize) {
      return None;
    }
    unsafe {
      let footer = self.0.as_ptr().sub(1);
      let size = (*footer).size;
      let header = footer.sub(size - 1);
      Some(Block(NonNull::new_unchecked(header)))
    }
  }

  /// The block immediately above this one in memory, or `None` if this
  /// block's end coincides with `heap_hi`.
  ///
  /// `heap_hi` is one-past-the-end of the region (see [`crate::region::Region::hi`]),
  /// so a block whose end lands exactly on `heap_hi` is the top block and has
  /// no neighbor above it — the bound check is `>=`, not `>`.
  pub fn after(
    self,
    heap_hi: *mut u8,
  ) -> Option<Block> {
    unsafe {
      let next = self.0.as_ptr().add(self.size());
      if (next as usize) >= (heap_hi as usize) {
        None
      } else {
        Some(Block(NonNull::new_unchecked(next)))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn units_for_reserves_header_and_footer() {
    // A zero-byte request still needs header + footer: 2 units.
    assert_eq!(units_for(0), 2);
    assert!(units_for(1) >= 3);
  }

  #[test]
  fn bytes_for_is_linear_in_unit() {
    assert_eq!(bytes_for(0), 0);
    assert_eq!(bytes_for(4), 4 * UNIT);
  }

  #[test]
  fn payload_and_from_payload_round_trip() {
    let mut storage = vec![0u8; UNIT * 4];
    let block = unsafe { Block::from_raw(storage.as_mut_ptr()) };
    block.set_size(4);

    let payload = block.payload();
    assert_eq!(payload.as_ptr() as usize, storage.as_ptr() as usize + UNIT);

    let recovered = unsafe { Block::from_payload(payload) };
    assert_eq!(recovered, block);
  }

  #[test]
  fn set_size_writes_header_and_footer() {
    let mut storage = vec![0u8; UNIT * 5];
    let block = unsafe { Block::from_raw(storage.as_mut_ptr()) };
    block.set_size(5);
    assert_eq!(block.size(), 5);

    // The footer cell carries the same size (read via prev()'s backing
    // field being well-formed implies the footer write landed correctly).
    let footer_size_ptr = unsafe { (storage.as_ptr().add(UNIT * 4)) as *const usize };
    // The size field is the second usize-sized field of Cell; the first
    // is the pointer-sized link field.
    let size_field = unsafe { footer_size_ptr.add(1).read() };
    assert_eq!(size_field, 5);
  }

  #[test]
  fn before_and_after_find_contiguous_neighbors() {
    // Three contiguous blocks of 2 units each.
    let mut storage = vec![0u8; UNIT * 6];
    let lo = storage.as_mut_ptr();
    let hi = unsafe { lo.add(UNIT * 6) };

    let a = unsafe { Block::from_raw(lo) };
    a.set_size(2);
    let b = unsafe { Block::from_raw(lo.add(UNIT * 2)) };
    b.set_size(2);
    let c = unsafe { Block::from_raw(lo.add(UNIT * 4)) };
    c.set_size(2);

    assert_eq!(a.before(lo), None);
    assert_eq!(a.after(hi), Some(b));
    assert_eq!(b.before(lo), Some(a));
    assert_eq!(b.after(hi), Some(c));
    assert_eq!(c.before(lo), Some(b));
    assert_eq!(c.after(hi), None);
  }
}
