use std::io::Read;

use kralloc::{KrHeap, SbrkRegion};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  // Our free-list heap. Unlike a bump allocator it holds a circular
  // doubly-linked free list (`freep`) threaded through the blocks
  // themselves, and reuses freed blocks instead of only ever moving
  // a pointer forward.
  let mut heap = KrHeap::new(SbrkRegion::new());
  heap.init();

  unsafe {
    // Initial heap state.
    print_program_break("start");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // ------------------------------------------------------------------
    let first_block = heap.malloc(std::mem::size_of::<u32>());
    println!("\n[1] Allocate u32 -> {:?}", first_block);

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate 12 bytes.
    // ------------------------------------------------------------------
    let second_block = heap.malloc(12);
    println!("\n[2] Allocate [u8; 12] -> {:?}", second_block);

    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Free the first block, then request a smaller block to see the
    //    free list reuse it via first-fit + split rather than growing
    //    the heap again.
    // ------------------------------------------------------------------
    heap.visualize("before freeing first_block");
    heap.free(first_block as *mut u8);
    println!("\n[3] Freed first_block at {:?}", first_block);
    heap.visualize("after freeing first_block");
    block_until_enter_pressed();

    let third_block = heap.malloc(2);
    println!("\n[4] Allocate [u8; 2] (check reuse of freed block)");
    println!(
      "[4] third_block == first_block? {}",
      if third_block as *mut u32 == first_block {
        "yes, exact-fit reuse of the freed block"
      } else {
        "no, split a different block or grew the heap"
      }
    );

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Free the two remaining blocks. Because they sit right next to
    //    each other (and to the reused third block) in memory, freeing
    //    them coalesces everything back into one big free block.
    // ------------------------------------------------------------------
    heap.free(second_block);
    heap.free(third_block);
    println!("\n[5] Freed second_block and third_block; coalesced into:");
    heap.visualize("after freeing everything");
    println!("[5] total free bytes on the list: {}", heap.getfree());

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 6) Allocate a large block to observe heap growth via morecore.
    // ------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = heap.malloc(64 * 1024);
    println!("\n[6] Allocate large 64 KiB block -> {:?}", big_block);

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 7) End of demo.
    // ------------------------------------------------------------------
    heap.free(big_block);
    println!("\n[7] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
