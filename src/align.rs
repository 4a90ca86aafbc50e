/// Calculates the machine word alignment for the given size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use kralloc::align;
///
/// match mem::size_of::<usize>() {
///   8 => assert_eq!(align!(13), 16), // 64 bit machine.
///   4 => assert_eq!(align!(11), 12), // 32 bit machine.
///   _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + mem::size_of::<usize>() - 1) & !(mem::size_of::<usize>() - 1)
  };
}

/// Aligns `addr` down to the nearest multiple of `align`.
///
/// `align` must be a power of two. The primitive [`align_up`] is built on,
/// which `region.rs` uses to snap a region's raw base up to a unit boundary.
pub fn align_down(
  addr: usize,
  align: usize,
) -> usize {
  debug_assert!(align.is_power_of_two(), "align must be a power of 2");
  addr & !(align - 1)
}

/// Aligns `addr` up to the nearest multiple of `align`.
///
/// `align` must be a power of two.
pub fn align_up(
  addr: usize,
  align: usize,
) -> usize {
  align_down(addr + align - 1, align)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::mem;

  #[test]
  fn test_align() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn align_up_rounds_to_next_multiple() {
    assert_eq!(align_up(0, 16), 0);
    assert_eq!(align_up(1, 16), 16);
    assert_eq!(align_up(16, 16), 16);
    assert_eq!(align_up(17, 16), 32);
  }

  #[test]
  fn align_down_rounds_to_previous_multiple() {
    assert_eq!(align_down(0, 16), 0);
    assert_eq!(align_down(15, 16), 0);
    assert_eq!(align_down(16, 16), 16);
    assert_eq!(align_down(31, 16), 16);
  }
}
