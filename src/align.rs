/// Minimum alignment of every payload handed out by a [`Heap`](crate::Heap).
pub const ALIGNMENT: usize = 16;

/// Rounds the given size up to the block alignment.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(17), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Checked version of [`align!`]: `None` if rounding up would overflow.
pub const fn align_up(value: usize) -> Option<usize> {
  if value > usize::MAX - (ALIGNMENT - 1) {
    return None;
  }

  Some(align!(value))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), align_up(size));
      }
    }
  }

  #[test]
  fn align_up_overflow() {
    assert_eq!(align_up(usize::MAX), None);
    assert_eq!(align_up(usize::MAX - ALIGNMENT + 2), None);
    assert_eq!(align_up(0), Some(0));
  }
}
