//! Break managers: where a [`Heap`](crate::Heap) gets its memory from.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
  sync::atomic::{AtomicBool, Ordering},
};

use libc::{c_void, intptr_t, sbrk};

use crate::align::ALIGNMENT;

/// A contiguous region whose upper end can be moved up and down.
///
/// Implementations are only ever driven by one heap, under its lock.
pub trait ProgramBreak {
  /// The current break address.
  fn current(&self) -> *mut u8;

  /// Extends the break so that `increment` bytes starting at an
  /// [`ALIGNMENT`]-aligned address become available, or returns `None` if the
  /// request is declined.
  ///
  /// Returns the aligned start and the padding (`lead`) skipped in front of
  /// it. The break moves by `lead + increment` in total.
  ///
  /// # Safety
  ///
  /// The caller takes ownership of the returned bytes, padding included,
  /// until it shrinks them away again.
  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<(NonNull<u8>, usize)>;

  /// Retracts the break by `decrement` bytes.
  ///
  /// # Safety
  ///
  /// The last `decrement` bytes below the break must belong to the caller and
  /// must no longer be referenced.
  unsafe fn shrink(
    &mut self,
    decrement: usize,
  );
}

static SBRK_CLAIMED: AtomicBool = AtomicBool::new(false);

/// The process break, moved with `sbrk(2)`.
///
/// The break is process-wide state, so only one heap may drive it. Get the
/// handle with [`Sbrk::claim`], or with [`Sbrk::new`] for a `static` global
/// allocator.
#[derive(Debug)]
pub struct Sbrk {
  claimed: bool,
}

impl Sbrk {
  /// Hands out the process break, once. Returns `None` while another claimed
  /// handle is alive.
  pub fn claim() -> Option<Self> {
    SBRK_CLAIMED
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self { claimed: true })
  }

  /// Creates a handle without going through [`Sbrk::claim`].
  ///
  /// # Safety
  ///
  /// No other heap in the process may be driving the break at the same time.
  pub const unsafe fn new() -> Self {
    Self { claimed: false }
  }
}

impl Drop for Sbrk {
  fn drop(&mut self) {
    if self.claimed {
      SBRK_CLAIMED.store(false, Ordering::Release);
    }
  }
}

fn sbrk_failed(address: *mut c_void) -> bool {
  address == usize::MAX as *mut c_void
}

impl ProgramBreak for Sbrk {
  fn current(&self) -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }

  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<(NonNull<u8>, usize)> {
    if increment > isize::MAX as usize - ALIGNMENT {
      return None;
    }

    let address = unsafe { sbrk(increment as intptr_t) };

    if sbrk_failed(address) {
      return None;
    }

    // Someone else (the C runtime, a previous heap) may have left the break
    // unaligned.
    let start = address as *mut u8;
    let lead = start.align_offset(ALIGNMENT);

    if lead != 0 {
      let topped = unsafe { sbrk(lead as intptr_t) };

      if sbrk_failed(topped) {
        unsafe { sbrk(-(increment as intptr_t)) };
        return None;
      }

      if topped as *mut u8 != start.wrapping_add(increment) {
        // The break moved under us; only the top-up is still ours to undo.
        unsafe { sbrk(-(lead as intptr_t)) };
        return None;
      }
    }

    NonNull::new(start.wrapping_add(lead)).map(|start| (start, lead))
  }

  unsafe fn shrink(
    &mut self,
    decrement: usize,
  ) {
    unsafe { sbrk(-(decrement as intptr_t)) };
  }
}

/// A simulated break over a private, fixed-size buffer.
///
/// Behaves like the process break but never touches it: growth beyond the
/// capacity is declined, and dropping the region frees the buffer.
#[derive(Debug)]
pub struct Region {
  base: NonNull<u8>,
  capacity: usize,
  top: usize,
}

// The buffer is exclusively owned by the region.
unsafe impl Send for Region {}

impl Region {
  pub fn new(capacity: usize) -> Self {
    let layout = Self::layout(capacity);
    let base = unsafe { alloc::alloc(layout) };

    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      base,
      capacity,
      top: 0,
    }
  }

  fn layout(capacity: usize) -> Layout {
    Layout::from_size_align(capacity.max(ALIGNMENT), ALIGNMENT)
      .unwrap_or_else(|_| panic!("region capacity {capacity} is too large"))
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently below the break.
  pub fn used(&self) -> usize {
    self.top
  }
}

impl ProgramBreak for Region {
  fn current(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.top)
  }

  unsafe fn grow(
    &mut self,
    increment: usize,
  ) -> Option<(NonNull<u8>, usize)> {
    let lead = self.current().align_offset(ALIGNMENT);
    let top = self.top.checked_add(lead)?.checked_add(increment)?;

    if top > self.capacity {
      return None;
    }

    let start = self.current().wrapping_add(lead);
    self.top = top;

    NonNull::new(start).map(|start| (start, lead))
  }

  unsafe fn shrink(
    &mut self,
    decrement: usize,
  ) {
    debug_assert!(decrement <= self.top);
    self.top -= decrement;
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout(self.capacity)) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn region_grows_until_capacity() {
    let mut region = Region::new(64);
    let base = region.base();

    unsafe {
      assert_eq!(region.grow(32).map(|(start, lead)| (start.as_ptr(), lead)), Some((base, 0)));
      assert_eq!(region.grow(32).map(|(start, lead)| (start.as_ptr(), lead)), Some((base.add(32), 0)));
      assert_eq!(region.grow(1), None);
      assert_eq!(region.current(), base.add(64));
    }
  }

  #[test]
  fn region_shrink_moves_break_back() {
    let mut region = Region::new(128);

    unsafe {
      region.grow(96).unwrap();
      region.shrink(64);
    }

    assert_eq!(region.used(), 32);
    assert_eq!(region.current(), region.base().wrapping_add(32));
  }

  #[test]
  fn region_pads_unaligned_break() {
    let mut region = Region::new(128);
    let base = region.base();

    unsafe {
      region.grow(1).unwrap();

      let (start, lead) = region.grow(32).unwrap();
      assert_eq!(lead, ALIGNMENT - 1);
      assert_eq!(start.as_ptr(), base.add(ALIGNMENT));
      assert_eq!(region.used(), ALIGNMENT + 32);

      region.shrink(lead + 32);
      assert_eq!(region.used(), 1);
    }
  }

  #[test]
  fn region_rejects_overflowing_growth() {
    let mut region = Region::new(64);

    unsafe {
      region.grow(16).unwrap();
      assert_eq!(region.grow(usize::MAX), None);
    }

    assert_eq!(region.used(), 16);
  }

  #[test]
  fn region_base_is_aligned() {
    let region = Region::new(0);

    assert_eq!(region.base() as usize % ALIGNMENT, 0);
    assert_eq!(region.capacity(), 0);
  }
}
