use std::{mem, ptr};

use crate::align::ALIGNMENT;

/// Metadata stored in front of every payload.
#[repr(C, align(16))]
pub struct Header {
  pub size: usize,
  pub is_free: bool,
  pub next: *mut Header,
  /// Break padding skipped in front of this header to align it.
  pub lead: usize,
}

/// Width of a [`Header`], i.e. the distance from a header to its payload.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

impl Header {
  pub fn new(size: usize) -> Self {
    Self {
      size,
      is_free: false,
      next: ptr::null_mut(),
      lead: 0,
    }
  }

  /// Writes a fresh, in-use header at `address`.
  ///
  /// # Safety
  ///
  /// `address` must be aligned to [`ALIGNMENT`] and valid for writes of
  /// `HEADER_SIZE + size` bytes.
  pub unsafe fn init(
    address: *mut u8,
    size: usize,
  ) -> *mut Header {
    let header = address as *mut Header;
    unsafe { header.write(Header::new(size)) };
    header
  }

  /// Steps back from a payload pointer to the header that owns it.
  ///
  /// # Safety
  ///
  /// `payload` must have been returned by [`Header::payload`].
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
    unsafe { payload.sub(HEADER_SIZE) as *mut Header }
  }

  pub fn payload(header: *mut Header) -> *mut u8 {
    (header as *mut u8).wrapping_add(HEADER_SIZE)
  }

  /// One past the last payload byte.
  ///
  /// # Safety
  ///
  /// `header` must point to a live header.
  pub unsafe fn end(header: *mut Header) -> *mut u8 {
    unsafe { Header::payload(header).wrapping_add((*header).size) }
  }

  /// Bytes taken from the break by this block, header included.
  pub fn span(&self) -> usize {
    HEADER_SIZE + self.size
  }

  /// Bytes the break moved for this block, padding included.
  pub fn footprint(&self) -> usize {
    self.lead + self.span()
  }
}
