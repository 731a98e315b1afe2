use std::{marker::PhantomData, ptr};

use crate::block::Header;

/// Singly linked chain of every block a heap owns, in allocation order.
///
/// The links live inside the managed memory, so every method that follows
/// them is `unsafe`: the list trusts that each reachable header is live.
pub struct FreeList {
  head: *mut Header,
  tail: *mut Header,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
    }
  }

  pub fn head(&self) -> *mut Header {
    self.head
  }

  pub fn tail(&self) -> *mut Header {
    self.tail
  }

  /// First free block, in list order, that can hold `size` bytes.
  pub unsafe fn find_first_fit(
    &self,
    size: usize,
  ) -> *mut Header {
    unsafe {
      let mut current = self.head;

      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }

  /// Links `header` in as the new tail.
  pub unsafe fn append(
    &mut self,
    header: *mut Header,
  ) {
    unsafe {
      (*header).next = ptr::null_mut();

      if self.head.is_null() {
        self.head = header;
      } else {
        (*self.tail).next = header;
      }
      self.tail = header;
    }
  }

  /// Removes the tail and returns it (null when the list is empty).
  ///
  /// Links only go forward, so the new tail is found by walking from the head.
  pub unsafe fn unlink_tail(&mut self) -> *mut Header {
    let old = self.tail;

    if old.is_null() {
      return old;
    }

    if self.head == old {
      self.head = ptr::null_mut();
      self.tail = ptr::null_mut();
      return old;
    }

    unsafe {
      let mut current = self.head;
      while (*current).next != old {
        current = (*current).next;
      }

      (*current).next = ptr::null_mut();
      self.tail = current;
    }

    old
  }

  /// Walks the list from head to tail.
  pub unsafe fn iter(&self) -> Iter<'_> {
    Iter {
      current: self.head,
      _list: PhantomData,
    }
  }
}

pub struct Iter<'a> {
  current: *mut Header,
  _list: PhantomData<&'a FreeList>,
}

impl Iterator for Iter<'_> {
  type Item = *mut Header;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let header = self.current;
    self.current = unsafe { (*header).next };
    Some(header)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::HEADER_SIZE;

  #[repr(C, align(16))]
  struct Arena([u8; 1024]);

  /// Carves `sizes.len()` headers out of `arena`, back to back.
  unsafe fn carve(
    arena: &mut Arena,
    sizes: &[usize],
  ) -> Vec<*mut Header> {
    let mut offset = 0;
    let mut headers = Vec::new();

    for &size in sizes {
      let header = unsafe { Header::init(arena.0.as_mut_ptr().add(offset), size) };
      offset += HEADER_SIZE + size;
      headers.push(header);
    }

    headers
  }

  #[test]
  fn append_links_in_order() {
    let mut arena = Arena([0; 1024]);
    let mut list = FreeList::new();

    unsafe {
      let headers = carve(&mut arena, &[16, 32, 48]);
      for &header in &headers {
        list.append(header);
      }

      assert_eq!(list.head(), headers[0]);
      assert_eq!(list.tail(), headers[2]);
      assert_eq!(list.iter().collect::<Vec<_>>(), headers);
      assert!((*list.tail()).next.is_null());
    }
  }

  #[test]
  fn first_fit_skips_used_and_small_blocks() {
    let mut arena = Arena([0; 1024]);
    let mut list = FreeList::new();

    unsafe {
      let mut headers = carve(&mut arena, &[16, 64, 32, 128]);
      for &header in &headers {
        list.append(header);
      }

      assert!(list.find_first_fit(16).is_null());

      (*headers[0]).is_free = true;
      (*headers[2]).is_free = true;
      (*headers[3]).is_free = true;

      assert_eq!(list.find_first_fit(16), headers[0]);
      // headers[1] is big enough but in use.
      assert_eq!(list.find_first_fit(32), headers[2]);
      assert_eq!(list.find_first_fit(100), headers[3]);
      assert!(list.find_first_fit(200).is_null());
    }
  }

  #[test]
  fn unlink_tail_of_two_leaves_single_node() {
    let mut arena = Arena([0; 1024]);
    let mut list = FreeList::new();

    unsafe {
      let headers = carve(&mut arena, &[16, 16]);
      list.append(headers[0]);
      list.append(headers[1]);

      assert_eq!(list.unlink_tail(), headers[1]);
      assert_eq!(list.head(), headers[0]);
      assert_eq!(list.tail(), headers[0]);
      assert!((*headers[0]).next.is_null());

      assert_eq!(list.unlink_tail(), headers[0]);
      assert!(list.head().is_null());
      assert!(list.tail().is_null());

      assert!(list.unlink_tail().is_null());
    }
  }

  #[test]
  fn unlink_tail_scans_to_predecessor() {
    let mut arena = Arena([0; 1024]);
    let mut list = FreeList::new();

    unsafe {
      let headers = carve(&mut arena, &[16, 16, 16, 16]);
      for &header in &headers {
        list.append(header);
      }

      list.unlink_tail();
      assert_eq!(list.tail(), headers[2]);
      assert_eq!(list.iter().count(), 3);

      list.append(headers[3]);
      assert_eq!(list.tail(), headers[3]);
      assert_eq!(list.iter().count(), 4);
    }
  }
}
