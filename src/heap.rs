use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
  sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, trace};

use crate::{
  align::{ALIGNMENT, align_up},
  block::{HEADER_SIZE, Header},
  brk::ProgramBreak,
  config::HeapConfig,
  diag::{BlockInfo, Snapshot},
  error::{AllocError, Result},
  free_list::FreeList,
};

/// A first-fit allocator over a break manager.
///
/// Every operation runs under one lock that covers both the block list and
/// the break. The lock is not reentrant: calling back into the same heap
/// while an operation is in flight (from a signal handler, or from a logger
/// that allocates from this heap) deadlocks.
pub struct Heap<B: ProgramBreak> {
  state: Mutex<State<B>>,
  config: HeapConfig,
}

struct State<B> {
  brk: B,
  list: FreeList,
  /// Bytes currently taken from `brk`.
  held: usize,
}

// The headers reachable from `list` live in memory owned through `brk`.
unsafe impl<B: Send> Send for State<B> {}

/// Break movements of one operation, reported once the lock is released.
#[derive(Default)]
struct Trace {
  grew: Option<(usize, usize)>,
  shrank: Option<(usize, usize)>,
}

impl<B: ProgramBreak> State<B> {
  unsafe fn allocate(
    &mut self,
    size: usize,
    config: &HeapConfig,
    trace: &mut Trace,
  ) -> Result<NonNull<u8>> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let size = align_up(size).ok_or(AllocError::Overflow)?;

    unsafe {
      let free_block = self.list.find_first_fit(size);

      if !free_block.is_null() {
        (*free_block).is_free = false;

        return Ok(NonNull::new_unchecked(Header::payload(free_block)));
      }
    }

    let increment = HEADER_SIZE.checked_add(size).ok_or(AllocError::Overflow)?;
    let exhausted = AllocError::Exhausted { requested: increment };

    if !config.allows(self.held, increment) {
      return Err(exhausted);
    }

    let (address, lead) = unsafe { self.brk.grow(increment) }.ok_or(exhausted)?;
    let consumed = lead + increment;

    // Padding is only known once the break has moved.
    if !config.allows(self.held, consumed) {
      unsafe { self.brk.shrink(consumed) };
      return Err(AllocError::Exhausted { requested: consumed });
    }

    self.held += consumed;

    unsafe {
      let block = Header::init(address.as_ptr(), size);
      (*block).lead = lead;
      self.list.append(block);

      trace.grew = Some((address.as_ptr() as usize, consumed));

      Ok(address.add(HEADER_SIZE))
    }
  }

  unsafe fn release(
    &mut self,
    address: *mut u8,
    trace: &mut Trace,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      let block = Header::from_payload(address);
      debug_assert!(!(*block).is_free, "block {block:?} released twice");

      if Header::end(block) != self.brk.current() {
        (*block).is_free = true;
        return;
      }

      // The block ends at the break, so it is the most recently grown one.
      let unlinked = self.list.unlink_tail();
      debug_assert_eq!(unlinked, block);

      let footprint = (*block).footprint();
      self.brk.shrink(footprint);
      self.held -= footprint;

      trace.shrank = Some((block as usize, footprint));
    }
  }

  unsafe fn allocate_zeroed(
    &mut self,
    count: usize,
    elem_size: usize,
    config: &HeapConfig,
    trace: &mut Trace,
  ) -> Result<NonNull<u8>> {
    if count == 0 || elem_size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let total = count.checked_mul(elem_size).ok_or(AllocError::Overflow)?;

    unsafe {
      let payload = self.allocate(total, config, trace)?;

      // A reused block may be larger than asked for; clear all of it.
      let capacity = (*Header::from_payload(payload.as_ptr())).size;
      ptr::write_bytes(payload.as_ptr(), 0, capacity);

      Ok(payload)
    }
  }

  unsafe fn reallocate(
    &mut self,
    address: *mut u8,
    new_size: usize,
    config: &HeapConfig,
    trace: &mut Trace,
  ) -> Result<NonNull<u8>> {
    if address.is_null() || new_size == 0 {
      return unsafe { self.allocate(new_size, config, trace) };
    }

    unsafe {
      let old_size = (*Header::from_payload(address)).size;

      if old_size >= new_size {
        return Ok(NonNull::new_unchecked(address));
      }

      let fresh = self.allocate(new_size, config, trace)?;

      ptr::copy_nonoverlapping(address, fresh.as_ptr(), old_size);
      self.release(address, trace);

      Ok(fresh)
    }
  }

  fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    unsafe { self.list.iter() }.map(|header| {
      let block = unsafe { &*header };

      BlockInfo {
        address: header as usize,
        size: block.size,
        is_free: block.is_free,
        next: (!block.next.is_null()).then_some(block.next as usize),
      }
    })
  }
}

impl<B: ProgramBreak> Heap<B> {
  pub const fn new(brk: B) -> Self {
    Self::with_config(brk, HeapConfig::new())
  }

  pub const fn with_config(
    brk: B,
    config: HeapConfig,
  ) -> Self {
    Self {
      state: Mutex::new(State {
        brk,
        list: FreeList::new(),
        held: 0,
      }),
      config,
    }
  }

  fn lock(&self) -> MutexGuard<'_, State<B>> {
    // Nothing panics halfway through a list update, so a poisoned list is
    // still intact.
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Allocates at least `size` bytes, aligned to [`ALIGNMENT`].
  ///
  /// Reuses the first free block large enough, without splitting it, and
  /// grows the break otherwise.
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let mut trace = Trace::default();

    let result = {
      let mut state = self.lock();
      unsafe { state.allocate(size, &self.config, &mut trace) }
    };

    self.report("allocate", size, &trace, &result);
    result
  }

  /// Gives a block back to the heap. Null is ignored.
  ///
  /// The block at the top of the heap is returned to the break manager;
  /// any other block is only marked free for later reuse.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this heap and not
  /// released since. It must not be used afterwards.
  pub unsafe fn release(
    &self,
    address: *mut u8,
  ) {
    let mut trace = Trace::default();

    {
      let mut state = self.lock();
      unsafe { state.release(address, &mut trace) };
    }

    self.report::<()>("release", 0, &trace, &Ok(()));
  }

  /// Allocates `count * elem_size` zeroed bytes.
  pub fn allocate_zeroed(
    &self,
    count: usize,
    elem_size: usize,
  ) -> Result<NonNull<u8>> {
    let mut trace = Trace::default();

    let result = {
      let mut state = self.lock();
      unsafe { state.allocate_zeroed(count, elem_size, &self.config, &mut trace) }
    };

    self.report("allocate_zeroed", count.saturating_mul(elem_size), &trace, &result);
    result
  }

  /// Resizes a block, moving it when it is too small.
  ///
  /// A null `address` or a zero `new_size` is forwarded to
  /// [`allocate`](Self::allocate); in particular `reallocate(p, 0)` fails
  /// with [`AllocError::ZeroSize`] and leaves `p` allocated. On any failure
  /// the original block stays valid and untouched.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this heap. On
  /// success it must not be used afterwards unless it was returned again.
  pub unsafe fn reallocate(
    &self,
    address: *mut u8,
    new_size: usize,
  ) -> Result<NonNull<u8>> {
    let mut trace = Trace::default();

    let result = {
      let mut state = self.lock();
      unsafe { state.reallocate(address, new_size, &self.config, &mut trace) }
    };

    self.report("reallocate", new_size, &trace, &result);
    result
  }

  /// Copies out the block list and the current break.
  ///
  /// Allocates the snapshot from the global allocator, so it must not be
  /// called on the heap that *is* the global allocator; use
  /// [`for_each_block`](Self::for_each_block) there.
  pub fn dump(&self) -> Snapshot {
    let state = self.lock();

    Snapshot {
      head: (!state.list.head().is_null()).then(|| state.list.head() as usize),
      tail: (!state.list.tail().is_null()).then(|| state.list.tail() as usize),
      brk: state.brk.current() as usize,
      blocks: state.blocks().collect(),
    }
  }

  /// Calls `f` for every block, head to tail, with the lock held.
  ///
  /// `f` must not allocate from or release to this heap.
  pub fn for_each_block(
    &self,
    f: impl FnMut(BlockInfo),
  ) {
    let state = self.lock();
    state.blocks().for_each(f);
  }

  pub fn current_break(&self) -> *mut u8 {
    self.lock().brk.current()
  }

  /// Bytes currently taken from the break manager, headers and padding included.
  pub fn held(&self) -> usize {
    self.lock().held
  }

  /// Runs `f` against the break manager, with the lock held.
  pub fn with_break<R>(
    &self,
    f: impl FnOnce(&B) -> R,
  ) -> R {
    f(&self.lock().brk)
  }

  fn report<T>(
    &self,
    op: &'static str,
    size: usize,
    trace: &Trace,
    result: &Result<T>,
  ) {
    if !self.config.log_events {
      return;
    }

    if let Some((address, bytes)) = trace.grew {
      trace!("{op}: break grown by {bytes} bytes at {address:#x}");
    }
    if let Some((address, bytes)) = trace.shrank {
      trace!("{op}: break shrunk by {bytes} bytes from {address:#x}");
    }
    if let Err(err) = result {
      debug!("{op}({size}) failed: {err}");
    }
  }
}

unsafe impl<B: ProgramBreak + Send> GlobalAlloc for Heap<B> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.allocate(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(ptr) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.allocate_zeroed(1, layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { self.reallocate(ptr, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}
