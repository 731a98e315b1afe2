use std::{sync::Arc, thread};

use brkalloc::{Heap, Region};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

/// Every thread allocates and releases in turn, keeping every fourth block.
fn churn(
  heap: &Heap<Region>,
  id: u8,
) -> Vec<usize> {
  let mut kept = Vec::new();

  for round in 0..ROUNDS {
    let size = 16 * (1 + round % 4);
    let block = heap.allocate(size).expect("region is large enough");

    unsafe { block.as_ptr().write_bytes(id, size) };

    if round % 4 == 0 {
      kept.push(block.as_ptr() as usize);
      continue;
    }

    let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), size) };
    assert!(bytes.iter().all(|&byte| byte == id), "block shared between threads");

    unsafe { heap.release(block.as_ptr()) };
  }

  kept
}

#[test]
fn concurrent_churn_keeps_list_consistent() {
  let heap = Arc::new(Heap::new(Region::new(4 << 20)));

  let handles: Vec<_> = (0..THREADS)
    .map(|id| {
      let heap = Arc::clone(&heap);
      thread::spawn(move || (id as u8, churn(&heap, id as u8)))
    })
    .collect();

  let kept: Vec<(u8, Vec<usize>)> = handles
    .into_iter()
    .map(|handle| handle.join().expect("worker panicked"))
    .collect();

  let snapshot = heap.dump();
  let live: usize = kept.iter().map(|(_, blocks)| blocks.len()).sum();

  assert_eq!(snapshot.check(), Ok(()));
  assert_eq!(live, THREADS * ROUNDS / 4);
  assert_eq!(snapshot.live_blocks(), live);

  // The region is contiguous, so the tail always ends at the break.
  assert_eq!(snapshot.top().map(|block| block.address), snapshot.tail);
  assert_eq!(snapshot.heap_bytes(), heap.held());
  assert_eq!(snapshot.brk, heap.with_break(Region::base) as usize + heap.held());

  for (id, blocks) in &kept {
    for &payload in blocks {
      let block = snapshot.find(payload as *const u8).expect("kept block is listed");
      assert!(!block.is_free);

      let first = unsafe { *(payload as *const u8) };
      assert_eq!(first, *id);
    }
  }
}

#[test]
fn concurrent_release_of_everything_empties_heap() {
  let heap = Arc::new(Heap::new(Region::new(4 << 20)));

  let handles: Vec<_> = (0..THREADS)
    .map(|id| {
      let heap = Arc::clone(&heap);
      thread::spawn(move || churn(&heap, id as u8))
    })
    .collect();

  let kept: Vec<usize> = handles
    .into_iter()
    .flat_map(|handle| handle.join().expect("worker panicked"))
    .collect();

  for &payload in &kept {
    unsafe { heap.release(payload as *mut u8) };
  }

  let snapshot = heap.dump();
  assert_eq!(snapshot.check(), Ok(()));
  assert_eq!(snapshot.live_blocks(), 0);
  assert_eq!(snapshot.len(), snapshot.free_blocks());
}
