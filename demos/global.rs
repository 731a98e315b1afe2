//! Routes every allocation of this program through the break heap.

use std::collections::BTreeMap;

use brkalloc::{Heap, Sbrk};

// Only this heap drives the break in this process.
#[global_allocator]
static HEAP: Heap<Sbrk> = Heap::new(unsafe { Sbrk::new() });

/// Counts blocks without allocating: the callback runs under the heap lock.
fn census() -> (usize, usize, usize) {
  let (mut live, mut free, mut bytes) = (0, 0, 0);

  HEAP.for_each_block(|block| {
    if block.is_free {
      free += 1;
    } else {
      live += 1;
    }
    bytes += block.span();
  });

  (live, free, bytes)
}

fn main() {
  let start = HEAP.current_break();

  let mut words: BTreeMap<String, usize> = BTreeMap::new();
  let text = "the quick brown fox jumps over the lazy dog the end";
  for word in text.split_whitespace() {
    *words.entry(word.to_string()).or_default() += 1;
  }

  let squares: Vec<u64> = (0..1_000).map(|n| n * n).collect();

  let (live, free, bytes) = census();
  println!("words = {words:?}");
  println!("sum of squares = {}", squares.iter().sum::<u64>());
  println!("blocks: {live} live, {free} free, {bytes} bytes");
  println!("break moved from {start:?} to {:?}", HEAP.current_break());

  drop(squares);
  drop(words);

  let (live, free, bytes) = census();
  println!("after drop: {live} live, {free} free, {bytes} bytes");
}
