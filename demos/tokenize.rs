//! Reads lines from stdin the way a small shell would: the line buffer and the
//! token pointer array both come from the heap and go back to it after every
//! line.

use std::{
  io::{self, BufRead, Write},
  mem,
  ptr::NonNull,
  slice,
};

use brkalloc::{AllocError, Heap, HeapConfig, Region};

const LINE_CHUNK: usize = 64;
const TOKEN_CHUNK: usize = 8;
const DELIMITERS: &[u8] = b" \t\r\n\x07";

/// Copies `input` into a heap buffer grown `LINE_CHUNK` bytes at a time.
fn read_line(
  heap: &Heap<Region>,
  input: &[u8],
) -> Result<(NonNull<u8>, usize), AllocError> {
  let mut capacity = LINE_CHUNK;
  let mut buffer = heap.allocate(capacity)?;

  for (position, &byte) in input.iter().enumerate() {
    if position >= capacity {
      capacity += LINE_CHUNK;
      buffer = match unsafe { heap.reallocate(buffer.as_ptr(), capacity) } {
        Ok(grown) => grown,
        Err(err) => {
          unsafe { heap.release(buffer.as_ptr()) };
          return Err(err);
        }
      };
    }
    unsafe { buffer.as_ptr().add(position).write(byte) };
  }

  Ok((buffer, input.len()))
}

/// Splits the buffer on whitespace into a heap array of `(start, len)` pairs.
fn split_line(
  heap: &Heap<Region>,
  line: &[u8],
) -> Result<(NonNull<(usize, usize)>, usize), AllocError> {
  let entry = mem::size_of::<(usize, usize)>();
  let mut capacity = TOKEN_CHUNK;
  let mut tokens = heap.allocate(capacity * entry)?.cast::<(usize, usize)>();
  let mut count = 0;

  let mut start = None;
  for (index, byte) in line.iter().chain([&b' ']).enumerate() {
    match (start, DELIMITERS.contains(byte)) {
      (None, false) => start = Some(index),
      (Some(begin), true) => {
        if count >= capacity {
          capacity += TOKEN_CHUNK;
          match unsafe { heap.reallocate(tokens.as_ptr() as *mut u8, capacity * entry) } {
            Ok(grown) => tokens = grown.cast(),
            Err(err) => {
              unsafe { heap.release(tokens.as_ptr() as *mut u8) };
              return Err(err);
            }
          }
        }
        unsafe { tokens.as_ptr().add(count).write((begin, index - begin)) };
        count += 1;
        start = None;
      }
      _ => {}
    }
  }

  Ok((tokens, count))
}

fn main() -> io::Result<()> {
  env_logger::init();

  let heap = Heap::with_config(Region::new(1 << 20), HeapConfig::new().with_log_events(true));
  let stdin = io::stdin();
  let mut stdout = io::stdout();

  for line in stdin.lock().lines() {
    let line = line?;

    let (buffer, len) = match read_line(&heap, line.as_bytes()) {
      Ok(read) => read,
      Err(err) => {
        eprintln!("tokenize: allocation error: {err}");
        continue;
      }
    };
    let bytes = unsafe { slice::from_raw_parts(buffer.as_ptr(), len) };

    match split_line(&heap, bytes) {
      Ok((tokens, count)) => {
        let tokens_slice = unsafe { slice::from_raw_parts(tokens.as_ptr(), count) };
        for &(start, token_len) in tokens_slice {
          let token = String::from_utf8_lossy(&bytes[start..start + token_len]);
          writeln!(stdout, "[{token}]")?;
        }
        unsafe { heap.release(tokens.as_ptr() as *mut u8) };
      }
      Err(err) => eprintln!("tokenize: allocation error: {err}"),
    }

    unsafe { heap.release(buffer.as_ptr()) };
    writeln!(stdout, "-- {} block(s), {} bytes held", heap.dump().len(), heap.held())?;
  }

  Ok(())
}
