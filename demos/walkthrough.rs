use std::{io::Read, mem, ptr};

use brkalloc::{Heap, HeapConfig, Sbrk};

/// Waits until the user presses ENTER, when run with `--step`.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn print_program_break(
  label: &str,
  heap: &Heap<Sbrk>,
) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    heap.current_break(),
  );
}

fn main() {
  env_logger::init();

  let step = std::env::args().any(|arg| arg == "--step");

  let Some(sbrk) = Sbrk::claim() else {
    eprintln!("program break is already in use");
    return;
  };
  let heap = Heap::with_config(sbrk, HeapConfig::new().with_log_events(true));

  print_program_break("start", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32. Every block is rounded up to 16 bytes.
  // --------------------------------------------------------------------
  let first_block = heap.allocate(mem::size_of::<u32>()).expect("allocate u32");
  println!("\n[1] Allocate u32 at {:?}", first_block);

  let first_ptr = first_block.as_ptr() as *mut u32;
  unsafe { first_ptr.write(0xDEADBEEF) };
  println!("[1] Value written = 0x{:X}", unsafe { first_ptr.read() });
  print_program_break("1", &heap);
  pause(step);

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes and fill them with a pattern.
  // --------------------------------------------------------------------
  let second_block = heap.allocate(12).expect("allocate [u8; 12]");
  unsafe { ptr::write_bytes(second_block.as_ptr(), 0xAB, 12) };
  println!("\n[2] Allocate [u8; 12] at {:?}, filled with 0xAB", second_block);
  pause(step);

  // --------------------------------------------------------------------
  // 3) Zeroed array of u16, then grow it in place or by moving.
  // --------------------------------------------------------------------
  let third_block = heap.allocate_zeroed(16, mem::size_of::<u16>()).expect("allocate [u16; 16]");
  let third_ptr = third_block.as_ptr() as *mut u16;
  for i in 0..16 {
    unsafe { third_ptr.add(i).write(i as u16) };
  }
  println!("\n[3] Zeroed [u16; 16] at {:?}, wrote 0..15", third_block);

  let grown = unsafe { heap.reallocate(third_block.as_ptr(), 64 * mem::size_of::<u16>()) }
    .expect("grow to [u16; 64]");
  let last = unsafe { (grown.as_ptr() as *mut u16).add(15).read() };
  println!("[3] Grown to [u16; 64] at {:?}, element 15 = {}", grown, last);
  print!("{}", heap.dump());
  pause(step);

  // --------------------------------------------------------------------
  // 4) Release the first block. It is not at the top of the heap, so it is
  //    only marked free.
  // --------------------------------------------------------------------
  unsafe { heap.release(first_block.as_ptr()) };
  println!("\n[4] Released first block");
  print!("{}", heap.dump());
  pause(step);

  // --------------------------------------------------------------------
  // 5) A small request reuses the first free block that fits.
  // --------------------------------------------------------------------
  let fifth_block = heap.allocate(2).expect("allocate [u8; 2]");
  println!(
    "\n[5] Allocate [u8; 2]: {}",
    if fifth_block == first_block {
      "reused the freed block"
    } else {
      "allocated somewhere else"
    }
  );
  pause(step);

  // --------------------------------------------------------------------
  // 6) A large block moves the break; releasing it moves it back.
  // --------------------------------------------------------------------
  print_program_break("before large alloc", &heap);
  let big_block = heap.allocate(64 * 1024).expect("allocate 64 KiB");
  print_program_break("after large alloc", &heap);
  unsafe { heap.release(big_block.as_ptr()) };
  print_program_break("after large release", &heap);
  pause(step);

  println!("\n[7] End of walkthrough.");
  print!("{}", heap.dump());
}
