//! # brkalloc - A First-Fit Allocator over the Program Break
//!
//! This crate provides a thread-safe **first-fit free-list allocator** that
//! takes its memory straight from the program break (`sbrk(2)`) instead of
//! from the platform allocator.
//!
//! ## Overview
//!
//! Every block carries a small header, and the headers are chained together
//! in the order the blocks were carved out of the break:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌────┬──────┬────┬──────────┬────┬─────┐                           │
//!   │   │ H1 │  A1  │ H2 │ A2(free) │ H3 │ A3  │                           │
//!   │   └────┴──────┴────┴──────────┴────┴─────┘                           │
//!   │     │    ▲      │    ▲          │    ▲   ▲                           │
//!   │     └────┼──────┘    │          │    │   │                           │
//!   │  head    │    next───┼──────────┘    │  Program                      │
//!   │          │           │          tail │  Break                        │
//!   │        user        reused by the next fitting request                │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **allocate** walks the list from the head and takes the first free
//!   block that is large enough (no splitting). If none fits, the break is
//!   moved up and the new block becomes the tail.
//! - **release** of the block touching the break moves the break back down.
//!   Any other block is just flagged free (no coalescing).
//! - **allocate_zeroed** checks `count * elem_size` for overflow and clears
//!   the whole block.
//! - **reallocate** keeps blocks that are already big enough, and otherwise
//!   moves the content into a fresh block.
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Block alignment (align!, align_up)
//!   ├── block      - Block header (internal)
//!   ├── brk        - Break managers: Sbrk (the real break), Region (simulated)
//!   ├── config     - HeapConfig
//!   ├── diag       - Snapshot of the block list
//!   ├── error      - AllocError
//!   ├── free_list  - Intrusive block list (internal)
//!   └── heap       - Heap: the allocator itself
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brkalloc::{Heap, Sbrk};
//!
//! let heap = Heap::new(Sbrk::claim().expect("break already in use"));
//!
//! let ptr = heap.allocate(8).unwrap().as_ptr() as *mut u64;
//!
//! unsafe {
//!     *ptr = 42;
//!     println!("Value: {}", *ptr);
//!
//!     heap.release(ptr as *mut u8);
//! }
//! ```
//!
//! Or as the process allocator:
//!
//! ```rust,ignore
//! use brkalloc::{Heap, Sbrk};
//!
//! #[global_allocator]
//! static HEAP: Heap<Sbrk> = Heap::new(unsafe { Sbrk::new() });
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ is_free: false  │  │  │                          │  │
//!   │  │ next: null/ptr  │  │  │  N bytes usable (N%16=0) │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │  HEADER_SIZE bytes    │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user (16-byte aligned)
//! ```
//!
//! ## Limitations
//!
//! - **One lock per heap**: every operation is serialized, and the lock is
//!   not reentrant.
//! - **Fragmentation**: free blocks are never split or merged, and only the
//!   block touching the break is given back to the OS.
//! - **Alignment**: 16 bytes at most.
//! - **Unix-only**: `Sbrk` requires `libc` and `sbrk`.
//!
//! ## Safety
//!
//! Releasing a pointer this heap did not hand out, or releasing one twice,
//! is undefined behaviour. Block headers are not validated.

pub mod align;
mod block;
pub mod brk;
mod config;
pub mod diag;
mod error;
mod free_list;
mod heap;

pub use block::HEADER_SIZE;
pub use brk::{ProgramBreak, Region, Sbrk};
pub use config::HeapConfig;
pub use diag::{BlockInfo, Inconsistency, Snapshot};
pub use error::{AllocError, Result};
pub use heap::Heap;
