//! Read-only views of a heap's block list.

use std::fmt;

use thiserror::Error;

use crate::block::HEADER_SIZE;

/// One block as seen by [`Heap::dump`](crate::Heap::dump).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Header address.
  pub address: usize,
  /// Payload capacity in bytes.
  pub size: usize,
  pub is_free: bool,
  /// Header address of the next block, if any.
  pub next: Option<usize>,
}

impl BlockInfo {
  /// Address handed out to the caller for this block.
  pub fn payload(&self) -> usize {
    self.address + HEADER_SIZE
  }

  /// One past the last payload byte.
  pub fn end(&self) -> usize {
    self.payload() + self.size
  }

  /// Bytes the block takes from the break, header included.
  pub fn span(&self) -> usize {
    HEADER_SIZE + self.size
  }
}

/// The block list and break of a heap at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  pub head: Option<usize>,
  pub tail: Option<usize>,
  /// Break address when the snapshot was taken.
  pub brk: usize,
  pub blocks: Vec<BlockInfo>,
}

/// A violated block-list invariant, as found by [`Snapshot::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Inconsistency {
  #[error("head/tail do not match the first/last block")]
  Ends,

  #[error("block {at:#x} is not linked to its successor")]
  BrokenLink { at: usize },

  #[error("block {at:#x} overlaps the block before it")]
  Overlap { at: usize },

  #[error("block {at:#x} extends past the break")]
  BeyondBreak { at: usize },
}

impl Snapshot {
  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn live_blocks(&self) -> usize {
    self.blocks.iter().filter(|block| !block.is_free).count()
  }

  pub fn free_blocks(&self) -> usize {
    self.blocks.iter().filter(|block| block.is_free).count()
  }

  /// Bytes taken from the break by all blocks, headers included.
  pub fn heap_bytes(&self) -> usize {
    self.blocks.iter().map(BlockInfo::span).sum()
  }

  /// The block whose payload ends at the break, if any.
  pub fn top(&self) -> Option<&BlockInfo> {
    self.blocks.iter().find(|block| block.end() == self.brk)
  }

  pub fn find(
    &self,
    payload: *const u8,
  ) -> Option<&BlockInfo> {
    self.blocks.iter().find(|block| block.payload() == payload as usize)
  }

  /// Verifies the list invariants: matching head and tail, an unbroken
  /// forward chain ending in the tail, and blocks that are ordered, disjoint
  /// and below the break.
  pub fn check(&self) -> Result<(), Inconsistency> {
    let first = self.blocks.first().map(|block| block.address);
    let last = self.blocks.last().map(|block| block.address);

    if self.head != first || self.tail != last {
      return Err(Inconsistency::Ends);
    }

    for pair in self.blocks.windows(2) {
      let (prev, block) = (&pair[0], &pair[1]);

      if prev.next != Some(block.address) {
        return Err(Inconsistency::BrokenLink { at: prev.address });
      }
      if block.address < prev.end() {
        return Err(Inconsistency::Overlap { at: block.address });
      }
    }

    if let Some(last) = self.blocks.last() {
      if last.next.is_some() {
        return Err(Inconsistency::BrokenLink { at: last.address });
      }
      if last.end() > self.brk {
        return Err(Inconsistency::BeyondBreak { at: last.address });
      }
    }

    Ok(())
  }
}

fn fmt_addr(address: Option<usize>) -> String {
  match address {
    Some(address) => format!("{address:#x}"),
    None => "0x0".to_string(),
  }
}

impl fmt::Display for Snapshot {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(
      f,
      "head = {}, tail = {}, break = {:#x}",
      fmt_addr(self.head),
      fmt_addr(self.tail),
      self.brk
    )?;

    for block in &self.blocks {
      writeln!(
        f,
        "addr = {:#x}, size = {}, is_free = {}, next = {}",
        block.address,
        block.size,
        block.is_free,
        fmt_addr(block.next)
      )?;
    }

    Ok(())
  }
}
