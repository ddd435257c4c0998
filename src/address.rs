//! The fixed layout of the machine's flat address space, and a classification of addresses
//! into the regions of that layout.

use std::fmt::{Display, Formatter};

use crate::bytecode::Word;

/// Addresses are words, so that a pointer can live in a register or a memory cell.
pub type Address = Word;

/// Assembled programs are loaded here. Everything below is device space.
pub const CODE_BASE: Address = 0x0080_0000;
/// The call stack grows upward from here. Programs must fit between the two bases.
pub const STACK_BASE: Address = 0x0081_0000;
/// The largest program, in words, that fits below the stack.
pub const MAX_PROGRAM_WORDS: usize = (STACK_BASE - CODE_BASE) as usize;

/**
  SPR starts this far above the stack base. The words below it form the frame of the
  top-level `CALL main`: slot 0 is never read, slot 1 receives `main`'s return value, and
  slot 2 holds the return address.
*/
pub const ENTRY_FRAME_SIZE: Word = 3;
/// Where `main`'s return value is found after the program halts.
pub const RETURN_SLOT: Address = STACK_BASE + 1;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Region {
  /// Below the code base; reads and writes go to the device.
  Device,
  /// The assembled program, its globals and its literal pool.
  Program,
  /// From the stack base up to the end of memory.
  Stack,
}

impl Region {
  /// Classifies `address` for a memory whose last valid address is `end - 1`.
  pub fn of(address: Address, end: Address) -> Option<Region> {
    match address {
      a if a < 0          => None,
      a if a < CODE_BASE  => Some(Region::Device),
      a if a < STACK_BASE => Some(Region::Program),
      a if a < end        => Some(Region::Stack),
      _                   => None
    }
  }
}

impl Display for Region {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Region::Device  => write!(f, "DEVICE"),
      Region::Program => write!(f, "PROGRAM"),
      Region::Stack   => write!(f, "STACK")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_the_layout() {
    let end = STACK_BASE + 0x100;
    assert_eq!(Region::of(-1, end), None);
    assert_eq!(Region::of(0x7F_FFFF, end), Some(Region::Device));
    assert_eq!(Region::of(CODE_BASE, end), Some(Region::Program));
    assert_eq!(Region::of(STACK_BASE, end), Some(Region::Stack));
    assert_eq!(Region::of(end - 1, end), Some(Region::Stack));
    assert_eq!(Region::of(end, end), None);
  }
}
