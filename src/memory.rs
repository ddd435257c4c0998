//! The flat word-addressed memory of the machine. RAM covers the program and stack regions;
//! everything below the code base is forwarded to the device.

use tracing::debug;

use crate::address::{Address, Region, CODE_BASE, MAX_PROGRAM_WORDS};
use crate::bytecode::Word;
use crate::device::Device;
use crate::error::RuntimeError;

pub struct Memory<D: Device> {
  /// Words from `CODE_BASE` up to `end`.
  ram   : Vec<Word>,
  device: D,
}

impl<D: Device> Memory<D> {
  /// Creates a zeroed memory with `stack_words` words of stack above `STACK_BASE`.
  pub fn new(device: D, stack_words: usize) -> Memory<D> {
    Memory {
      ram: vec![0; MAX_PROGRAM_WORDS + stack_words],
      device
    }
  }

  /// One past the last valid address.
  pub fn end(&self) -> Address {
    CODE_BASE + self.ram.len() as Address
  }

  pub fn device(&self) -> &D {
    &self.device
  }

  pub fn device_mut(&mut self) -> &mut D {
    &mut self.device
  }

  /// Copies an assembled program to the code base. The previous contents of RAM are cleared.
  pub fn load(&mut self, words: &[Word]) -> Result<(), RuntimeError> {
    if words.len() > MAX_PROGRAM_WORDS {
      return Err(RuntimeError::ProgramTooLarge { words: words.len() });
    }
    self.ram.iter_mut().for_each(|word| *word = 0);
    self.ram[..words.len()].copy_from_slice(words);
    debug!(words = words.len(), "loaded program");
    Ok(())
  }

  pub fn read(&mut self, address: Address) -> Result<Word, RuntimeError> {
    match Region::of(address, self.end()) {
      Some(Region::Device)                    => Ok(self.device.read(address)),
      Some(Region::Program | Region::Stack)   => Ok(self.ram[(address - CODE_BASE) as usize]),
      None                                    => Err(RuntimeError::OutOfBounds { address })
    }
  }

  pub fn write(&mut self, address: Address, value: Word) -> Result<(), RuntimeError> {
    match Region::of(address, self.end()) {
      Some(Region::Device) => {
        self.device.write(address, value);
        Ok(())
      }
      Some(Region::Program | Region::Stack) => {
        self.ram[(address - CODE_BASE) as usize] = value;
        Ok(())
      }
      None => Err(RuntimeError::OutOfBounds { address })
    }
  }

  /// Reads RAM without touching the device, for display. Device and invalid addresses read
  /// as `None`.
  pub fn peek(&self, address: Address) -> Option<Word> {
    match address >= CODE_BASE && address < self.end() {
      true  => Some(self.ram[(address - CODE_BASE) as usize]),
      false => None
    }
  }
}
