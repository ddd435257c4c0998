/*!
  A toolchain for a small Lisp-like language: a compiler to symbolic assembly, a two-pass
  assembler to 32 bit words, and a virtual machine with two working registers, a frame base
  and a stack top.

  ```text
  source -> compiler::compile -> SymbolicProgram -> assembler::assemble -> words -> Cpu::run
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod assembler;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod cpu;
pub mod device;
pub mod error;
pub mod memory;

pub use error::Error;

use crate::bytecode::Word;

/// Compiles and assembles `source` into words ready to load at the code base.
pub fn build(source: &str) -> Result<Vec<Word>, Error> {
  let program = compiler::compile(source)?;
  Ok(assembler::assemble(&program)?)
}
