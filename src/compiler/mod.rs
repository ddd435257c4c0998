/*!
  Compiles source text to a symbolic program.

  The compilation pipeline is this:
  ```text
  text -> [`lexer::tokenize`] -> `Token`s -> [`parser::parse`] -> `Item`s ->⋯

  ⋯-> [`Compiler::compile_program`] -> `SymbolicProgram` -> [`optimize`] -> `SymbolicProgram`
  ```
  The result is handed to the assembler.
*/

mod ast;
mod codegen;
mod frame;
mod lexer;
mod parser;
mod symbols;

use string_cache::DefaultAtom;
use tracing::info;

pub use ast::{is_name, Expression, Function, Item, Signature};
pub use codegen::{Compiler, ENTRY_POINT};
pub use frame::{temporaries, Frame};
pub use lexer::{tokenize, Token};
pub use parser::{parse, parse_expression};
pub use symbols::{SymbolPool, SYMBOL_BASE};

use crate::assembler::optimize;
use crate::bytecode::SymbolicProgram;
use crate::error::CompileError;

/// Variable, function and symbol names are interned, as are all names in this codebase.
pub type Name = DefaultAtom;

/// Compiles `source` and removes redundant reloads from the result.
pub fn compile(source: &str) -> Result<SymbolicProgram, CompileError> {
  let program   = compile_unoptimized(source)?;
  let optimized = SymbolicProgram::new(optimize(&program));
  info!(
    records = optimized.len(),
    removed = program.len() - optimized.len(),
    "compiled"
  );
  Ok(optimized)
}

/// Compiles `source` exactly as the code generator emits it.
pub fn compile_unoptimized(source: &str) -> Result<SymbolicProgram, CompileError> {
  let items = parse(source)?;
  Compiler::new().compile_program(&items)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{Assembly, Instruction, Opcode};

  const FACTORIAL: &str = "
    ; n! by recursion
    (FUNC main () (factorial 5))
    (FUNC factorial (n)
      (IF (< n 2)
        (1)
        ((* n (factorial (- n 1))))))
  ";

  #[test]
  fn compile_drops_reloads() {
    let plain     = compile_unoptimized(FACTORIAL).unwrap();
    let optimized = compile(FACTORIAL).unwrap();
    assert!(optimized.len() < plain.len());
    assert_eq!(optimize(&optimized), optimized.to_vec());
  }

  #[test]
  fn program_starts_with_the_entry_call() {
    let program = compile(FACTORIAL).unwrap();
    assert_eq!(
      program[0],
      Assembly::Instruction(Instruction::Addressed {
        opcode: Opcode::Call,
        target: crate::bytecode::Target::Tag(Name::from(ENTRY_POINT))
      })
    );
  }

  #[test]
  fn errors_surface_before_assembly() {
    assert_eq!(
      compile("(FUNC main () (+ x 1))"),
      Err(CompileError::Undeclared(Name::from("x")))
    );
  }
}
