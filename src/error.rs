//! Error types for each stage of the toolchain. Every error is fatal to the stage that
//! raises it; nothing here is retried.

use thiserror::Error;

use crate::address::Address;
use crate::bytecode::{Tag, Word};
use crate::compiler::Name;

/// Errors raised while turning source text into a symbolic program.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum CompileError {
  /// The token stream does not match the grammar. `position` is a token index.
  #[error("syntax error at token {position}: {message}")]
  Syntax { position: usize, message: String },

  /// An `IF`, `WHILE`, `INIT` or `SET` form with the wrong number of parts.
  #[error("malformed {form} at token {position}: {message}")]
  MalformedForm { form: &'static str, position: usize, message: String },

  #[error("operator `{operator}` takes {expected} operand(s) but was given {given}")]
  OperatorArity { operator: String, expected: usize, given: usize },

  #[error("`{0}` is already declared")]
  Redeclared(Name),

  #[error("function `{0}` is declared inside another function")]
  NestedFunction(Name),

  #[error("`{0}` is not declared")]
  Undeclared(Name),

  #[error("function `{0}` is not declared")]
  UndeclaredFunction(Name),

  #[error("function `{function}` takes {expected} argument(s) but was given {given}")]
  CallArity { function: Name, expected: usize, given: usize },

  #[error("global `{0}` must be initialized with an integer literal")]
  NonConstantGlobal(Name),

  #[error("`main` must take no parameters but declares {0}")]
  MainArity(usize),
}

/// Errors raised while resolving and encoding a symbolic program.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum AssemblyError {
  #[error("undefined tag `{0}`")]
  UndefinedTag(Tag),

  #[error("tag `{0}` is defined more than once")]
  DuplicateTag(Tag),

  #[error("unsupported instruction `{0}`")]
  UnsupportedInstruction(String),

  #[error("offset {offset} of `{instruction}` does not fit in 24 bits")]
  OffsetOutOfRange { instruction: String, offset: Word },

  /// A line of textual assembly could not be read.
  #[error("line {line}: {message}")]
  Syntax { line: usize, message: String },

  #[error("binary of {0} bytes is not a whole number of words")]
  TruncatedBinary(usize),
}

/// Errors that halt the execution engine.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum RuntimeError {
  #[error("unsupported instruction {word:#010x} at {address:#x}")]
  UnsupportedInstruction { address: Address, word: Word },

  #[error("address {address:#x} is outside addressable memory")]
  OutOfBounds { address: Address },

  #[error("stack overflow: SPR would move to {spr:#x}")]
  StackOverflow { spr: i64 },

  #[error("invalid frame size {size} read from {address:#x}")]
  InvalidFrameSize { address: Address, size: Word },

  #[error("program of {words} words does not fit below the stack")]
  ProgramTooLarge { words: usize },
}

/// Any error the toolchain can produce.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum Error {
  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}
