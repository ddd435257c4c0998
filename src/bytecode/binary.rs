/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Layout of an instruction word, most significant bit first:
    ```text
    [OpCode:8][Offset:24]                       addressed and frame instructions
    [OpCode:8][Operator:8][Reserved:16]         operator instructions
    [OpCode:8][Reserved:24]                     everything else
    ```
*/

use super::{BinaryOperator, Instruction, Opcode, Shape, Target, UnaryOperator, Word};
use crate::error::AssemblyError;

// If you change these you must also change `Fields::of` and `encode_instruction`.
pub const OFFSET_BITS: u32 = 24;
pub const OFFSET_MASK: u32 = (1 << OFFSET_BITS) - 1;
const OFFSET_MIN: Word = -(1 << (OFFSET_BITS - 1));
const OFFSET_MAX: Word = (1 << (OFFSET_BITS - 1)) - 1;

/// The raw fields of a word, before the opcode and operator are validated.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Fields {
  pub opcode  : u8,
  /// The low 24 bits, sign extended.
  pub offset  : Word,
  pub operator: u8
}

impl Fields {
  pub fn of(word: Word) -> Fields {
    Fields {
      opcode  : ((word as u32) >> 24) as u8,
      offset  : (word << 8) >> 8,
      operator: ((word as u32) >> 16) as u8
    }
  }
}

/**
  Encodes the instruction into a word. Tags must already have been resolved to offsets, and
  the variant must match the opcode's shape. Offsets must fit in 24 signed bits; they are
  masked to 24 bits before insertion.
*/
pub fn encode_instruction(instruction: &Instruction) -> Result<Word, AssemblyError> {
  let opcode = instruction.opcode();
  if opcode.shape() != instruction.shape() {
    return Err(AssemblyError::UnsupportedInstruction(instruction.to_string()));
  }
  let high = (opcode.code() as u32) << 24;

  let word =
    match instruction {

      Instruction::Addressed { target: Target::Tag(tag), .. } => {
        return Err(AssemblyError::UndefinedTag(tag.clone()));
      }

      | Instruction::Addressed { target: Target::Offset(offset), .. }
      | Instruction::Frame     { offset, .. } => {
        if *offset < OFFSET_MIN || *offset > OFFSET_MAX {
          return Err(AssemblyError::OffsetOutOfRange {
            instruction: instruction.to_string(),
            offset     : *offset
          });
        }
        high | (*offset as u32 & OFFSET_MASK)
      }

      Instruction::Unary { operator, .. } => {
        high | ((operator.code() as u32) << 16)
      }

      Instruction::Binary { operator, .. } => {
        high | ((operator.code() as u32) << 16)
      }

      Instruction::Nullary(_) => high

    };

  Ok(word as Word)
}

/**
  Recovers the instruction a word encodes, or `None` if the opcode or operator code is not in
  the instruction set. Addressed targets come back as numeric offsets, since tags do not
  survive assembly. Reserved bits are ignored.
*/
pub fn decode_instruction(word: Word) -> Option<Instruction> {
  let fields = Fields::of(word);
  let opcode = Opcode::try_from(fields.opcode).ok()?;

  let instruction =
    match opcode.shape() {
      Shape::Addressed => Instruction::Addressed {
        opcode,
        target: Target::Offset(fields.offset)
      },
      Shape::Frame     => Instruction::Frame {
        opcode,
        offset: fields.offset
      },
      Shape::Unary     => Instruction::Unary {
        opcode,
        operator: UnaryOperator::try_from(fields.operator).ok()?
      },
      Shape::Binary    => Instruction::Binary {
        opcode,
        operator: BinaryOperator::try_from(fields.operator).ok()?
      },
      Shape::Nullary   => Instruction::Nullary(opcode)
    };

  Some(instruction)
}

/// Serializes words as big-endian bytes, the persisted form of an assembled program.
pub fn to_bytes(words: &[Word]) -> Vec<u8> {
  words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// Reads big-endian words back. The length must be a whole number of words.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Word>, AssemblyError> {
  if bytes.len() % 4 != 0 {
    return Err(AssemblyError::TruncatedBinary(bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|chunk| Word::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect()
  )
}
