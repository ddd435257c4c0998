/*!

  The VM uses a 32 bit word for both data and instructions. Every instruction is exactly
  one word. The opcode lives in the top byte so that a word printed in hex reads opcode
  first. The sizes of instruction components are as follows:

    Opcode:    8 bits
    Offset:   24 bits, signed (static, frame, branch, jump and call instructions)
    Operator:  8 bits, bits 16-23 (unary and binary operator instructions)

  Tags do not appear in the bytecode. They are symbolic names for positions in the
  program which the assembler resolves to offsets from the code base. A data word is
  stored as is and is told apart from an instruction only by the fact that control
  never reaches it.

  The assembler consumes a list of `Assembly` records: instructions whose argument
  may still be a tag, tag definitions, and raw data words. The same records have a
  textual form, parsed and printed by the `assembly` module.

*/

mod assembly;
mod binary;
mod instruction;

pub use assembly::{parse_assembly, Assembly, SymbolicProgram, Tag};
pub use binary::{
  decode_instruction, encode_instruction, from_bytes, to_bytes, Fields, OFFSET_BITS,
  OFFSET_MASK
};
pub use instruction::{BinaryOperator, Instruction, Opcode, Shape, Target, UnaryOperator};

/// A machine word. Registers, memory cells and encoded instructions are all words.
pub type Word = i32;

/**
  Parses the textual form of a word: an optional `-`, then decimal digits or `0x` followed
  by hex digits. Anything in `i32::MIN..=u32::MAX` is accepted, so `0xFFFFFF` colors and
  `-1` both work; values above `i32::MAX` wrap to their two's complement reading.
*/
pub fn parse_word(text: &str) -> Option<Word> {
  let (negative, digits) = match text.strip_prefix('-') {
    Some(rest) => (true, rest),
    None       => (false, text)
  };

  let magnitude: i64 =
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
      Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
        i64::from_str_radix(hex, 16).ok()?
      }
      Some(_) => return None,
      None if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
        digits.parse::<i64>().ok()?
      }
      None => return None
    };

  let value = if negative { -magnitude } else { magnitude };
  match value >= i32::MIN as i64 && value <= u32::MAX as i64 {
    true  => Some(value as u32 as Word),
    false => None
  }
}
