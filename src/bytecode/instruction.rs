use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};

use super::{Tag, Word};

/**
  Opcodes of the virtual machine.

  The opcode values are fixed by the binary format and are grouped into families by their
  high nibble: `0x1_` loads, `0x2_` stores, `0x3_` register operations and `0x4_` control
  flow. Within the load and store families, bit 0 selects the right register, bit 1 selects
  indirect access and bit 2 selects frame-relative rather than static addressing.
  Order-dependencies:
    ```text
    Opcode::shape()
    Opcode::is_store() / Opcode::load_for()
    ```

  The `strum` serialization of each variant is its assembly mnemonic.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq,         PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum Opcode {
  #[strum(serialize = "NOP")]  Nop                     = 0x00,

  // Loads //
  #[strum(serialize = "LLS")]  LoadLeftStatic          = 0x10,
  #[strum(serialize = "LRS")]  LoadRightStatic         = 0x11,
  #[strum(serialize = "LLSI")] LoadLeftStaticIndirect  = 0x12,
  #[strum(serialize = "LRSI")] LoadRightStaticIndirect = 0x13,
  #[strum(serialize = "LLD")]  LoadLeftFrame           = 0x14,
  #[strum(serialize = "LRD")]  LoadRightFrame          = 0x15,
  #[strum(serialize = "LLDI")] LoadLeftFrameIndirect   = 0x16,
  #[strum(serialize = "LRDI")] LoadRightFrameIndirect  = 0x17,

  // Stores //
  #[strum(serialize = "SLS")]  StoreLeftStatic          = 0x20,
  #[strum(serialize = "SRS")]  StoreRightStatic         = 0x21,
  #[strum(serialize = "SLSI")] StoreLeftStaticIndirect  = 0x22,
  #[strum(serialize = "SRSI")] StoreRightStaticIndirect = 0x23,
  #[strum(serialize = "SLD")]  StoreLeftFrame           = 0x24,
  #[strum(serialize = "SRD")]  StoreRightFrame          = 0x25,
  #[strum(serialize = "SLDI")] StoreLeftFrameIndirect   = 0x26,
  #[strum(serialize = "SRDI")] StoreRightFrameIndirect  = 0x27,

  // Register operations //
  #[strum(serialize = "UOPL")] UnaryLeft   = 0x30,
  #[strum(serialize = "UOPR")] UnaryRight  = 0x31,
  #[strum(serialize = "BOPL")] BinaryLeft  = 0x32,
  #[strum(serialize = "BOPR")] BinaryRight = 0x33,
  #[strum(serialize = "SWP")]  Swap        = 0x34,

  // Control flow //
  #[strum(serialize = "BRL")]  BranchLeft  = 0x40,
  #[strum(serialize = "BRR")]  BranchRight = 0x41,
  #[strum(serialize = "JMP")]  Jump        = 0x42,
  #[strum(serialize = "CALL")] Call        = 0x43,
  #[strum(serialize = "RET")]  Return      = 0x44,
}

/// The argument an opcode expects, which determines how the low 24 bits are used.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Shape {
  /// An offset from the code base, written either as a number or as a tag.
  Addressed,
  /// An offset from the current frame base. Always a number.
  Frame,
  /// A unary operator code in bits 16-23.
  Unary,
  /// A binary operator code in bits 16-23.
  Binary,
  /// No argument.
  Nullary
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn shape(&self) -> Shape {
    match self.code() {
      0x30 | 0x31           => Shape::Unary,
      0x32 | 0x33           => Shape::Binary,
      0x40..=0x43           => Shape::Addressed,
      code if code & 0xF0 == 0x10 || code & 0xF0 == 0x20 => {
        match code & 0x04 == 0 {
          true  => Shape::Addressed,
          false => Shape::Frame
        }
      }
      _                     => Shape::Nullary
    }
  }

  pub fn is_store(&self) -> bool {
    self.code() & 0xF0 == 0x20
  }

  /// For a store, the load that reads back the same register from the same location.
  pub fn load_for(&self) -> Option<Opcode> {
    match self.is_store() {
      // Loads and stores share the low nibble, so this cannot fail.
      true  => Opcode::try_from(self.code() - 0x10).ok(),
      false => None
    }
  }
}

/// The operand of an addressed instruction: either already numeric or a tag to be resolved.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Target {
  Offset(Word),
  Tag(Tag)
}

impl Display for Target {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Target::Offset(offset) => write!(f, "{}", offset),
      Target::Tag(tag)       => write!(f, "{}", tag)
    }
  }
}

/// Holds the unencoded components of an instruction. As such, it enumerates the possible
/// instruction argument combinations.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Instruction {
  /// [OpCode:8][Offset:24], relative to the code base
  Addressed {
    opcode: Opcode,
    target: Target
  },
  /// [OpCode:8][Offset:24], relative to SPL
  Frame {
    opcode: Opcode,
    offset: Word
  },
  /// [OpCode:8][Operator:8][Reserved:16]
  Unary {
    opcode  : Opcode,
    operator: UnaryOperator
  },
  /// [OpCode:8][Operator:8][Reserved:16]
  Binary {
    opcode  : Opcode,
    operator: BinaryOperator
  },
  /// [OpCode:8][Reserved:24]
  Nullary(Opcode),
}

impl Instruction {
  pub fn opcode(&self) -> Opcode {
    match self {
      | Instruction::Addressed { opcode, .. }
      | Instruction::Frame     { opcode, .. }
      | Instruction::Unary     { opcode, .. }
      | Instruction::Binary    { opcode, .. }
      | Instruction::Nullary(opcode)          => *opcode
    }
  }

  /// The shape implied by the variant, which must agree with `self.opcode().shape()`.
  pub fn shape(&self) -> Shape {
    match self {
      Instruction::Addressed { .. } => Shape::Addressed,
      Instruction::Frame     { .. } => Shape::Frame,
      Instruction::Unary     { .. } => Shape::Unary,
      Instruction::Binary    { .. } => Shape::Binary,
      Instruction::Nullary(_)       => Shape::Nullary
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Addressed { opcode, target } => {
        write!(f, "{} {}", opcode, target)
      }

      Instruction::Frame { opcode, offset } => {
        write!(f, "{} {}", opcode, offset)
      }

      Instruction::Unary { opcode, operator } => {
        write!(f, "{} {}", opcode, operator)
      }

      Instruction::Binary { opcode, operator } => {
        write!(f, "{} {}", opcode, operator)
      }

      Instruction::Nullary(opcode) => {
        write!(f, "{}", opcode)
      }

    }
  }
}


// region Operators

#[derive(
StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq,         PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum UnaryOperator {
  #[strum(serialize = "~")] BitNot     = 0x00,
  #[strum(serialize = "!")] LogicalNot = 0x01,
}

impl UnaryOperator {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn apply(&self, operand: Word) -> Word {
    match self {
      UnaryOperator::BitNot     => !operand,
      UnaryOperator::LogicalNot => (operand == 0) as Word
    }
  }
}

#[derive(
StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq,         PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum BinaryOperator {
  // Bitwise
  #[strum(serialize = ">>")] ShiftRight   = 0x10,
  #[strum(serialize = "<<")] ShiftLeft    = 0x11,
  #[strum(serialize = "&")]  And          = 0x12,
  #[strum(serialize = "|")]  Or           = 0x13,
  #[strum(serialize = "^")]  Xor          = 0x14,
  // Comparison and logic
  #[strum(serialize = "==")] Equal        = 0x20,
  #[strum(serialize = "!=")] NotEqual     = 0x21,
  #[strum(serialize = "<=")] LessEqual    = 0x22,
  #[strum(serialize = ">=")] GreaterEqual = 0x23,
  #[strum(serialize = "<")]  Less         = 0x24,
  #[strum(serialize = ">")]  Greater      = 0x25,
  #[strum(serialize = "&&")] LogicalAnd   = 0x26,
  #[strum(serialize = "||")] LogicalOr    = 0x27,
  // Arithmetic
  #[strum(serialize = "+")]  Add          = 0x30,
  #[strum(serialize = "-")]  Sub          = 0x31,
  #[strum(serialize = "*")]  Mul          = 0x32,
  #[strum(serialize = "/")]  Div          = 0x33,
  #[strum(serialize = "%")]  Mod          = 0x34,
  #[strum(serialize = "**")] Pow          = 0x35,
}

impl BinaryOperator {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /**
    Applies the operator with 32 bit two's complement semantics. Shift counts use their low
    five bits, division truncates toward zero, and a negative exponent yields the integer
    part of the real result. Dividing by zero, or taking a remainder by zero, yields 0.
  */
  pub fn apply(&self, left: Word, right: Word) -> Word {
    match self {
      BinaryOperator::ShiftRight   => left.wrapping_shr(right as u32),
      BinaryOperator::ShiftLeft    => left.wrapping_shl(right as u32),
      BinaryOperator::And          => left & right,
      BinaryOperator::Or           => left | right,
      BinaryOperator::Xor          => left ^ right,
      BinaryOperator::Equal        => (left == right) as Word,
      BinaryOperator::NotEqual     => (left != right) as Word,
      BinaryOperator::LessEqual    => (left <= right) as Word,
      BinaryOperator::GreaterEqual => (left >= right) as Word,
      BinaryOperator::Less         => (left < right) as Word,
      BinaryOperator::Greater      => (left > right) as Word,
      BinaryOperator::LogicalAnd   => (left != 0 && right != 0) as Word,
      BinaryOperator::LogicalOr    => (left != 0 || right != 0) as Word,
      BinaryOperator::Add          => left.wrapping_add(right),
      BinaryOperator::Sub          => left.wrapping_sub(right),
      BinaryOperator::Mul          => left.wrapping_mul(right),
      BinaryOperator::Div          => match right {
        0 => 0,
        _ => left.wrapping_div(right)
      },
      BinaryOperator::Mod          => match right {
        0 => 0,
        _ => left.wrapping_rem(right)
      },
      BinaryOperator::Pow          => power(left, right)
    }
  }
}

fn power(base: Word, exponent: Word) -> Word {
  match exponent >= 0 {
    true  => base.wrapping_pow(exponent as u32),
    false => match base {
      1  => 1,
      -1 => if exponent % 2 == 0 { 1 } else { -1 },
      _  => 0
    }
  }
}

// endregion


#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn mnemonics_round_trip_through_strum() {
    assert_eq!(Opcode::from_str("LLSI").unwrap(), Opcode::LoadLeftStaticIndirect);
    assert_eq!(Opcode::StoreRightFrame.to_string(), "SRD");
    assert_eq!(BinaryOperator::from_str("**").unwrap(), BinaryOperator::Pow);
    assert_eq!(UnaryOperator::LogicalNot.to_string(), "!");
    assert!(Opcode::from_str("PUSH").is_err());
  }

  #[test]
  fn opcode_shapes_follow_the_families() {
    assert_eq!(Opcode::LoadLeftStatic.shape(), Shape::Addressed);
    assert_eq!(Opcode::StoreRightStaticIndirect.shape(), Shape::Addressed);
    assert_eq!(Opcode::LoadRightFrameIndirect.shape(), Shape::Frame);
    assert_eq!(Opcode::StoreLeftFrame.shape(), Shape::Frame);
    assert_eq!(Opcode::UnaryRight.shape(), Shape::Unary);
    assert_eq!(Opcode::BinaryLeft.shape(), Shape::Binary);
    assert_eq!(Opcode::Call.shape(), Shape::Addressed);
    assert_eq!(Opcode::Swap.shape(), Shape::Nullary);
    assert_eq!(Opcode::Return.shape(), Shape::Nullary);
    assert_eq!(Opcode::Nop.shape(), Shape::Nullary);
  }

  #[test]
  fn stores_pair_with_their_loads() {
    assert_eq!(Opcode::StoreLeftFrame.load_for(), Some(Opcode::LoadLeftFrame));
    assert_eq!(Opcode::StoreRightStaticIndirect.load_for(), Some(Opcode::LoadRightStaticIndirect));
    assert_eq!(Opcode::LoadLeftFrame.load_for(), None);
  }

  #[test]
  fn arithmetic_wraps_at_32_bits() {
    assert_eq!(BinaryOperator::Add.apply(0x7FFF_FFFF, 1), i32::MIN);
    assert_eq!(BinaryOperator::Sub.apply(i32::MIN, 1), i32::MAX);
    assert_eq!(BinaryOperator::Mul.apply(0x10000, 0x10000), 0);
    assert_eq!(BinaryOperator::Pow.apply(2, 31), i32::MIN);
  }

  #[test]
  fn division_truncates_toward_zero_and_by_zero_yields_zero() {
    assert_eq!(BinaryOperator::Div.apply(-7, 2), -3);
    assert_eq!(BinaryOperator::Mod.apply(-7, 2), -1);
    assert_eq!(BinaryOperator::Div.apply(i32::MIN, -1), i32::MIN);
    assert_eq!(BinaryOperator::Mod.apply(i32::MIN, -1), 0);
    assert_eq!(BinaryOperator::Div.apply(1, 0), 0);
    assert_eq!(BinaryOperator::Mod.apply(1, 0), 0);
  }

  #[test]
  fn comparisons_and_logic_yield_zero_or_one() {
    assert_eq!(BinaryOperator::Less.apply(-1, 0), 1);
    assert_eq!(BinaryOperator::GreaterEqual.apply(3, 4), 0);
    assert_eq!(BinaryOperator::LogicalAnd.apply(5, -2), 1);
    assert_eq!(BinaryOperator::LogicalOr.apply(0, 0), 0);
    assert_eq!(UnaryOperator::LogicalNot.apply(42), 0);
    assert_eq!(UnaryOperator::BitNot.apply(0), -1);
  }

  #[test]
  fn shifts_use_the_low_five_bits() {
    assert_eq!(BinaryOperator::ShiftLeft.apply(1, 33), 2);
    assert_eq!(BinaryOperator::ShiftRight.apply(-8, 1), -4);
  }

  #[test]
  fn negative_exponents_truncate() {
    assert_eq!(BinaryOperator::Pow.apply(2, -1), 0);
    assert_eq!(BinaryOperator::Pow.apply(-1, -3), -1);
    assert_eq!(BinaryOperator::Pow.apply(1, -5), 1);
  }
}
