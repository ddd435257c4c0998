/*!
  The symbolic form of a program, and its human readable textual form, which is called
  assembly. This module leverages the `strum` derives of the opcode and operator enums to
  serialize and deserialize mnemonics.

  A listing has one record per line:
    ```text
    factorial:          ; a tag definition
        .word 6         ; a raw data word
        LLD 1           ; an instruction with a numeric argument
        BRL if.then.0   ; an instruction with a tag argument
        BOPL *          ; an operator instruction
        RET
    ```
  Everything after a `;` is a comment.
*/

use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{tag, take_while1},
  character::complete::{alpha1, char as one_char, space0, space1},
  combinator::{all_consuming, map, opt},
  sequence::{delimited, pair, preceded, terminated},
  IResult
};
use string_cache::DefaultAtom;

use super::{parse_word, BinaryOperator, Instruction, Opcode, Shape, Target, UnaryOperator, Word};
use crate::error::AssemblyError;

/// Tags are interned, as are all names in this codebase.
pub type Tag = DefaultAtom;

/// One record of a symbolic program.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Assembly {
  Instruction(Instruction),
  /// Names the offset of the next instruction or data word. Consumes no space.
  Tag(Tag),
  /// A raw data word.
  Value(Word),
}

impl Display for Assembly {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Assembly::Instruction(instruction) => write!(f, "    {}", instruction),
      Assembly::Tag(tag)                 => write!(f, "{}:", tag),
      Assembly::Value(value)             => write!(f, "    .word {}", value)
    }
  }
}

/**
  A complete symbolic program: the compiler's output and the assembler's input. It is built
  once and not modified afterward, so it only exposes a read-only view of its records.
*/
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SymbolicProgram {
  records: Vec<Assembly>
}

impl SymbolicProgram {
  pub fn new(records: Vec<Assembly>) -> SymbolicProgram {
    SymbolicProgram { records }
  }
}

impl Deref for SymbolicProgram {
  type Target = [Assembly];

  fn deref(&self) -> &[Assembly] {
    &self.records
  }
}

impl Display for SymbolicProgram {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for record in &self.records {
      writeln!(f, "{}", record)?;
    }
    Ok(())
  }
}

impl FromStr for SymbolicProgram {
  type Err = AssemblyError;

  fn from_str(text: &str) -> Result<SymbolicProgram, AssemblyError> {
    parse_assembly(text).map(SymbolicProgram::new)
  }
}


// region Parsing

/// What a single nonempty line of assembly holds, before mnemonics are checked.
enum Line<'a> {
  Tag(&'a str),
  Value(&'a str),
  Operation {
    mnemonic: &'a str,
    argument: Option<&'a str>
  }
}

fn is_tag_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || "_-?!.".contains(c)
}

fn ptag_definition(text: &str) -> IResult<&str, Line<'_>> {
  map(terminated(take_while1(is_tag_char), one_char(':')), Line::Tag)(text)
}

fn pvalue(text: &str) -> IResult<&str, Line<'_>> {
  map(
    preceded(pair(tag(".word"), space1), take_while1(|c: char| !c.is_whitespace())),
    Line::Value
  )(text)
}

fn poperation(text: &str) -> IResult<&str, Line<'_>> {
  map(
    pair(alpha1, opt(preceded(space1, take_while1(|c: char| !c.is_whitespace())))),
    |(mnemonic, argument)| Line::Operation { mnemonic, argument }
  )(text)
}

fn pline(text: &str) -> IResult<&str, Line<'_>> {
  all_consuming(delimited(space0, alt((ptag_definition, pvalue, poperation)), space0))(text)
}

/**
  Parses an assembly listing into symbolic records. Every line is checked; the first bad line
  aborts the parse with its (1-based) line number.
*/
pub fn parse_assembly(text: &str) -> Result<Vec<Assembly>, AssemblyError> {
  let mut records = Vec::new();

  for (index, raw_line) in text.lines().enumerate() {
    let line_number = index + 1;
    let code = match raw_line.find(';') {
      Some(start) => &raw_line[..start],
      None        => raw_line
    };
    if code.trim().is_empty() {
      continue;
    }

    let syntax_error = |message: String| AssemblyError::Syntax { line: line_number, message };

    let line = match pline(code) {
      Ok((_, line)) => line,
      Err(_)        => return Err(syntax_error(format!("cannot read `{}`", code.trim())))
    };

    let record =
      match line {

        Line::Tag(name) => Assembly::Tag(Tag::from(name)),

        Line::Value(text) => {
          let value = parse_word(text)
            .ok_or_else(|| syntax_error(format!("`{}` is not a word", text)))?;
          Assembly::Value(value)
        }

        Line::Operation { mnemonic, argument } => {
          let opcode = Opcode::from_str(mnemonic)
            .map_err(|_| syntax_error(format!("{} is not an operation", mnemonic)))?;
          let instruction = build_instruction(opcode, argument).map_err(syntax_error)?;
          Assembly::Instruction(instruction)
        }

      };
    records.push(record);
  }

  Ok(records)
}

fn build_instruction(opcode: Opcode, argument: Option<&str>) -> Result<Instruction, String> {
  match (opcode.shape(), argument) {

    (Shape::Nullary, None) => Ok(Instruction::Nullary(opcode)),

    (Shape::Addressed, Some(text)) => {
      let target =
        match parse_word(text) {
          Some(offset)                          => Target::Offset(offset),
          None if text.chars().all(is_tag_char) => Target::Tag(Tag::from(text)),
          None                                  => return Err(format!("`{}` is not a tag", text))
        };
      Ok(Instruction::Addressed { opcode, target })
    }

    (Shape::Frame, Some(text)) => {
      let offset = parse_word(text)
        .ok_or_else(|| format!("{} requires a numeric frame offset, found `{}`", opcode, text))?;
      Ok(Instruction::Frame { opcode, offset })
    }

    (Shape::Unary, Some(text)) => {
      let operator = UnaryOperator::from_str(text)
        .map_err(|_| format!("`{}` is not a unary operator", text))?;
      Ok(Instruction::Unary { opcode, operator })
    }

    (Shape::Binary, Some(text)) => {
      let operator = BinaryOperator::from_str(text)
        .map_err(|_| format!("`{}` is not a binary operator", text))?;
      Ok(Instruction::Binary { opcode, operator })
    }

    (Shape::Nullary, Some(text)) => {
      Err(format!("{} takes no argument but was given `{}`", opcode, text))
    }

    (_, None) => Err(format!("{} requires an argument", opcode))

  }
}

// endregion
