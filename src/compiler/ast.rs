//! The abstract syntax tree produced by the parser. Every node prints back as source text.

use std::fmt::{Display, Formatter};

use super::Name;
use crate::bytecode::{BinaryOperator, UnaryOperator, Word};

pub const FUNCTION_KEYWORD   : &str = "FUNC";
pub const DECLARATION_KEYWORD: &str = "INIT";
/// Accepted wherever `INIT` is.
pub const VARIABLE_KEYWORD   : &str = "VAR";
pub const ASSIGNMENT_KEYWORD : &str = "SET";
pub const CONDITIONAL_KEYWORD: &str = "IF";
pub const LOOP_KEYWORD       : &str = "WHILE";

pub fn is_keyword(text: &str) -> bool {
  [
    FUNCTION_KEYWORD, DECLARATION_KEYWORD, VARIABLE_KEYWORD, ASSIGNMENT_KEYWORD,
    CONDITIONAL_KEYWORD, LOOP_KEYWORD
  ].contains(&text)
}

/**
  A name starts with a letter or underscore and continues with letters, digits and any of
  `_-?!`. Keywords are not names.
*/
pub fn is_name(text: &str) -> bool {
  let mut chars = text.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphabetic() || first == '_' => {
      chars.all(|c| c.is_ascii_alphanumeric() || "_-?!".contains(c)) && !is_keyword(text)
    }
    _ => false
  }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Expression {
  Literal(Word),
  /// `@name`, a constant unique to the name.
  Symbol(Name),
  /// `name`, or `*name` to read through the pointer held in `name`.
  Reference {
    name    : Name,
    indirect: bool
  },
  Declaration {
    name : Name,
    value: Box<Expression>
  },
  Assignment {
    name    : Name,
    indirect: bool,
    value   : Box<Expression>
  },
  Conditional {
    condition  : Box<Expression>,
    then_branch: Vec<Expression>,
    else_branch: Vec<Expression>
  },
  Loop {
    condition: Box<Expression>,
    body     : Vec<Expression>
  },
  Unary {
    operator: UnaryOperator,
    operand : Box<Expression>
  },
  Binary {
    operator: BinaryOperator,
    left    : Box<Expression>,
    right   : Box<Expression>
  },
  Application {
    function : Name,
    arguments: Vec<Expression>
  },
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Function {
  pub name      : Name,
  pub parameters: Vec<Name>,
  pub body      : Vec<Expression>,
}

impl Function {
  pub fn signature(&self) -> Signature {
    Signature {
      name : self.name.clone(),
      arity: self.parameters.len()
    }
  }
}

/// A top-level form.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Item {
  Declaration {
    name : Name,
    value: Expression
  },
  Function(Function),
}

/**
  A function is known by its name and its arity, written `f/n`. Only the name is used to
  look a function up; the arity is checked against each call.
*/
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Signature {
  pub name : Name,
  pub arity: usize,
}

impl Display for Signature {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.name, self.arity)
  }
}


// region Display

/// Writes each item preceded by a space.
fn write_each<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> std::fmt::Result {
  for item in items {
    write!(f, " {}", item)?;
  }
  Ok(())
}

fn write_block(f: &mut Formatter<'_>, block: &[Expression]) -> std::fmt::Result {
  write!(f, " (")?;
  for (i, expression) in block.iter().enumerate() {
    match i {
      0 => write!(f, "{}", expression)?,
      _ => write!(f, " {}", expression)?
    }
  }
  write!(f, ")")
}

fn star(indirect: bool) -> &'static str {
  match indirect {
    true  => "*",
    false => ""
  }
}

impl Display for Expression {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Expression::Literal(value) => write!(f, "{}", value),

      Expression::Symbol(name) => write!(f, "@{}", name),

      Expression::Reference { name, indirect } => write!(f, "{}{}", star(*indirect), name),

      Expression::Declaration { name, value } => {
        write!(f, "({} {} {})", DECLARATION_KEYWORD, name, value)
      }

      Expression::Assignment { name, indirect, value } => {
        write!(f, "({} {}{} {})", ASSIGNMENT_KEYWORD, star(*indirect), name, value)
      }

      Expression::Conditional { condition, then_branch, else_branch } => {
        write!(f, "({} {}", CONDITIONAL_KEYWORD, condition)?;
        write_block(f, then_branch)?;
        write_block(f, else_branch)?;
        write!(f, ")")
      }

      Expression::Loop { condition, body } => {
        write!(f, "({} {}", LOOP_KEYWORD, condition)?;
        write_each(f, body)?;
        write!(f, ")")
      }

      Expression::Unary { operator, operand } => write!(f, "({} {})", operator, operand),

      Expression::Binary { operator, left, right } => {
        write!(f, "({} {} {})", operator, left, right)
      }

      Expression::Application { function, arguments } => {
        write!(f, "({}", function)?;
        write_each(f, arguments)?;
        write!(f, ")")
      }

    }
  }
}

impl Display for Function {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "({} {} (", FUNCTION_KEYWORD, self.name)?;
    for (i, parameter) in self.parameters.iter().enumerate() {
      match i {
        0 => write!(f, "{}", parameter)?,
        _ => write!(f, " {}", parameter)?
      }
    }
    write!(f, ")")?;
    write_each(f, &self.body)?;
    write!(f, ")")
  }
}

impl Display for Item {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Item::Declaration { name, value } => write!(f, "({} {} {})", DECLARATION_KEYWORD, name, value),
      Item::Function(function)          => write!(f, "{}", function)
    }
  }
}

// endregion
