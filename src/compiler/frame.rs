/*!
  Stack frame layout. Slots are numbered from the frame base, SPL:
    ```text
    0                     saved SPL of the caller
    1 ..= p               parameters
    p+1 ..= p+l           locals, in declaration order
    temp_start ..         temporaries
    return_slot           the callee's return value, written through `SLD -2`
    return_slot + 1       the return address
    ```
  The frame size counts all of these, so SPR is `SPL + size` while the function runs and
  the callee's frame begins at the caller's slot `size`. Outgoing argument `i` is staged in
  slot `size + 1 + i`, which is the callee's parameter slot `1 + i`.
*/

use std::collections::HashMap;

use super::ast::{Expression, Function};
use super::Name;
use crate::bytecode::Word;
use crate::error::CompileError;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Frame {
  slots      : HashMap<Name, Word>,
  /// Parameters and locals together.
  variables  : Word,
  temporaries: Word,
}

impl Frame {
  /// Assigns a slot to every parameter and local of `function` and sizes the temporary region.
  pub fn allocate(function: &Function) -> Result<Frame, CompileError> {
    let mut frame = Frame {
      slots      : HashMap::new(),
      variables  : 0,
      temporaries: 0
    };

    for parameter in &function.parameters {
      frame.declare(parameter)?;
    }
    for expression in &function.body {
      frame.declare_locals(expression)?;
    }
    frame.temporaries = function.body.iter().map(temporaries).max().unwrap_or(0);

    Ok(frame)
  }

  fn declare(&mut self, name: &Name) -> Result<(), CompileError> {
    self.variables += 1;
    match self.slots.insert(name.clone(), self.variables) {
      Some(_) => Err(CompileError::Redeclared(name.clone())),
      None    => Ok(())
    }
  }

  /// Declarations anywhere in the body, including nested blocks, are function scoped.
  fn declare_locals(&mut self, expression: &Expression) -> Result<(), CompileError> {
    match expression {

      Expression::Declaration { name, value } => {
        self.declare(name)?;
        self.declare_locals(value)
      }

      Expression::Assignment { value, .. } => self.declare_locals(value),

      Expression::Conditional { condition, then_branch, else_branch } => {
        self.declare_locals(condition)?;
        for expression in then_branch.iter().chain(else_branch) {
          self.declare_locals(expression)?;
        }
        Ok(())
      }

      Expression::Loop { condition, body } => {
        self.declare_locals(condition)?;
        for expression in body {
          self.declare_locals(expression)?;
        }
        Ok(())
      }

      Expression::Unary { operand, .. } => self.declare_locals(operand),

      Expression::Binary { left, right, .. } => {
        self.declare_locals(left)?;
        self.declare_locals(right)
      }

      Expression::Application { arguments, .. } => {
        for argument in arguments {
          self.declare_locals(argument)?;
        }
        Ok(())
      }

      Expression::Literal(_) | Expression::Symbol(_) | Expression::Reference { .. } => Ok(())

    }
  }

  pub fn slot(&self, name: &Name) -> Option<Word> {
    self.slots.get(name).copied()
  }

  pub fn temp_start(&self) -> Word {
    1 + self.variables
  }

  pub fn return_slot(&self) -> Word {
    self.temp_start() + self.temporaries
  }

  pub fn size(&self) -> Word {
    self.return_slot() + 2
  }

  pub fn argument_slot(&self, index: usize) -> Word {
    self.size() + 1 + index as Word
  }
}

/**
  The number of temporary slots needed to evaluate `expression` when its temporaries start at
  some offset. A binary operation holds its left operand in one slot while the right operand
  is evaluated above it. An application holds each evaluated argument in its own slot while
  the later arguments are evaluated above them.
*/
pub fn temporaries(expression: &Expression) -> Word {
  match expression {

    Expression::Literal(_) | Expression::Symbol(_) | Expression::Reference { .. } => 0,

    | Expression::Declaration { value, .. }
    | Expression::Assignment  { value, .. } => temporaries(value),

    Expression::Conditional { condition, then_branch, else_branch } => {
      then_branch
        .iter()
        .chain(else_branch)
        .map(temporaries)
        .fold(temporaries(condition), Word::max)
    }

    Expression::Loop { condition, body } => {
      body.iter().map(temporaries).fold(temporaries(condition), Word::max)
    }

    Expression::Unary { operand, .. } => temporaries(operand),

    Expression::Binary { left, right, .. } => temporaries(left).max(1 + temporaries(right)),

    Expression::Application { arguments, .. } => {
      arguments
        .iter()
        .enumerate()
        .map(|(i, argument)| i as Word + temporaries(argument).max(1))
        .max()
        .unwrap_or(0)
    }

  }
}
