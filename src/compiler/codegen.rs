/*!
  Turns parsed items into a symbolic program.

  The program is laid out as
  ```text
  CALL main
  JMP -1          ; PC falls below the code base: halt
  <code>          ; each function: .word size, tag, body, SLD -2, RET
  <data>          ; globals, then literals and symbols as they are first used
  ```
  Every expression leaves its value in L. An expression compiled at temporary offset `t` may
  use frame slots `t` and above as scratch space, so the slots below `t` survive it.
*/

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::ast::{Expression, Function, Item, Signature};
use super::frame::Frame;
use super::symbols::SymbolPool;
use super::Name;
use crate::bytecode::{
  Assembly, BinaryOperator, Instruction, Opcode, SymbolicProgram, Tag, Target, UnaryOperator, Word
};
use crate::error::CompileError;

pub const ENTRY_POINT: &str = "main";

/// The compilation context, which lives for one program.
pub struct Compiler {
  /// Numbers the tags of conditionals and loops.
  tag_id   : usize,
  globals  : HashSet<Name>,
  functions: HashMap<Name, Signature>,
  /// Literal and symbol tags already emitted to the data section.
  constants: HashSet<Tag>,
  symbols  : SymbolPool,
  code     : Vec<Assembly>,
  data     : Vec<Assembly>,
}

impl Default for Compiler {
  fn default() -> Self {
    Compiler::new()
  }
}

impl Compiler {

  pub fn new() -> Compiler {
    Compiler {
      tag_id   : 0,
      globals  : HashSet::new(),
      functions: HashMap::new(),
      constants: HashSet::new(),
      symbols  : SymbolPool::new(),
      code     : Vec::new(),
      data     : Vec::new(),
    }
  }

  pub fn symbols(&self) -> &SymbolPool {
    &self.symbols
  }

  /// Compiles a whole program. Nothing is produced if any item fails.
  pub fn compile_program(&mut self, items: &[Item]) -> Result<SymbolicProgram, CompileError> {
    self.declare_items(items)?;

    match self.functions.get(&Name::from(ENTRY_POINT)) {
      None                                 => return Err(CompileError::UndeclaredFunction(Name::from(ENTRY_POINT))),
      Some(signature) if signature.arity > 0 => return Err(CompileError::MainArity(signature.arity)),
      Some(_)                              => {}
    }

    for item in items {
      if let Item::Function(function) = item {
        self.compile_function(function)?;
      }
    }

    let mut records = vec![
      Assembly::Instruction(addressed(Opcode::Call, Tag::from(ENTRY_POINT))),
      Assembly::Instruction(Instruction::Addressed { opcode: Opcode::Jump, target: Target::Offset(-1) }),
    ];
    records.append(&mut self.code);
    records.append(&mut self.data);

    debug!(
      functions = self.functions.len(),
      globals = self.globals.len(),
      symbols = self.symbols.len(),
      records = records.len(),
      "compiled program"
    );
    Ok(SymbolicProgram::new(records))
  }

  /// Registers every global and function before any body is compiled, so that functions may
  /// call functions defined after them.
  fn declare_items(&mut self, items: &[Item]) -> Result<(), CompileError> {
    for item in items {
      match item {

        Item::Declaration { name, value } => {
          if self.is_declared(name) {
            return Err(CompileError::Redeclared(name.clone()));
          }
          let value = match value {
            Expression::Literal(value) => *value,
            _                          => return Err(CompileError::NonConstantGlobal(name.clone()))
          };
          self.globals.insert(name.clone());
          self.data.push(Assembly::Tag(name.clone()));
          self.data.push(Assembly::Value(value));
        }

        Item::Function(function) => {
          if self.is_declared(&function.name) {
            return Err(CompileError::Redeclared(function.name.clone()));
          }
          self.functions.insert(function.name.clone(), function.signature());
        }

      }
    }
    Ok(())
  }

  fn is_declared(&self, name: &Name) -> bool {
    self.globals.contains(name) || self.functions.contains_key(name)
  }

  fn compile_function(&mut self, function: &Function) -> Result<(), CompileError> {
    let frame = Frame::allocate(function)?;
    debug!(function = %function.signature(), frame = frame.size(), "compiling");

    self.code.push(Assembly::Value(frame.size()));
    self.code.push(Assembly::Tag(function.name.clone()));
    for expression in &function.body {
      self.compile_expression(expression, &frame, frame.temp_start())?;
    }
    self.emit(frame_instruction(Opcode::StoreLeftFrame, -2));
    self.emit(Instruction::Nullary(Opcode::Return));
    Ok(())
  }

  fn compile_block(&mut self, block: &[Expression], frame: &Frame, offset: Word)
    -> Result<(), CompileError>
  {
    for expression in block {
      self.compile_expression(expression, frame, offset)?;
    }
    Ok(())
  }

  fn compile_expression(&mut self, expression: &Expression, frame: &Frame, offset: Word)
    -> Result<(), CompileError>
  {
    match expression {

      Expression::Literal(value) => {
        let tag = self.constant(format!("lit.{}", value), *value);
        self.emit(addressed(Opcode::LoadLeftStatic, tag));
      }

      Expression::Symbol(name) => {
        let (id, _) = self.symbols.intern(name);
        let tag = self.constant(format!("sym.{}", name), id);
        self.emit(addressed(Opcode::LoadLeftStatic, tag));
      }

      Expression::Reference { name, indirect } => {
        let load = self.access(name, *indirect, frame, Access::Load)?;
        self.emit(load);
      }

      Expression::Declaration { name, value } => {
        self.compile_expression(value, frame, offset)?;
        let store = self.access(name, false, frame, Access::Store)?;
        self.emit(store);
      }

      Expression::Assignment { name, indirect, value } => {
        self.compile_expression(value, frame, offset)?;
        let store = self.access(name, *indirect, frame, Access::Store)?;
        self.emit(store);
      }

      Expression::Conditional { condition, then_branch, else_branch } => {
        let id       = self.next_tag_id();
        let then_tag = Tag::from(format!("if.then.{}", id));
        let end_tag  = Tag::from(format!("if.end.{}", id));

        self.compile_expression(condition, frame, offset)?;
        self.emit(addressed(Opcode::BranchLeft, then_tag.clone()));
        self.compile_block(else_branch, frame, offset)?;
        self.emit(addressed(Opcode::Jump, end_tag.clone()));
        self.code.push(Assembly::Tag(then_tag));
        self.compile_block(then_branch, frame, offset)?;
        self.code.push(Assembly::Tag(end_tag));
      }

      Expression::Loop { condition, body } => {
        let id       = self.next_tag_id();
        let top_tag  = Tag::from(format!("loop.top.{}", id));
        let body_tag = Tag::from(format!("loop.body.{}", id));
        let end_tag  = Tag::from(format!("loop.end.{}", id));

        self.code.push(Assembly::Tag(top_tag.clone()));
        self.compile_expression(condition, frame, offset)?;
        self.emit(addressed(Opcode::BranchLeft, body_tag.clone()));
        self.emit(addressed(Opcode::Jump, end_tag.clone()));
        self.code.push(Assembly::Tag(body_tag));
        self.compile_block(body, frame, offset)?;
        self.emit(addressed(Opcode::Jump, top_tag));
        self.code.push(Assembly::Tag(end_tag));
      }

      Expression::Unary { operator, operand } => {
        self.compile_expression(operand, frame, offset)?;
        self.emit(unary(*operator));
      }

      Expression::Binary { operator, left, right } => {
        self.compile_expression(left, frame, offset)?;
        self.emit(frame_instruction(Opcode::StoreLeftFrame, offset));
        self.compile_expression(right, frame, offset + 1)?;
        self.emit(Instruction::Nullary(Opcode::Swap));
        self.emit(frame_instruction(Opcode::LoadLeftFrame, offset));
        self.emit(binary(*operator));
      }

      Expression::Application { function, arguments } => {
        let signature = self.functions
                            .get(function)
                            .ok_or_else(|| CompileError::UndeclaredFunction(function.clone()))?;
        if signature.arity != arguments.len() {
          return Err(CompileError::CallArity {
            function: function.clone(),
            expected: signature.arity,
            given   : arguments.len()
          });
        }

        // Staging slots lie above SPR and any call clobbers them, so they are filled only once
        // every argument has been evaluated.
        for (i, argument) in arguments.iter().enumerate() {
          let slot = offset + i as Word;
          self.compile_expression(argument, frame, slot)?;
          self.emit(frame_instruction(Opcode::StoreLeftFrame, slot));
        }
        for i in 0..arguments.len() {
          self.emit(frame_instruction(Opcode::LoadLeftFrame, offset + i as Word));
          self.emit(frame_instruction(Opcode::StoreLeftFrame, frame.argument_slot(i)));
        }
        self.emit(addressed(Opcode::Call, function.clone()));
        self.emit(frame_instruction(Opcode::LoadLeftFrame, frame.return_slot()));
      }

    }
    Ok(())
  }

  /// The load or store for a variable: a local if the frame has a slot for it, otherwise a
  /// global.
  fn access(&self, name: &Name, indirect: bool, frame: &Frame, access: Access)
    -> Result<Instruction, CompileError>
  {
    if let Some(slot) = frame.slot(name) {
      let opcode = match (access, indirect) {
        (Access::Load,  false) => Opcode::LoadLeftFrame,
        (Access::Load,  true)  => Opcode::LoadLeftFrameIndirect,
        (Access::Store, false) => Opcode::StoreLeftFrame,
        (Access::Store, true)  => Opcode::StoreLeftFrameIndirect,
      };
      return Ok(frame_instruction(opcode, slot));
    }

    if self.globals.contains(name) {
      let opcode = match (access, indirect) {
        (Access::Load,  false) => Opcode::LoadLeftStatic,
        (Access::Load,  true)  => Opcode::LoadLeftStaticIndirect,
        (Access::Store, false) => Opcode::StoreLeftStatic,
        (Access::Store, true)  => Opcode::StoreLeftStaticIndirect,
      };
      return Ok(addressed(opcode, name.clone()));
    }

    Err(CompileError::Undeclared(name.clone()))
  }

  /// Adds a tagged constant to the data section the first time it is used.
  fn constant(&mut self, tag: String, value: Word) -> Tag {
    let tag = Tag::from(tag);
    if self.constants.insert(tag.clone()) {
      self.data.push(Assembly::Tag(tag.clone()));
      self.data.push(Assembly::Value(value));
    }
    tag
  }

  fn next_tag_id(&mut self) -> usize {
    self.tag_id += 1;
    self.tag_id - 1
  }

  fn emit(&mut self, instruction: Instruction) {
    self.code.push(Assembly::Instruction(instruction));
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Access {
  Load,
  Store
}

// region Instruction constructors

fn addressed(opcode: Opcode, tag: Tag) -> Instruction {
  Instruction::Addressed { opcode, target: Target::Tag(tag) }
}

fn frame_instruction(opcode: Opcode, offset: Word) -> Instruction {
  Instruction::Frame { opcode, offset }
}

fn unary(operator: UnaryOperator) -> Instruction {
  Instruction::Unary { opcode: Opcode::UnaryLeft, operator }
}

fn binary(operator: BinaryOperator) -> Instruction {
  Instruction::Binary { opcode: Opcode::BinaryLeft, operator }
}

// endregion
