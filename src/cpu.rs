//! The execution engine: a fetch-decode-execute loop over two working registers, a frame
//! base and a stack top.

use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};
#[cfg(feature = "trace_computation")]
use tracing::trace;
use tracing::{debug, info};

use crate::address::{Address, CODE_BASE, ENTRY_FRAME_SIZE, RETURN_SLOT, STACK_BASE};
#[cfg(feature = "trace_computation")]
use crate::bytecode::decode_instruction;
use crate::bytecode::{BinaryOperator, Fields, Opcode, UnaryOperator, Word};
use crate::config::MachineConfig;
use crate::device::{Device, HeadlessDevice};
use crate::error::RuntimeError;
use crate::memory::Memory;

/// A copy of the register file.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Registers {
  pub pc : Address,
  pub l  : Word,
  pub r  : Word,
  /// Base of the current frame.
  pub spl: Address,
  /// One past the highest stack word in use.
  pub spr: Address,
}

impl Default for Registers {
  fn default() -> Self {
    Registers {
      pc : CODE_BASE,
      l  : 0,
      r  : 0,
      spl: STACK_BASE,
      spr: STACK_BASE + ENTRY_FRAME_SIZE,
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
  Running,
  /// PC has fallen below the code base.
  Halted
}

pub struct Cpu<D: Device> {
  memory     : Memory<D>,
  registers  : Registers,
  /// Instructions executed since the last load.
  steps      : u64,
  slice_steps: usize,
}

impl<D: Device> Cpu<D> {

  pub fn new(device: D, config: &MachineConfig) -> Cpu<D> {
    Cpu {
      memory     : Memory::new(device, config.stack_words),
      registers  : Registers::default(),
      steps      : 0,
      slice_steps: config.slice_steps.max(1),
    }
  }

  // region Accessors

  pub fn registers(&self) -> Registers {
    self.registers
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn memory(&self) -> &Memory<D> {
    &self.memory
  }

  pub fn device(&self) -> &D {
    self.memory.device()
  }

  pub fn device_mut(&mut self) -> &mut D {
    self.memory.device_mut()
  }

  pub fn status(&self) -> Status {
    match self.registers.pc < CODE_BASE {
      true  => Status::Halted,
      false => Status::Running
    }
  }

  /// The value `main` left in its return slot, once the program has halted.
  pub fn return_value(&self) -> Option<Word> {
    match self.status() {
      Status::Halted  => self.memory.peek(RETURN_SLOT),
      Status::Running => None
    }
  }

  // endregion

  /// Loads a program at the code base and resets the registers.
  pub fn load(&mut self, words: &[Word]) -> Result<(), RuntimeError> {
    self.memory.load(words)?;
    self.registers = Registers::default();
    self.steps = 0;
    Ok(())
  }

  /// Runs until the program halts.
  pub fn run(&mut self) -> Result<(), RuntimeError> {
    while self.run_slice(self.slice_steps)? == Status::Running {}
    info!(steps = self.steps, return_value = ?self.return_value(), "halted");
    Ok(())
  }

  /// Executes at most `budget` whole instructions, returning early if the program halts.
  pub fn run_slice(&mut self, budget: usize) -> Result<Status, RuntimeError> {
    for _ in 0..budget {
      if self.step()? == Status::Halted {
        return Ok(Status::Halted);
      }
    }
    Ok(self.status())
  }

  /// Executes one instruction. Does nothing once the program has halted.
  pub fn step(&mut self) -> Result<Status, RuntimeError> {
    if self.status() == Status::Halted {
      return Ok(Status::Halted);
    }

    let address = self.registers.pc;
    let word    = self.memory.read(address)?;
    let fields  = Fields::of(word);
    let unsupported = || RuntimeError::UnsupportedInstruction { address, word };
    let opcode  = Opcode::try_from(fields.opcode).map_err(|_| unsupported())?;

    #[cfg(feature = "trace_computation")]
    {
      let instruction = decode_instruction(word).map(|i| i.to_string()).unwrap_or_default();
      trace!(
        pc  = address,
        l   = self.registers.l,
        r   = self.registers.r,
        spl = self.registers.spl,
        spr = self.registers.spr,
        "{}", instruction
      );
    }

    self.registers.pc += 1;
    self.steps += 1;

    let offset = fields.offset;
    match opcode {

      Opcode::Nop => {}

      // region Loads and stores

      Opcode::LoadLeftStatic => {
        self.registers.l = self.memory.read(CODE_BASE + offset)?;
      }
      Opcode::LoadRightStatic => {
        self.registers.r = self.memory.read(CODE_BASE + offset)?;
      }
      Opcode::LoadLeftStaticIndirect => {
        let pointer = self.memory.read(CODE_BASE + offset)?;
        self.registers.l = self.memory.read(pointer)?;
      }
      Opcode::LoadRightStaticIndirect => {
        let pointer = self.memory.read(CODE_BASE + offset)?;
        self.registers.r = self.memory.read(pointer)?;
      }
      Opcode::LoadLeftFrame => {
        let slot = self.frame_slot(offset)?;
        self.registers.l = self.memory.read(slot)?;
      }
      Opcode::LoadRightFrame => {
        let slot = self.frame_slot(offset)?;
        self.registers.r = self.memory.read(slot)?;
      }
      Opcode::LoadLeftFrameIndirect => {
        let slot = self.frame_slot(offset)?;
        let pointer = self.memory.read(slot)?;
        self.registers.l = self.memory.read(pointer)?;
      }
      Opcode::LoadRightFrameIndirect => {
        let slot = self.frame_slot(offset)?;
        let pointer = self.memory.read(slot)?;
        self.registers.r = self.memory.read(pointer)?;
      }

      Opcode::StoreLeftStatic => {
        self.memory.write(CODE_BASE + offset, self.registers.l)?;
      }
      Opcode::StoreRightStatic => {
        self.memory.write(CODE_BASE + offset, self.registers.r)?;
      }
      Opcode::StoreLeftStaticIndirect => {
        let pointer = self.memory.read(CODE_BASE + offset)?;
        self.memory.write(pointer, self.registers.l)?;
      }
      Opcode::StoreRightStaticIndirect => {
        let pointer = self.memory.read(CODE_BASE + offset)?;
        self.memory.write(pointer, self.registers.r)?;
      }
      Opcode::StoreLeftFrame => {
        let slot = self.frame_slot(offset)?;
        self.memory.write(slot, self.registers.l)?;
      }
      Opcode::StoreRightFrame => {
        let slot = self.frame_slot(offset)?;
        self.memory.write(slot, self.registers.r)?;
      }
      Opcode::StoreLeftFrameIndirect => {
        let slot = self.frame_slot(offset)?;
        let pointer = self.memory.read(slot)?;
        self.memory.write(pointer, self.registers.l)?;
      }
      Opcode::StoreRightFrameIndirect => {
        let slot = self.frame_slot(offset)?;
        let pointer = self.memory.read(slot)?;
        self.memory.write(pointer, self.registers.r)?;
      }

      // endregion

      // region Register operations

      Opcode::UnaryLeft => {
        let operator = UnaryOperator::try_from(fields.operator).map_err(|_| unsupported())?;
        self.registers.l = operator.apply(self.registers.l);
      }
      Opcode::UnaryRight => {
        let operator = UnaryOperator::try_from(fields.operator).map_err(|_| unsupported())?;
        self.registers.r = operator.apply(self.registers.r);
      }
      Opcode::BinaryLeft => {
        let operator = BinaryOperator::try_from(fields.operator).map_err(|_| unsupported())?;
        self.registers.l = operator.apply(self.registers.l, self.registers.r);
      }
      Opcode::BinaryRight => {
        let operator = BinaryOperator::try_from(fields.operator).map_err(|_| unsupported())?;
        self.registers.r = operator.apply(self.registers.l, self.registers.r);
      }
      Opcode::Swap => {
        std::mem::swap(&mut self.registers.l, &mut self.registers.r);
      }

      // endregion

      // region Control flow

      Opcode::BranchLeft => {
        if self.registers.l != 0 {
          self.registers.pc = CODE_BASE + offset;
        }
      }
      Opcode::BranchRight => {
        if self.registers.r != 0 {
          self.registers.pc = CODE_BASE + offset;
        }
      }
      Opcode::Jump => {
        self.registers.pc = CODE_BASE + offset;
      }
      Opcode::Call => self.call(CODE_BASE + offset)?,
      Opcode::Return => {
        let Registers { spl, .. } = self.registers;
        self.registers.spr = spl;
        self.registers.spl = self.memory.read(spl)?;
        self.registers.pc  = self.memory.read(spl - 1)?;
      }

      // endregion

    }

    Ok(self.status())
  }

  /// Links a new frame at SPR and jumps to `entry`. The callee's frame size is the data word
  /// immediately before its entry point.
  fn call(&mut self, entry: Address) -> Result<(), RuntimeError> {
    let size_address = entry - 1;
    let size = self.memory.read(size_address)?;
    if size < 0 {
      return Err(RuntimeError::InvalidFrameSize { address: size_address, size });
    }

    let Registers { pc, spl, spr, .. } = self.registers;
    let new_spr = spr as i64 + size as i64;
    if spr >= self.memory.end() || new_spr > self.memory.end() as i64 {
      return Err(RuntimeError::StackOverflow { spr: new_spr });
    }

    self.memory.write(spr - 1, pc)?;
    self.memory.write(spr, spl)?;
    self.registers.spl = spr;
    self.registers.spr = new_spr as Address;
    self.registers.pc  = entry;
    debug!(entry, frame = size, "call");
    Ok(())
  }

  fn frame_slot(&self, offset: Word) -> Result<Address, RuntimeError> {
    let spl = self.registers.spl;
    spl.checked_add(offset).ok_or(RuntimeError::OutOfBounds { address: spl.wrapping_add(offset) })
  }

  // region Display methods

  fn make_register_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    let Registers { pc, l, r, spl, spr } = self.registers;
    table.add_row(row![r->"PC =",  format!("{:#010x}", pc)]);
    table.add_row(row![r->"L =",   l]);
    table.add_row(row![r->"R =",   r]);
    table.add_row(row![r->"SPL =", format!("{:#010x}", spl)]);
    table.add_row(row![r->"SPR =", format!("{:#010x}", spr)]);
    table.add_row(row![r->"steps =", self.steps]);
    table
  }

  /// The current frame, with the frame base highlighted.
  fn make_frame_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    let Registers { spl, spr, .. } = self.registers;
    for address in spl..spr {
      let contents = self.memory.peek(address).map(|word| word.to_string()).unwrap_or_default();
      match address == spl {

        true  => {
          table.add_row(
            row![r->format!("* --> S[{}] =", address - spl), contents]
          );
        }

        false => {
          table.add_row(
            row![r->format!("S[{}] =", address - spl), contents]
          );
        }

      } // end match on highlight
    } // end for
    table
  }

  // endregion
}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl<D: Device> Display for Cpu<D> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let register_table = self.make_register_table();
    let frame_table    = self.make_frame_table();

    let mut combined_table = table!([register_table, frame_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Frame"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let status = match self.status() {
      Status::Halted  => "Halted.",
      Status::Running => "Running."
    };

    write!(f, "{}\n{}", status, combined_table)
  }
}

/// Loads `words` into a fresh machine with a headless device and the default configuration,
/// then runs it to completion.
pub fn run(words: &[Word]) -> Result<Cpu<HeadlessDevice>, RuntimeError> {
  let config = MachineConfig::default();
  let device = HeadlessDevice::new(config.screen_width, config.screen_height);
  let mut cpu = Cpu::new(device, &config);
  cpu.load(words)?;
  cpu.run()?;
  Ok(cpu)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{encode_instruction, Instruction, Target};

  fn addressed(opcode: Opcode, offset: Word) -> Word {
    encode_instruction(&Instruction::Addressed { opcode, target: Target::Offset(offset) }).unwrap()
  }

  fn frame(opcode: Opcode, offset: Word) -> Word {
    encode_instruction(&Instruction::Frame { opcode, offset }).unwrap()
  }

  fn binary(opcode: Opcode, operator: BinaryOperator) -> Word {
    encode_instruction(&Instruction::Binary { opcode, operator }).unwrap()
  }

  fn unary(opcode: Opcode, operator: UnaryOperator) -> Word {
    encode_instruction(&Instruction::Unary { opcode, operator }).unwrap()
  }

  fn nullary(opcode: Opcode) -> Word {
    encode_instruction(&Instruction::Nullary(opcode)).unwrap()
  }

  fn machine(words: &[Word]) -> Cpu<HeadlessDevice> {
    let config = MachineConfig { stack_words: 64, ..MachineConfig::default() };
    let mut cpu = Cpu::new(HeadlessDevice::new(4, 4), &config);
    cpu.load(words).unwrap();
    cpu
  }

  /// `main` stores 7 in its return slot; its frame has size 4 so the return slot is 2.
  fn seven() -> Vec<Word> {
    vec![
      addressed(Opcode::Call, 3),             // 0
      addressed(Opcode::Jump, -1),            // 1
      4,                                      // 2: frame size of main
      addressed(Opcode::LoadLeftStatic, 7),   // 3: main
      frame(Opcode::StoreLeftFrame, -2),      // 4
      nullary(Opcode::Return),                // 5
      0,                                      // 6
      7,                                      // 7: literal
    ]
  }

  #[test]
  fn halts_after_main_returns() {
    let mut cpu = machine(&seven());
    cpu.run().unwrap();
    assert_eq!(cpu.status(), Status::Halted);
    assert_eq!(cpu.return_value(), Some(7));
    assert_eq!(cpu.steps(), 5);
  }

  #[test]
  fn call_and_return_restore_the_frame() {
    let mut cpu = machine(&seven());
    let before = cpu.registers();

    cpu.step().unwrap();
    let inside = cpu.registers();
    assert_eq!(inside.pc, CODE_BASE + 3);
    assert_eq!(inside.spl, before.spr);
    assert_eq!(inside.spr, before.spr + 4);
    assert_eq!(cpu.memory().peek(before.spr - 1), Some(CODE_BASE + 1));
    assert_eq!(cpu.memory().peek(before.spr), Some(before.spl));

    cpu.run_slice(3).unwrap();
    let after = cpu.registers();
    assert_eq!(after.pc, CODE_BASE + 1);
    assert_eq!(after.spl, before.spl);
    assert_eq!(after.spr, before.spr);
  }

  #[test]
  fn slices_never_change_the_result() {
    let mut sliced = machine(&seven());
    while sliced.run_slice(1).unwrap() == Status::Running {}
    let whole = run(&seven()).unwrap();
    assert_eq!(sliced.registers(), whole.registers());
    assert_eq!(sliced.return_value(), whole.return_value());
  }

  #[test]
  fn arithmetic_wraps() {
    let words = vec![
      addressed(Opcode::LoadLeftStatic, 5),
      addressed(Opcode::LoadRightStatic, 6),
      binary(Opcode::BinaryLeft, BinaryOperator::Add),
      addressed(Opcode::Jump, -1),
      0,
      i32::MAX,
      1,
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();
    assert_eq!(cpu.registers().l, i32::MIN);
    assert_eq!(cpu.registers().r, 1);
  }

  #[test]
  fn binary_right_writes_the_right_register() {
    let words = vec![
      addressed(Opcode::LoadLeftStatic, 4),
      addressed(Opcode::LoadRightStatic, 5),
      binary(Opcode::BinaryRight, BinaryOperator::Sub),
      addressed(Opcode::Jump, -1),
      10,
      3,
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();
    assert_eq!(cpu.registers().l, 10);
    assert_eq!(cpu.registers().r, 7);
  }

  #[test]
  fn indirect_access_goes_through_a_pointer() {
    let words = vec![
      addressed(Opcode::LoadLeftStatic, 6),           // L = 99
      addressed(Opcode::StoreLeftStaticIndirect, 7),  // mem[mem[base+7]] = 99
      addressed(Opcode::LoadRightStaticIndirect, 7),  // R = 99
      addressed(Opcode::Jump, -1),
      0,
      0,
      99,
      CODE_BASE + 8,
      0,
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();
    assert_eq!(cpu.memory().peek(CODE_BASE + 8), Some(99));
    assert_eq!(cpu.registers().r, 99);
  }

  #[test]
  fn branches_test_their_register() {
    let words = vec![
      addressed(Opcode::BranchLeft, 3),      // L = 0, falls through
      addressed(Opcode::LoadRightStatic, 6),
      addressed(Opcode::BranchRight, 4),
      addressed(Opcode::Jump, -1),
      addressed(Opcode::LoadLeftStatic, 6),
      addressed(Opcode::Jump, -1),
      1,
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();
    assert_eq!(cpu.registers().l, 1);
    assert_eq!(cpu.steps(), 5);
  }

  #[test]
  fn unknown_opcodes_are_fatal() {
    let mut cpu = machine(&[0x0500_0000]);
    assert_eq!(
      cpu.step(),
      Err(RuntimeError::UnsupportedInstruction { address: CODE_BASE, word: 0x0500_0000 })
    );

    let mut cpu = machine(&[0x3299_0000]);
    assert!(matches!(cpu.step(), Err(RuntimeError::UnsupportedInstruction { .. })));
  }

  #[test]
  fn division_by_zero_yields_zero() {
    let words = vec![
      addressed(Opcode::LoadLeftStatic, 4),
      binary(Opcode::BinaryRight, BinaryOperator::Mod), // R = 5 % 0
      binary(Opcode::BinaryLeft, BinaryOperator::Div),  // L = 5 / 0
      addressed(Opcode::Jump, -1),
      5,
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();
    assert_eq!(cpu.status(), Status::Halted);
    assert_eq!(cpu.registers().l, 0);
    assert_eq!(cpu.registers().r, 0);
  }

  #[test]
  fn right_register_and_frame_indirect_access() {
    let pointer = STACK_BASE + 10;
    let words = vec![
      addressed(Opcode::LoadLeftStatic, 16),           //  0: L = pointer
      frame(Opcode::StoreLeftFrame, 1),                //  1: S[1] = pointer
      addressed(Opcode::LoadRightStatic, 17),          //  2: R = 42
      frame(Opcode::StoreRightFrameIndirect, 1),       //  3: *pointer = 42
      unary(Opcode::UnaryRight, UnaryOperator::BitNot), //  4: R = -43
      frame(Opcode::StoreRightFrame, 2),               //  5: S[2] = -43
      addressed(Opcode::LoadRightStatic, 17),          //  6: R = 42
      frame(Opcode::LoadRightFrame, 2),                //  7: R = -43
      frame(Opcode::LoadLeftFrameIndirect, 1),         //  8: L = 42
      addressed(Opcode::StoreRightStatic, 20),         //  9
      addressed(Opcode::StoreLeftStatic, 19),          // 10
      addressed(Opcode::LoadLeftStatic, 18),           // 11: L = 7
      frame(Opcode::StoreLeftFrameIndirect, 1),        // 12: *pointer = 7
      frame(Opcode::LoadRightFrameIndirect, 1),        // 13: R = 7
      addressed(Opcode::StoreRightStaticIndirect, 22), // 14: word 21 = 7
      addressed(Opcode::Jump, -1),                     // 15
      pointer,                                         // 16
      42,                                              // 17
      7,                                               // 18
      0,                                               // 19
      0,                                               // 20
      0,                                               // 21
      CODE_BASE + 21,                                  // 22
    ];
    let mut cpu = machine(&words);
    cpu.run().unwrap();

    assert_eq!(cpu.steps(), 16);
    assert_eq!(cpu.memory().peek(STACK_BASE + 1), Some(pointer));
    assert_eq!(cpu.memory().peek(STACK_BASE + 2), Some(-43));
    assert_eq!(cpu.memory().peek(pointer), Some(7));
    assert_eq!(cpu.memory().peek(CODE_BASE + 19), Some(42));
    assert_eq!(cpu.memory().peek(CODE_BASE + 20), Some(-43));
    assert_eq!(cpu.memory().peek(CODE_BASE + 21), Some(7));
    assert_eq!(cpu.registers().l, 7);
    assert_eq!(cpu.registers().r, 7);
  }

  #[test]
  fn runaway_recursion_overflows_the_stack() {
    let words = vec![
      addressed(Opcode::Call, 2),
      8,
      addressed(Opcode::Call, 2),
    ];
    let mut cpu = machine(&words);
    assert!(matches!(cpu.run(), Err(RuntimeError::StackOverflow { .. })));
  }

  #[test]
  fn display_shows_registers_and_frame() {
    let mut cpu = machine(&seven());
    cpu.step().unwrap();
    let text = cpu.to_string();
    assert!(text.starts_with("Running."));
    assert!(text.contains("SPL ="));
    assert!(text.contains("* --> S[0] ="));
  }
}
