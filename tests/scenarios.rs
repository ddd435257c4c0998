//! Whole programs taken from source text to a halted machine.

use std::collections::VecDeque;

use lispcpu::bytecode::Word;
use lispcpu::compiler::SYMBOL_BASE;
use lispcpu::config::MachineConfig;
use lispcpu::cpu::{run, Cpu, Status};
use lispcpu::device::{HeadlessDevice, Input, Mouse, Output, Pixel};
use lispcpu::error::{CompileError, Error, RuntimeError};
use lispcpu::{build, compiler::Name};

fn evaluate(source: &str) -> Word {
  let words = build(source).unwrap();
  let cpu   = run(&words).unwrap();
  assert_eq!(cpu.status(), Status::Halted);
  cpu.return_value().unwrap()
}

fn machine_with_input(source: &str, input: &[Word]) -> Cpu<HeadlessDevice> {
  let config = MachineConfig::default();
  let device = HeadlessDevice::new(config.screen_width, config.screen_height)
    .with_input(Input::Queue(input.iter().copied().collect::<VecDeque<Word>>()));
  let mut cpu = Cpu::new(device, &config);
  cpu.load(&build(source).unwrap()).unwrap();
  cpu.run().unwrap();
  cpu
}

#[test]
fn factorial() {
  let source = "
    (FUNC factorial (n)
      (IF (< n 2)
        (1)
        ((* n (factorial (- n 1))))))
    (FUNC main () (factorial 5))
  ";
  assert_eq!(evaluate(source), 120);
}

#[test]
fn fibonacci() {
  let source = "
    (FUNC main () (fib 10))
    (FUNC fib (n)
      (IF (< n 2)
        (1)
        ((+ (fib (- n 1)) (fib (- n 2))))))
  ";
  assert_eq!(evaluate(source), 89);
}

#[test]
fn loops_over_a_global_counter() {
  let source = "
    (INIT counter 0)
    (FUNC main ()
      (WHILE (< counter 10)
        (SET counter (+ counter 1)))
      counter)
  ";
  assert_eq!(evaluate(source), 10);
}

#[test]
fn sums_with_locals() {
  let source = "
    (FUNC main ()
      (VAR i 0)
      (VAR sum 0)
      (WHILE (<= i 10)
        (SET sum (+ sum i))
        (SET i (+ i 1)))
      sum)
  ";
  assert_eq!(evaluate(source), 55);
}

#[test]
fn passes_several_arguments() {
  let source = "
    (FUNC combine (a b c) (+ (* a 100) (+ (* b 10) c)))
    (FUNC main () (combine 1 (combine 0 0 2) 3))
  ";
  assert_eq!(evaluate(source), 123);
}

#[test]
fn unary_operators() {
  assert_eq!(evaluate("(FUNC main () (! 0))"), 1);
  assert_eq!(evaluate("(FUNC main () (~ 0))"), -1);
}

#[test]
fn symbols_are_distinct_constants() {
  let source = "
    (FUNC main ()
      (VAR colour @red)
      (IF (== colour @blue) (0) (colour)))
  ";
  assert_eq!(evaluate(source), SYMBOL_BASE);
}

#[test]
fn indirect_access_reaches_device_words() {
  let source = "
    (INIT scratch 0x7fff00)
    (FUNC main ()
      (SET *scratch 99)
      (VAR x 1)
      (+ *scratch x))
  ";
  assert_eq!(evaluate(source), 100);
}

#[test]
fn writes_to_the_console() {
  let source = "
    (INIT console 0x7ffffe)
    (FUNC main ()
      (SET *console 42)
      (SET *console (+ 1 2))
      0)
  ";
  let words = build(source).unwrap();
  let cpu   = run(&words).unwrap();
  assert_eq!(cpu.device().output(), &[Output::Console(42), Output::Console(3)]);
}

#[test]
fn reads_queued_input() {
  let source = "
    (INIT io 0x7fffff)
    (FUNC main ()
      (VAR first *io)
      (VAR second *io)
      (- first second))
  ";
  let cpu = machine_with_input(source, &[50, 8]);
  assert_eq!(cpu.return_value(), Some(42));
}

#[test]
fn paints_the_frame_buffer() {
  let source = "
    (INIT pixel 5)
    (FUNC main () (SET *pixel 0xff8000))
  ";
  let words = build(source).unwrap();
  let cpu   = run(&words).unwrap();
  assert_eq!(cpu.device().pixel(5, 0), Some(Pixel { r: 0xff, g: 0x80, b: 0 }));
  assert_eq!(cpu.device().pixel(6, 0), Some(Pixel::default()));
}

#[test]
fn reads_mouse_events() {
  let source = "
    (INIT flag 0x7ffff0)
    (INIT mouse-x 0x7ffff2)
    (INIT mouse-y 0x7ffff3)
    (FUNC main ()
      (VAR seen *flag)
      (VAR again *flag)
      (+ (* (+ (* seen 10) again) 10000) (+ (* *mouse-x 100) *mouse-y)))
  ";
  let config = MachineConfig::default();
  let device = HeadlessDevice::new(config.screen_width, config.screen_height);
  let mut cpu = Cpu::new(device, &config);
  cpu.load(&build(source).unwrap()).unwrap();
  cpu.device_mut().mouse_event(Mouse { down: true, x: 12, y: 34 });
  cpu.run().unwrap();
  assert_eq!(cpu.return_value(), Some(101_234));
}

#[test]
fn undeclared_names_fail_before_assembly() {
  assert_eq!(
    build("(FUNC main () (+ missing 1))"),
    Err(Error::Compile(CompileError::Undeclared(Name::from("missing"))))
  );
}

#[test]
fn division_by_zero_yields_zero() {
  assert_eq!(evaluate("(FUNC main () (+ 5 (+ (/ 7 0) (% 7 0))))"), 5);
}

#[test]
fn local_pointers_reach_through_the_frame() {
  let source = "
    (FUNC bump (p) (SET *p (+ *p 1)))
    (FUNC main ()
      (VAR cell 0x7fff00)
      (SET *cell 10)
      (bump cell)
      (bump cell)
      *cell)
  ";
  assert_eq!(evaluate(source), 12);
}

#[test]
fn unbounded_recursion_overflows_the_stack() {
  let source = "
    (FUNC forever (n) (forever (+ n 1)))
    (FUNC main () (forever 0))
  ";
  let config = MachineConfig { stack_words: 256, ..MachineConfig::default() };
  let device = HeadlessDevice::new(config.screen_width, config.screen_height);
  let mut cpu = Cpu::new(device, &config);
  cpu.load(&build(source).unwrap()).unwrap();
  assert!(matches!(cpu.run(), Err(RuntimeError::StackOverflow { .. })));
}

#[test]
fn runs_cooperatively_in_slices() {
  let source = "
    (FUNC main ()
      (VAR i 0)
      (WHILE (< i 100) (SET i (+ i 1)))
      i)
  ";
  let config = MachineConfig { slice_steps: 16, ..MachineConfig::default() };
  let device = HeadlessDevice::new(config.screen_width, config.screen_height);
  let mut cpu = Cpu::new(device, &config);
  cpu.load(&build(source).unwrap()).unwrap();

  let mut slices = 0;
  while cpu.run_slice(config.slice_steps).unwrap() == Status::Running {
    slices += 1;
    assert!(cpu.steps() <= slices * 16);
  }
  assert!(slices > 1);
  assert_eq!(cpu.return_value(), Some(100));
}
