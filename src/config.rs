//! Tunable parameters of the machine and its host loop.

/// Default number of stack words above `STACK_BASE`.
pub const DEFAULT_STACK_WORDS: usize = 0x1_0000;
/// Default number of instructions executed per host time slice.
pub const DEFAULT_SLICE_STEPS: usize = 4096;
pub const DEFAULT_SCREEN_WIDTH: usize = 320;
pub const DEFAULT_SCREEN_HEIGHT: usize = 200;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct MachineConfig {
  /// Words of stack space. Recursion deeper than this is a stack overflow.
  pub stack_words  : usize,
  /// Instructions per slice when the host runs the machine cooperatively.
  pub slice_steps  : usize,
  /// Size of the device frame buffer in pixels. The frame buffer occupies the lowest
  /// `screen_width * screen_height` addresses.
  pub screen_width : usize,
  pub screen_height: usize,
}

impl Default for MachineConfig {
  fn default() -> Self {
    MachineConfig {
      stack_words  : DEFAULT_STACK_WORDS,
      slice_steps  : DEFAULT_SLICE_STEPS,
      screen_width : DEFAULT_SCREEN_WIDTH,
      screen_height: DEFAULT_SCREEN_HEIGHT,
    }
  }
}
