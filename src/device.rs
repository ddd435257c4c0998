/*!
  Memory-mapped devices. Every address below `CODE_BASE` belongs to the device, and the
  machine reaches it only through `Device::read` and `Device::write`. What a device does with
  an access is opaque to the machine.

  `HeadlessDevice` implements the standard device map without a window:
    ```text
    0x7fffee  read   display row size (width)
    0x7fffef  read   display column size (height)
    0x7ffff0  read   pending event flag, cleared by the read
    0x7ffff1  read   mouse button (1 = down)
    0x7ffff2  read   mouse x
    0x7ffff3  read   mouse y
    0x7ffffe  write  console message
    0x7fffff  read   one line of input as an integer (0 if not a number)
    0x7fffff  write  alert
    ```
  Writes below `width * height` paint a pixel, and the frame buffer reads back the pixel's
  24 bit colour. The high byte of the written word is not kept. Every other device address
  is a plain word.
*/

use std::collections::{HashMap, VecDeque};
use std::io::BufRead;

use tracing::{info, trace, warn};

use crate::address::Address;
use crate::bytecode::{parse_word, Word};

pub const ROW_SIZE_PORT   : Address = 0x7F_FFEE;
pub const COLUMN_SIZE_PORT: Address = 0x7F_FFEF;
pub const EVENT_FLAG_PORT : Address = 0x7F_FFF0;
pub const MOUSE_DOWN_PORT : Address = 0x7F_FFF1;
pub const MOUSE_X_PORT    : Address = 0x7F_FFF2;
pub const MOUSE_Y_PORT    : Address = 0x7F_FFF3;
pub const CONSOLE_PORT    : Address = 0x7F_FFFE;
pub const IO_PORT         : Address = 0x7F_FFFF;

/// The external collaborator behind every address below the code base.
pub trait Device {
  fn read(&mut self, address: Address) -> Word;
  fn write(&mut self, address: Address, value: Word);
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Pixel {
  pub r: u8,
  pub g: u8,
  pub b: u8
}

impl Pixel {
  pub fn from_word(word: Word) -> Pixel {
    Pixel {
      r: (word >> 16) as u8,
      g: (word >> 8) as u8,
      b: word as u8
    }
  }

  pub fn to_word(&self) -> Word {
    ((self.r as Word) << 16) | ((self.g as Word) << 8) | self.b as Word
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Mouse {
  pub down: bool,
  pub x   : Word,
  pub y   : Word
}

/// A value the program sent out through one of the output ports.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Output {
  Console(Word),
  Alert(Word)
}

/// Where reads of the input port come from.
#[derive(Debug)]
pub enum Input {
  /// Values handed out in order; an empty queue reads as 0.
  Queue(VecDeque<Word>),
  /// One line of standard input per read.
  Stdin
}

#[derive(Debug)]
pub struct HeadlessDevice {
  width       : usize,
  height      : usize,
  frame_buffer: Vec<Pixel>,
  mouse       : Mouse,
  event_flag  : bool,
  input       : Input,
  output      : Vec<Output>,
  /// Print output values to stdout as they are written.
  echo        : bool,
  /// Device addresses with no special meaning.
  words       : HashMap<Address, Word>,
}

impl HeadlessDevice {
  pub fn new(width: usize, height: usize) -> HeadlessDevice {
    HeadlessDevice {
      width,
      height,
      frame_buffer: vec![Pixel::default(); width * height],
      mouse       : Mouse::default(),
      event_flag  : false,
      input       : Input::Queue(VecDeque::new()),
      output      : vec![],
      echo        : false,
      words       : HashMap::new(),
    }
  }

  pub fn with_input(mut self, input: Input) -> HeadlessDevice {
    self.input = input;
    self
  }

  pub fn with_echo(mut self, echo: bool) -> HeadlessDevice {
    self.echo = echo;
    self
  }

  /// Everything written to the console and alert ports, in order.
  pub fn output(&self) -> &[Output] {
    &self.output
  }

  pub fn pixel(&self, x: usize, y: usize) -> Option<Pixel> {
    match x < self.width && y < self.height {
      true  => Some(self.frame_buffer[y * self.width + x]),
      false => None
    }
  }

  /// Records a mouse event as the window system would, raising the event flag.
  pub fn mouse_event(&mut self, mouse: Mouse) {
    self.mouse = mouse;
    self.event_flag = true;
  }

  fn frame_buffer_index(&self, address: Address) -> Option<usize> {
    let index = address as usize;
    match address >= 0 && index < self.frame_buffer.len() {
      true  => Some(index),
      false => None
    }
  }

  fn read_input(&mut self) -> Word {
    match &mut self.input {

      Input::Queue(queue) => queue.pop_front().unwrap_or(0),

      Input::Stdin => {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
          Ok(_)      => parse_word(line.trim()).unwrap_or(0),
          Err(error) => {
            warn!("could not read input: {}", error);
            0
          }
        }
      }

    }
  }

  fn emit(&mut self, output: Output) {
    match output {
      Output::Console(value) => {
        info!(target: "console", "[OUTPUT] {}", value);
        if self.echo {
          println!("{}", value);
        }
      }
      Output::Alert(value) => {
        if self.echo {
          println!("[ALERT] {}", value);
        }
      }
    }
    self.output.push(output);
  }
}

impl Device for HeadlessDevice {
  fn read(&mut self, address: Address) -> Word {
    match address {
      ROW_SIZE_PORT    => self.width as Word,
      COLUMN_SIZE_PORT => self.height as Word,
      EVENT_FLAG_PORT  => std::mem::replace(&mut self.event_flag, false) as Word,
      MOUSE_DOWN_PORT  => self.mouse.down as Word,
      MOUSE_X_PORT     => self.mouse.x,
      MOUSE_Y_PORT     => self.mouse.y,
      IO_PORT          => self.read_input(),
      _                => {
        match self.frame_buffer_index(address) {
          Some(index) => self.frame_buffer[index].to_word(),
          None        => self.words.get(&address).copied().unwrap_or(0)
        }
      }
    }
  }

  fn write(&mut self, address: Address, value: Word) {
    match address {
      CONSOLE_PORT => self.emit(Output::Console(value)),
      IO_PORT      => self.emit(Output::Alert(value)),
      _            => {
        match self.frame_buffer_index(address) {
          Some(index) => {
            let pixel = Pixel::from_word(value);
            trace!(x = index % self.width, y = index / self.width, ?pixel, "paint");
            self.frame_buffer[index] = pixel;
          }
          None => {
            self.words.insert(address, value);
          }
        }
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_flag_clears_on_read() {
    let mut device = HeadlessDevice::new(4, 4);
    assert_eq!(device.read(EVENT_FLAG_PORT), 0);
    device.mouse_event(Mouse { down: true, x: 2, y: 3 });
    assert_eq!(device.read(EVENT_FLAG_PORT), 1);
    assert_eq!(device.read(EVENT_FLAG_PORT), 0);
    assert_eq!(device.read(MOUSE_DOWN_PORT), 1);
    assert_eq!(device.read(MOUSE_X_PORT), 2);
    assert_eq!(device.read(MOUSE_Y_PORT), 3);
  }

  #[test]
  fn reports_display_dimensions() {
    let mut device = HeadlessDevice::new(320, 200);
    assert_eq!(device.read(ROW_SIZE_PORT), 320);
    assert_eq!(device.read(COLUMN_SIZE_PORT), 200);
  }

  #[test]
  fn frame_buffer_writes_paint_pixels() {
    let mut device = HeadlessDevice::new(4, 2);
    device.write(6, 0x00FF_8001);
    assert_eq!(device.pixel(2, 1), Some(Pixel { r: 0xFF, g: 0x80, b: 0x01 }));
    assert_eq!(device.read(6), 0x00FF_8001);

    device.write(1, 0x7F00_00FF);
    assert_eq!(device.read(1), 0x0000_00FF);
    assert_eq!(device.pixel(4, 0), None);
  }

  #[test]
  fn output_ports_are_recorded() {
    let mut device = HeadlessDevice::new(1, 1);
    device.write(CONSOLE_PORT, 7);
    device.write(IO_PORT, -3);
    assert_eq!(device.output(), &[Output::Console(7), Output::Alert(-3)]);
  }

  #[test]
  fn input_port_drains_the_queue() {
    let queue = VecDeque::from(vec![5, 6]);
    let mut device = HeadlessDevice::new(1, 1).with_input(Input::Queue(queue));
    assert_eq!(device.read(IO_PORT), 5);
    assert_eq!(device.read(IO_PORT), 6);
    assert_eq!(device.read(IO_PORT), 0);
  }

  #[test]
  fn other_addresses_are_plain_words() {
    let mut device = HeadlessDevice::new(1, 1);
    device.write(0x1000, 99);
    assert_eq!(device.read(0x1000), 99);
    assert_eq!(device.read(0x1001), 0);
  }
}
