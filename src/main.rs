use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::filter::EnvFilter;

use lispcpu::assembler::{assemble, optimize};
use lispcpu::bytecode::{decode_instruction, from_bytes, parse_assembly, to_bytes, SymbolicProgram, Word};
use lispcpu::compiler::{parse, Compiler, SymbolPool, SYMBOL_BASE};
use lispcpu::config::MachineConfig;
use lispcpu::cpu::Cpu;
use lispcpu::device::{HeadlessDevice, Input};

#[derive(Parser)]
#[command(name = "lispcpu", version, about = "Compile, assemble and run programs for the Lisp CPU")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile, assemble and run a source file.
  Run {
    source: PathBuf,
    #[command(flatten)]
    machine: MachineArgs,
  },
  /// Print the assembly listing of a source file.
  Compile {
    source: PathBuf,
    /// Keep store-reload pairs.
    #[arg(long)]
    no_optimize: bool,
  },
  /// Assemble a listing into a big-endian binary.
  Assemble {
    listing: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
  },
  /// Run an assembled binary.
  Exec {
    binary: PathBuf,
    #[command(flatten)]
    machine: MachineArgs,
  },
  /// Print each word of a binary with the instruction it encodes.
  Disassemble {
    binary: PathBuf,
  },
}

#[derive(Args)]
struct MachineArgs {
  /// Values for the input port, in order. Without this, input is read from stdin.
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  input: Option<Vec<Word>>,
  /// Print the machine state after the program halts.
  #[arg(long)]
  dump: bool,
  /// Instructions per scheduling slice.
  #[arg(long)]
  slice: Option<usize>,
  /// Words of stack space.
  #[arg(long)]
  stack_words: Option<usize>,
}

impl MachineArgs {
  fn config(&self) -> MachineConfig {
    let defaults = MachineConfig::default();
    MachineConfig {
      stack_words: self.stack_words.unwrap_or(defaults.stack_words),
      slice_steps: self.slice.unwrap_or(defaults.slice_steps),
      ..defaults
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
      .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run { source, machine }          => run_source(&source, &machine)?,
    Commands::Compile { source, no_optimize }  => print_listing(&source, no_optimize)?,
    Commands::Assemble { listing, output }     => assemble_listing(&listing, &output)?,
    Commands::Exec { binary, machine }         => run_binary(&binary, &machine)?,
    Commands::Disassemble { binary }           => disassemble(&binary)?,
  }

  Ok(())
}

fn read_source(path: &Path) -> Result<String> {
  std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))
}

fn read_binary(path: &Path) -> Result<Vec<Word>> {
  let bytes = std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
  Ok(from_bytes(&bytes)?)
}

fn run_source(path: &Path, machine: &MachineArgs) -> Result<()> {
  let source = read_source(path)?;
  let words  = lispcpu::build(&source)?;
  execute(&words, machine)
}

fn run_binary(path: &Path, machine: &MachineArgs) -> Result<()> {
  let words = read_binary(path)?;
  execute(&words, machine)
}

fn execute(words: &[Word], machine: &MachineArgs) -> Result<()> {
  let config = machine.config();
  let input  = match &machine.input {
    Some(values) => Input::Queue(values.iter().copied().collect::<VecDeque<Word>>()),
    None         => Input::Stdin
  };
  let device = HeadlessDevice::new(config.screen_width, config.screen_height)
    .with_input(input)
    .with_echo(true);

  let mut cpu = Cpu::new(device, &config);
  cpu.load(words)?;
  let result = cpu.run();

  if machine.dump {
    println!("{}", cpu);
  }
  result?;

  if let Some(value) = cpu.return_value() {
    println!("main returned {}", value);
  }
  Ok(())
}

fn print_listing(path: &Path, no_optimize: bool) -> Result<()> {
  let source       = read_source(path)?;
  let items        = parse(&source)?;
  let mut compiler = Compiler::new();
  let program      = compiler.compile_program(&items)?;
  let program      = match no_optimize {
    true  => program,
    false => SymbolicProgram::new(optimize(&program))
  };
  print!("{}", program);
  print_symbols(compiler.symbols());
  Ok(())
}

/// Lists the symbol ids as assembly comments, so the listing still assembles.
fn print_symbols(symbols: &SymbolPool) {
  if symbols.is_empty() {
    return;
  }
  println!("; symbols");
  for id in (SYMBOL_BASE..).take(symbols.len()) {
    if let Some(name) = symbols.name(id) {
      println!(";   @{} = {:#x}", name, id);
    }
  }
}

fn assemble_listing(path: &Path, output: &Path) -> Result<()> {
  let listing = read_source(path)?;
  let records = parse_assembly(&listing)?;
  let words   = assemble(&records)?;
  std::fs::write(output, to_bytes(&words))
    .with_context(|| format!("could not write {}", output.display()))?;
  Ok(())
}

fn disassemble(path: &Path) -> Result<()> {
  let words = read_binary(path)?;
  for (offset, word) in words.iter().enumerate() {
    match decode_instruction(*word) {
      Some(instruction) => println!("{:06x}  {:08x}  {}", offset, word, instruction),
      None              => println!("{:06x}  {:08x}  .word {}", offset, word, word)
    }
  }
  Ok(())
}
