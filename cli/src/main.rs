use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use zagros_core::{IoHandler, Vm, VmError};

#[derive(Parser, Debug)]
#[command(name = "zagros")]
#[command(about = "Run a flat byte image on the Zagros VM", long_about = None)]
struct Args {
    /// Path to the program image (flat bytes, executed from byte 0)
    program: PathBuf,

    /// Stop after this many instructions instead of running to completion
    #[arg(long)]
    steps: Option<u64>,

    /// Print the final VM snapshot as JSON on stdout
    #[arg(long, action = ArgAction::SetTrue)]
    snapshot: bool,

    /// Install the line-printer callback in this I/O slot (prints the
    /// NUL-terminated string at the start of the I/O window to stdout)
    #[arg(long)]
    print_slot: Option<usize>,
}

/// Host callback that prints the C-string at the start of the I/O window.
struct LinePrinter;

impl IoHandler for LinePrinter {
    fn run(&mut self, io_window: &mut [u8]) {
        let len = io_window
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(io_window.len());
        let text = String::from_utf8_lossy(&io_window[..len]);
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }

    fn description(&self) -> String {
        "line printer".to_string()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let image = fs::read(&args.program)
        .with_context(|| format!("reading program image {}", args.program.display()))?;

    let mut vm = Vm::new();
    vm.load_program(&image)
        .with_context(|| format!("image is {} bytes, larger than VM memory", image.len()))?;
    if let Some(slot) = args.print_slot {
        vm.install_io(slot, Box::new(LinePrinter));
    }

    let outcome = match args.steps {
        Some(budget) => run_bounded(&mut vm, budget),
        None => Some(vm.run()),
    };

    if args.snapshot {
        let json = serde_json::to_string_pretty(&vm.snapshot())?;
        println!("{json}");
    }

    match outcome {
        Some(VmError::SystemHalt) => {
            eprintln!("halted");
            Ok(())
        }
        Some(err) => bail!("vm fault: {err}"),
        None => {
            eprintln!("step budget exhausted");
            Ok(())
        }
    }
}

/// Runs at most `budget` instructions; `None` means the budget ran out with
/// the program still going.
fn run_bounded(vm: &mut Vm, budget: u64) -> Option<VmError> {
    for _ in 0..budget {
        if let Err(err) = vm.step() {
            return Some(err);
        }
    }
    None
}
