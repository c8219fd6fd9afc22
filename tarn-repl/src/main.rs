//! Tarn command-line driver.
//!
//! Runs an optional script file, an optional `--eval` expression, and then
//! an interactive read-eval-print loop over stdin. Each input line is
//! wrapped as a byte source and driven to EOF; errors are reported to
//! stderr and the session continues.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tarn_core::{GcConfig, Machine, MemSource};

/// A minimal Lisp interpreter with a semispace copying collector.
#[derive(Parser, Debug)]
#[command(name = "tarn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A minimal Lisp interpreter", long_about = None)]
struct Cli {
    /// Script to execute before anything else
    file: Option<PathBuf>,

    /// Expression to evaluate after the script, if any
    #[arg(short, long, value_name = "EXPR")]
    eval: Option<String>,

    /// Exit without entering the interactive loop
    #[arg(long)]
    no_repl: bool,

    /// Run the collector before every allocation (GC debugging)
    #[arg(long, env = "TARN_ALWAYS_GC")]
    always_gc: bool,

    /// Size of each heap semispace in bytes
    #[arg(long, value_name = "BYTES")]
    heap_size: Option<usize>,

    /// Log a summary line after every collection cycle
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tarn: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = GcConfig {
        semispace_size: cli.heap_size.unwrap_or(tarn_core::DEFAULT_SEMISPACE_SIZE),
        always_gc: cli.always_gc,
        verbose: cli.verbose,
    };
    tracing::debug!(
        semispace_size = config.semispace_size,
        always_gc = config.always_gc,
        "starting interpreter"
    );
    let mut machine = Machine::new(config)?;

    let mut status = 0;
    if let Some(file) = &cli.file {
        status = machine.process_file(file);
    }
    if let Some(expr) = &cli.eval {
        let mut src = MemSource::from_str("<eval>", expr);
        status = machine.eval_input(&mut src);
    }
    if !cli.no_repl {
        status = repl(&mut machine)?;
    }
    Ok(if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The interactive loop: a numbered prompt when stdin is a terminal, one
/// expression batch per line.
fn repl(machine: &mut Machine) -> anyhow::Result<i32> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut status = 0;
    let mut prompt = 1u64;
    let mut line = String::new();
    loop {
        if interactive {
            print!("{prompt}: ");
            io::stdout().flush()?;
        }
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let mut src = MemSource::from_str("<stdin>", &line);
        status = machine.eval_input(&mut src);
        prompt += 1;
    }
    Ok(status)
}
