pub mod cli;
pub mod error;
pub mod model;
pub mod processor;
pub mod writer;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, info};

pub use error::{AssemblyError, VmError};
pub use model::{Instruction, Label, Program, Symbol, Target};
pub use processor::{Machine, assemble};

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing(match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    });

    // 1. ── Load ───────────────────────────────────────────────────────
    let raw = std::fs::read(&args.program)
        .with_context(|| format!("Reading {}", args.program.display()))?;
    let src = if args.mnemonic {
        let text = String::from_utf8(raw).with_context(|| "Mnemonic source is not UTF-8")?;
        processor::lexer::translate_mnemonics(&text)
    } else {
        raw
    };

    // 2. ── Assemble ───────────────────────────────────────────────────
    let program = processor::assemble(&src)
        .with_context(|| format!("Assembling {}", args.program.display()))?;
    info!(instructions = program.len(), "assembled");

    if let Some(path) = &args.emit_json {
        writer::json::emit(&program, path).with_context(|| "Writing program listing")?;
    }
    if args.check {
        return Ok(());
    }

    // 3. ── Execute ────────────────────────────────────────────────────
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    processor::run(&program, stdin, stdout).with_context(|| "Running program")?;

    Ok(())
}

/// Logs go to stderr; stdout belongs to the program being run.
fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}
