use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Whitespace program to run
    pub program: PathBuf,

    /// Read the program as S/T/L notation instead of raw whitespace
    #[arg(long)]
    pub mnemonic: bool,

    /// Write the assembled program listing as JSON
    #[arg(long, value_name = "FILE")]
    pub emit_json: Option<PathBuf>,

    /// Assemble only, do not run
    #[arg(long)]
    pub check: bool,

    /// Log verbosity on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
