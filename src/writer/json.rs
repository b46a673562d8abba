//! Dump an assembled program as a JSON listing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::Program;

pub fn emit(program: &Program, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_listing(program, &mut out)?;
    out.flush()
        .with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

pub fn write_listing<W: Write>(program: &Program, out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, program).context("Serialising program listing")?;
    Ok(())
}
