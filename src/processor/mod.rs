//! The functional core: scan, assemble, execute.
pub mod assembler;
pub mod lexer;
pub mod vm;

pub use assembler::assemble;
pub use vm::{Machine, run};
