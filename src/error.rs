//! Error types for the two failure domains: assembling source, running bytecode.

use thiserror::Error;

use crate::model::{Label, Symbol};

/// Static errors. Assembly never returns a partial program.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("unexpected symbol {symbol} at byte {position}")]
    UnexpectedSymbol { symbol: Symbol, position: usize },

    #[error("source ended in the middle of an instruction (byte {position})")]
    UnexpectedEndOfInput { position: usize },

    #[error("label {0} is marked more than once")]
    DuplicateLabel(Label),

    #[error("label not found: {0}")]
    LabelNotFound(Label),
}

/// Dynamic errors. Each one stops the run at the failing instruction.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("data stack underflow")]
    StackUnderflow,

    #[error("return with an empty call stack")]
    CallStackUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid numeric input: {0:?}")]
    InvalidNumericInput(String),

    #[error("input stream exhausted while reading a character")]
    UnexpectedEndOfInput,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
