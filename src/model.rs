//! Shared definitions passed between the assembler, the VM and the writers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three meaningful source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Space,
    Tab,
    Lf,
}

impl Symbol {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b' ' => Some(Symbol::Space),
            b'\t' => Some(Symbol::Tab),
            b'\n' => Some(Symbol::Lf),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Symbol::Space => b' ',
            Symbol::Tab => b'\t',
            Symbol::Lf => b'\n',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Space => write!(f, "[Space]"),
            Symbol::Tab => write!(f, "[Tab]"),
            Symbol::Lf => write!(f, "[LF]"),
        }
    }
}

/// Jump/call label, kept as the raw bit string (`S` for Space, `T` for Tab).
///
/// Labels are compared as strings, so `S` and `SS` are two different labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(bits: impl Into<String>) -> Self {
        Self(bits.into())
    }

    pub fn push_bit(&mut self, bit: Symbol) {
        match bit {
            Symbol::Space => self.0.push('S'),
            Symbol::Tab => self.0.push('T'),
            Symbol::Lf => {}
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A resolved branch operand: the label as written plus the instruction
/// index it was marked at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub label: Label,
    pub index: usize,
}

/// One bytecode instruction.
///
/// `J` is the operand carried by Call/Jump/JumpIfZero/JumpIfNegative: a bare
/// [`Label`] while decoding, a [`Target`] once the assembler has resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction<J = Target> {
    // stack
    Push(i64),
    Dup,
    Swap,
    Discard,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // heap
    Store,
    Retrieve,
    // flow control
    Mark(Label),
    Call(J),
    Jump(J),
    JumpIfZero(J),
    JumpIfNegative(J),
    Return,
    Exit,
    // i/o
    OutChar,
    OutNum,
    ReadChar,
    ReadNum,
}

/// Instruction straight out of the decode pass.
pub type Unresolved = Instruction<Label>;

impl<J> Instruction<J> {
    /// Rewrite the branch operand, leaving every other variant untouched.
    pub fn try_map_target<K, E>(
        self,
        mut f: impl FnMut(J) -> Result<K, E>,
    ) -> Result<Instruction<K>, E> {
        use Instruction::*;
        Ok(match self {
            Call(j) => Call(f(j)?),
            Jump(j) => Jump(f(j)?),
            JumpIfZero(j) => JumpIfZero(f(j)?),
            JumpIfNegative(j) => JumpIfNegative(f(j)?),
            Push(n) => Push(n),
            Dup => Dup,
            Swap => Swap,
            Discard => Discard,
            Add => Add,
            Sub => Sub,
            Mul => Mul,
            Div => Div,
            Mod => Mod,
            Store => Store,
            Retrieve => Retrieve,
            Mark(l) => Mark(l),
            Return => Return,
            Exit => Exit,
            OutChar => OutChar,
            OutNum => OutNum,
            ReadChar => ReadChar,
            ReadNum => ReadNum,
        })
    }
}

/// Fully assembled program. Every branch target points into the program, or
/// exactly one past its end (a label marked after the last instruction).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub(crate) fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
