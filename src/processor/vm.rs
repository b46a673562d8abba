//! Stack machine that executes an assembled [`Program`].
//!
//! All state (data stack, heap, call stack, program counter) lives in one
//! [`Machine`] value created per run; nothing is global, so runs never see
//! each other.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use tracing::{debug, trace, warn};

use crate::error::VmError;
use crate::model::{Instruction, Program};

/// Run `program` on a fresh machine.
pub fn run<R: BufRead, W: Write>(program: &Program, input: R, output: W) -> Result<(), VmError> {
    Machine::new(program).run(input, output)
}

pub struct Machine<'p> {
    program: &'p Program,
    stack: Vec<i64>,
    heap: HashMap<i64, i64>,
    calls: Vec<usize>,
    pc: usize,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            stack: Vec::new(),
            heap: HashMap::new(),
            calls: Vec::new(),
            pc: 0,
        }
    }

    /// Data stack, bottom first.
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn heap(&self) -> &HashMap<i64, i64> {
        &self.heap
    }

    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Execute from the first instruction on fresh state until Exit, the end
    /// of the program, or the first fault. The accessors keep reporting the
    /// final state of the last run.
    ///
    /// `output` is flushed before every blocking read and once more when the
    /// run stops, whatever the outcome.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<(), VmError> {
        self.reset();
        let res = self.execute(&mut input, &mut output);
        let flushed = output.flush();
        if let Err(e) = &res {
            debug!(pc = self.pc, error = %e, "run aborted");
        }
        res?;
        flushed?;
        Ok(())
    }

    fn execute<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<(), VmError> {
        let program = self.program;
        loop {
            let Some(ins) = program.get(self.pc) else {
                warn!(pc = self.pc, "ran past the last instruction without exit");
                return Ok(());
            };
            trace!(pc = self.pc, ?ins, depth = self.stack.len(), "exec");
            self.pc += 1;

            match ins {
                Instruction::Push(n) => self.stack.push(*n),
                Instruction::Dup => {
                    let a = self.pop()?;
                    self.stack.push(a);
                    self.stack.push(a);
                }
                Instruction::Swap => {
                    let a = self.pop()?;
                    let b = self.pop()?;
                    self.stack.push(a);
                    self.stack.push(b);
                }
                Instruction::Discard => {
                    self.pop()?;
                }

                Instruction::Add => self.binary(|l, r| Ok(l.wrapping_add(r)))?,
                Instruction::Sub => self.binary(|l, r| Ok(l.wrapping_sub(r)))?,
                Instruction::Mul => self.binary(|l, r| Ok(l.wrapping_mul(r)))?,
                Instruction::Div => self.binary(|l, r| match r {
                    0 => Err(VmError::DivisionByZero),
                    r => Ok(l.wrapping_div(r)),
                })?,
                Instruction::Mod => self.binary(|l, r| match r {
                    0 => Err(VmError::DivisionByZero),
                    r => Ok(l.wrapping_rem(r)),
                })?,

                Instruction::Store => {
                    let value = self.pop()?;
                    let addr = self.pop()?;
                    self.heap.insert(addr, value);
                }
                Instruction::Retrieve => {
                    let addr = self.pop()?;
                    let value = self.heap.get(&addr).copied().unwrap_or(0);
                    self.stack.push(value);
                }

                // consumed by the assembler
                Instruction::Mark(_) => {}
                Instruction::Call(t) => {
                    self.calls.push(self.pc);
                    self.pc = t.index;
                }
                Instruction::Jump(t) => self.pc = t.index,
                Instruction::JumpIfZero(t) => {
                    if self.pop()? == 0 {
                        self.pc = t.index;
                    }
                }
                Instruction::JumpIfNegative(t) => {
                    if self.pop()? < 0 {
                        self.pc = t.index;
                    }
                }
                Instruction::Return => {
                    self.pc = self.calls.pop().ok_or(VmError::CallStackUnderflow)?;
                }
                Instruction::Exit => {
                    debug!(pc = self.pc, depth = self.stack.len(), "exit");
                    return Ok(());
                }

                Instruction::OutChar => {
                    let v = self.pop()?;
                    let c = u32::try_from(v)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    write!(output, "{c}")?;
                }
                Instruction::OutNum => {
                    let v = self.pop()?;
                    write!(output, "{v}")?;
                }
                Instruction::ReadChar => {
                    output.flush()?;
                    let c = read_char(input)?.ok_or(VmError::UnexpectedEndOfInput)?;
                    self.stack.push(c as i64);
                }
                Instruction::ReadNum => {
                    output.flush()?;
                    let n = read_num(input)?;
                    self.stack.push(n);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.heap.clear();
        self.calls.clear();
        self.pc = 0;
    }

    fn pop(&mut self) -> Result<i64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pops `r` then `l` and pushes `op(l, r)`.
    fn binary(&mut self, op: impl FnOnce(i64, i64) -> Result<i64, VmError>) -> Result<(), VmError> {
        let r = self.pop()?;
        let l = self.pop()?;
        self.stack.push(op(l, r)?);
        Ok(())
    }
}

/// Read a single UTF-8 encoded character. `None` on a clean end of input.
fn read_char<R: BufRead>(input: &mut R) -> io::Result<Option<char>> {
    let first = match input.fill_buf()?.first() {
        Some(&b) => b,
        None => return Ok(None),
    };
    input.consume(1);

    let width = match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Err(invalid_utf8()),
    };
    let mut buf = [first, 0, 0, 0];
    input.read_exact(&mut buf[1..width])?;

    let s = std::str::from_utf8(&buf[..width]).map_err(|_| invalid_utf8())?;
    Ok(s.chars().next())
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "input is not valid UTF-8")
}

/// Read one line and parse it as a signed decimal.
fn read_num<R: BufRead>(input: &mut R) -> Result<i64, VmError> {
    let mut line = Vec::new();
    input.read_until(b'\n', &mut line)?;
    let text = String::from_utf8_lossy(&line);
    let text = text.trim_end_matches(['\r', '\n']);
    text.parse::<i64>()
        .map_err(|_| VmError::InvalidNumericInput(text.to_string()))
}
