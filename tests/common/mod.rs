#![allow(dead_code)]

use std::collections::HashMap;

use wsvm_rust::processor::lexer::translate_mnemonics;
use wsvm_rust::{Machine, VmError, assemble};

pub struct Run {
    pub result: Result<(), VmError>,
    pub stack: Vec<i64>,
    pub heap: HashMap<i64, i64>,
    pub output: String,
}

/// Assemble S/T/L notation and run it against `input`.
pub fn exec(src: &str, input: &str) -> Run {
    let program = assemble(&translate_mnemonics(src)).expect("program assembles");
    let mut output = Vec::new();
    let mut vm = Machine::new(&program);
    let result = vm.run(input.as_bytes(), &mut output);
    Run {
        result,
        stack: vm.stack().to_vec(),
        heap: vm.heap().clone(),
        output: String::from_utf8(output).expect("utf-8 output"),
    }
}

/// S/T/L encoding of a push operand: sign, binary magnitude, LF.
pub fn number(n: i64) -> String {
    let sign = if n < 0 { 'T' } else { 'S' };
    let bits: String = format!("{:b}", n.unsigned_abs())
        .chars()
        .map(|c| if c == '1' { 'T' } else { 'S' })
        .collect();
    format!("{sign}{bits}L")
}

pub fn push(n: i64) -> String {
    format!("SS{}", number(n))
}
