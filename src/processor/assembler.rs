//! Assembler: decodes the symbol stream into bytecode, then links every
//! branch to the instruction index its label was marked at.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::lexer::Lexer;
use crate::error::AssemblyError;
use crate::model::{Instruction, Label, Program, Symbol, Target, Unresolved};

/// Assemble raw source bytes into a fully linked program.
pub fn assemble(src: &[u8]) -> Result<Program, AssemblyError> {
    let mut p = Parser::new(src);
    let code = p.parse()?;
    debug!(
        instructions = code.len(),
        labels = p.labels.len(),
        "decoded source"
    );

    let program = link(code, &p.labels)?;
    Ok(program)
}

/// Second pass. Runs only once the whole source is decoded, so forward
/// references are as good as backward ones.
fn link(code: Vec<Unresolved>, labels: &LabelTable) -> Result<Program, AssemblyError> {
    let resolved = code
        .into_iter()
        .map(|ins| ins.try_map_target(|label| labels.resolve(label)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program::new(resolved))
}

#[derive(Default)]
struct LabelTable {
    addrs: HashMap<Label, usize>,
}

impl LabelTable {
    fn mark(&mut self, label: Label, addr: usize) -> Result<(), AssemblyError> {
        if self.addrs.contains_key(&label) {
            return Err(AssemblyError::DuplicateLabel(label));
        }
        self.addrs.insert(label, addr);
        Ok(())
    }

    fn resolve(&self, label: Label) -> Result<Target, AssemblyError> {
        match self.addrs.get(&label) {
            Some(&index) => Ok(Target { label, index }),
            None => Err(AssemblyError::LabelNotFound(label)),
        }
    }

    fn len(&self) -> usize {
        self.addrs.len()
    }
}

struct Parser<'a> {
    lex: Lexer<'a>,
    labels: LabelTable,
}

impl<'a> Parser<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self {
            lex: Lexer::new(src),
            labels: LabelTable::default(),
        }
    }

    fn parse(&mut self) -> Result<Vec<Unresolved>, AssemblyError> {
        let mut res = Vec::<Unresolved>::new();
        while let Some(imp) = self.lex.next() {
            let cmd = self.parse_cmd(imp)?;
            trace!(index = res.len(), ?cmd, "decoded");
            match cmd {
                // marks take no slot; the label points at whatever comes next
                Instruction::Mark(label) => self.labels.mark(label, res.len())?,
                Instruction::Exit => {
                    res.push(Instruction::Exit);
                    break;
                }
                cmd => res.push(cmd),
            }
        }
        Ok(res)
    }

    fn next_symbol(&mut self) -> Result<Symbol, AssemblyError> {
        self.lex
            .next()
            .ok_or(AssemblyError::UnexpectedEndOfInput {
                position: self.lex.source_len(),
            })
    }

    fn unexpected(&self, symbol: Symbol) -> AssemblyError {
        AssemblyError::UnexpectedSymbol {
            symbol,
            position: self.lex.position().unwrap_or_default(),
        }
    }

    fn parse_cmd(&mut self, imp: Symbol) -> Result<Unresolved, AssemblyError> {
        match imp {
            Symbol::Space => self.parse_stack(),
            Symbol::Tab => match self.next_symbol()? {
                Symbol::Space => self.parse_arith(),
                Symbol::Tab => self.parse_heap(),
                Symbol::Lf => self.parse_io(),
            },
            Symbol::Lf => self.parse_flow(),
        }
    }

    fn parse_stack(&mut self) -> Result<Unresolved, AssemblyError> {
        match self.next_symbol()? {
            Symbol::Space => Ok(Instruction::Push(self.parse_number()?)),
            Symbol::Lf => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::Dup),
                Symbol::Tab => Ok(Instruction::Swap),
                Symbol::Lf => Ok(Instruction::Discard),
            },
            t => Err(self.unexpected(t)),
        }
    }

    fn parse_arith(&mut self) -> Result<Unresolved, AssemblyError> {
        match self.next_symbol()? {
            Symbol::Space => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::Add),
                Symbol::Tab => Ok(Instruction::Sub),
                Symbol::Lf => Ok(Instruction::Mul),
            },
            Symbol::Tab => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::Div),
                Symbol::Tab => Ok(Instruction::Mod),
                t => Err(self.unexpected(t)),
            },
            t => Err(self.unexpected(t)),
        }
    }

    fn parse_heap(&mut self) -> Result<Unresolved, AssemblyError> {
        match self.next_symbol()? {
            Symbol::Space => Ok(Instruction::Store),
            Symbol::Tab => Ok(Instruction::Retrieve),
            t => Err(self.unexpected(t)),
        }
    }

    fn parse_flow(&mut self) -> Result<Unresolved, AssemblyError> {
        match self.next_symbol()? {
            Symbol::Space => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::Mark(self.parse_label()?)),
                Symbol::Tab => Ok(Instruction::Call(self.parse_label()?)),
                Symbol::Lf => Ok(Instruction::Jump(self.parse_label()?)),
            },
            Symbol::Tab => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::JumpIfZero(self.parse_label()?)),
                Symbol::Tab => Ok(Instruction::JumpIfNegative(self.parse_label()?)),
                Symbol::Lf => Ok(Instruction::Return),
            },
            Symbol::Lf => match self.next_symbol()? {
                Symbol::Lf => Ok(Instruction::Exit),
                t => Err(self.unexpected(t)),
            },
        }
    }

    fn parse_io(&mut self) -> Result<Unresolved, AssemblyError> {
        match self.next_symbol()? {
            Symbol::Space => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::OutChar),
                Symbol::Tab => Ok(Instruction::OutNum),
                t => Err(self.unexpected(t)),
            },
            Symbol::Tab => match self.next_symbol()? {
                Symbol::Space => Ok(Instruction::ReadChar),
                Symbol::Tab => Ok(Instruction::ReadNum),
                t => Err(self.unexpected(t)),
            },
            t => Err(self.unexpected(t)),
        }
    }

    /// Sign symbol, then bits MSB first, then LF. No bits means zero.
    fn parse_number(&mut self) -> Result<i64, AssemblyError> {
        let negative = match self.next_symbol()? {
            Symbol::Space => false,
            Symbol::Tab => true,
            t => return Err(self.unexpected(t)),
        };

        let mut magnitude: u64 = 0;
        loop {
            match self.next_symbol()? {
                Symbol::Space => magnitude <<= 1,
                Symbol::Tab => magnitude = (magnitude << 1) | 1,
                Symbol::Lf => break,
            }
        }

        let value = magnitude as i64;
        Ok(if negative { value.wrapping_neg() } else { value })
    }

    fn parse_label(&mut self) -> Result<Label, AssemblyError> {
        let mut label = Label::default();
        loop {
            match self.next_symbol()? {
                Symbol::Lf => return Ok(label),
                bit => label.push_bit(bit),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::lexer::translate_mnemonics;

    fn target(label: &str, index: usize) -> Target {
        Target {
            label: Label::new(label),
            index,
        }
    }

    fn parse_one(src: &str) -> Result<Unresolved, AssemblyError> {
        let bytes = translate_mnemonics(src);
        let mut parser = Parser::new(&bytes);
        let imp = parser.lex.next().expect("non-empty source");
        parser.parse_cmd(imp)
    }

    #[test]
    fn test_parse_every_opcode() {
        let test_cases = vec![
            ("SSSTL", Instruction::Push(1)),
            ("SLS", Instruction::Dup),
            ("SLT", Instruction::Swap),
            ("SLL", Instruction::Discard),
            ("TSSS", Instruction::Add),
            ("TSST", Instruction::Sub),
            ("TSSL", Instruction::Mul),
            ("TSTS", Instruction::Div),
            ("TSTT", Instruction::Mod),
            ("TTS", Instruction::Store),
            ("TTT", Instruction::Retrieve),
            ("LSSTL", Instruction::Mark(Label::new("T"))),
            ("LSTSL", Instruction::Call(Label::new("S"))),
            ("LSLTSL", Instruction::Jump(Label::new("TS"))),
            ("LTSSL", Instruction::JumpIfZero(Label::new("S"))),
            ("LTTTL", Instruction::JumpIfNegative(Label::new("T"))),
            ("LTL", Instruction::Return),
            ("LLL", Instruction::Exit),
            ("TLSS", Instruction::OutChar),
            ("TLST", Instruction::OutNum),
            ("TLTS", Instruction::ReadChar),
            ("TLTT", Instruction::ReadNum),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_one(input), Ok(expected), "source {input}");
        }
    }

    #[test]
    fn test_parse_numbers() {
        let test_cases = vec![
            ("SS(push) STL(+1)".to_string(), 1),
            ("SS(push) TTSTL(-101)".to_string(), -5),
            ("SS(push) STSSSSSTL(+65)".to_string(), 65),
            ("SS(push) SSSSTL(leading zeros)".to_string(), 1),
            ("SS(push) SL(empty)".to_string(), 0),
            ("SS(push) TL(empty negative)".to_string(), 0),
            // bits beyond the 64th shift out the top
            (format!("SS S T{}T L", "S".repeat(68)), 1),
            (format!("SS S {} L", "T".repeat(64)), -1),
            (format!("SS T {} L", "T".repeat(64)), 1),
            (format!("SS S T{} L", "S".repeat(63)), i64::MIN),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_one(&input), Ok(Instruction::Push(expected)), "source {input}");
        }
    }

    #[test]
    fn test_parse_push_program() {
        let src = translate_mnemonics("SS(push),STL(+1),SS(push),TTSTL(-101),LLL");
        let program = assemble(&src).unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(1),
                Instruction::Push(-5),
                Instruction::Exit
            ]
        );
    }

    #[test]
    fn test_unexpected_symbols() {
        // byte offsets count every byte, comments included
        let test_cases = vec![
            ("  \n\n", Symbol::Lf, 2),    // push with LF sign
            (" \t", Symbol::Tab, 1),      // stack IMP followed by Tab
            ("\t\t\n", Symbol::Lf, 2),    // heap
            ("\t \n", Symbol::Lf, 2),     // arith first selector
            ("\t \t\n", Symbol::Lf, 3),   // arith second selector
            ("\t\n\n", Symbol::Lf, 2),    // io
            ("\t\n \n", Symbol::Lf, 3),   // io output
            ("\t\n\t\n", Symbol::Lf, 3),  // io input
            ("\n\n ", Symbol::Space, 2),  // flow end
            ("xx\n\n\t", Symbol::Tab, 4), // comments before the error
        ];

        for (src, symbol, position) in test_cases {
            assert_eq!(
                assemble(src.as_bytes()),
                Err(AssemblyError::UnexpectedSymbol { symbol, position }),
                "source {src:?}"
            );
        }
    }

    #[test]
    fn test_truncated_instruction() {
        let src = translate_mnemonics("SS(push) STT");
        assert_eq!(
            assemble(&src),
            Err(AssemblyError::UnexpectedEndOfInput { position: src.len() })
        );
    }

    #[test]
    fn test_empty_source_is_empty_program() {
        let program = assemble(b"only-comments-here").unwrap();
        assert!(program.is_empty());
    }

    #[test]
    fn test_decode_stops_at_exit() {
        // garbage after the exit is never looked at
        let mut src = translate_mnemonics("SSSTL LLL");
        src.extend_from_slice(b"\n\n ");
        let program = assemble(&src).unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Push(1), Instruction::Exit]
        );
    }

    #[test]
    fn test_forward_and_backward_references() {
        let src = translate_mnemonics(
            "LSL(jmp) TL
             LSS(mrk) SL
             SLS(dup)
             LTL(ret)
             LSS(mrk) TL
             LST(cll) SL
             LLL",
        );
        let program = assemble(&src).unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Jump(target("T", 3)),
                Instruction::Dup,
                Instruction::Return,
                Instruction::Call(target("S", 1)),
                Instruction::Exit,
            ]
        );
    }

    #[test]
    fn test_label_at_end_points_past_last_instruction() {
        let src = translate_mnemonics("LSL(jmp) SL LSS(mrk) SL");
        let program = assemble(&src).unwrap();
        assert_eq!(program.instructions(), &[Instruction::Jump(target("S", 1))]);
    }

    #[test]
    fn test_label_errors() {
        let test_cases = vec![
            (
                "LSL(jmp) TL LSS SL LLL",
                AssemblyError::LabelNotFound(Label::new("T")),
            ),
            (
                "LSS(mrk) SL LSS(mrk) SL LLL",
                AssemblyError::DuplicateLabel(Label::new("S")),
            ),
            (
                // S and SS are different labels
                "LSS(mrk) SL LSL(jmp) SSL LLL",
                AssemblyError::LabelNotFound(Label::new("SS")),
            ),
        ];

        for (input, expected) in test_cases {
            let src = translate_mnemonics(input);
            assert_eq!(assemble(&src), Err(expected), "source {input}");
        }
    }

    #[test]
    fn test_empty_label() {
        let src = translate_mnemonics("LSS(mrk) L LSL(jmp) L LLL");
        let program = assemble(&src).unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Jump(target("", 0)), Instruction::Exit]
        );
    }
}
