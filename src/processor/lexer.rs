//! Symbol scanner for whitespace source.
//!
//! Only three bytes mean anything: Space, Tab and LF. Every other byte is a
//! comment and is skipped without ever reaching the assembler.
//
//  Lexical items:
//
//      Symbol   ::= ' ' | '\t' | '\n'
//      Comment  ::= any other byte (discarded)

use std::iter::Enumerate;
use std::slice::Iter;

use crate::model::Symbol;

#[derive(Clone)]
pub struct Lexer<'a> {
    bytes: Enumerate<Iter<'a, u8>>,
    len: usize,
    last: Option<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            bytes: src.iter().enumerate(),
            len: src.len(),
            last: None,
        }
    }

    /// Byte offset of the symbol most recently returned by `next`.
    pub fn position(&self) -> Option<usize> {
        self.last
    }

    pub fn source_len(&self) -> usize {
        self.len
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Self::Item> {
        for (pos, &b) in self.bytes.by_ref() {
            if let Some(sym) = Symbol::from_byte(b) {
                self.last = Some(pos);
                return Some(sym);
            }
        }
        None
    }
}

/// Turn S/T/L notation into real source bytes.
///
/// `S` becomes Space, `T` Tab, `L` LF; everything else is dropped, so the
/// notation can carry its own annotations, e.g. `SS(push) STL(+1)`.
pub fn translate_mnemonics(src: &str) -> Vec<u8> {
    src.chars()
        .filter_map(|c| match c {
            'S' => Some(Symbol::Space.as_byte()),
            'T' => Some(Symbol::Tab.as_byte()),
            'L' => Some(Symbol::Lf.as_byte()),
            _ => None,
        })
        .collect()
}
