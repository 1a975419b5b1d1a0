use crate::decoder::{BranchKind, Decoded, Operand};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Instruction,
    Text,
    Integer,
    PossibleAddress,
    Register,
    OperandSeparator,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Numeric value behind integer/address tokens (addresses in bytes).
    pub value: Option<u64>,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), value: None }
    }

    fn number(kind: TokenKind, value: u64) -> Self {
        Self { kind, text: format!("{value:#x}"), value: Some(value) }
    }
}

fn operand(d: &Decoded, op: &Operand) -> Token {
    match *op {
        Operand::Immediate(v) => Token::number(TokenKind::Integer, v as u64),
        // Byte addresses from here on: the static target if there is one,
        // otherwise the raw word value.
        Operand::Address(v) => {
            let bytes = d
                .branches
                .iter()
                .filter(|b| b.kind != BranchKind::False)
                .find_map(|b| b.byte_target())
                .unwrap_or(v as u32 * 2);
            Token::number(TokenKind::PossibleAddress, bytes as u64)
        }
        Operand::Condition(c) => Token::new(TokenKind::Text, c.name()),
        Operand::Register(r) => Token::new(TokenKind::Register, r.name()),
        Operand::RegisterIndirect(r) => Token::new(TokenKind::Register, r.indirect_name()),
        Operand::Memory(n) => Token::new(TokenKind::Register, format!("M{n:X}")),
    }
}

pub fn tokens(d: &Decoded) -> Vec<Token> {
    let mut out = vec![Token::new(TokenKind::Instruction, d.mnemonic.as_str())];
    for (i, op) in d.operands().enumerate() {
        if i == 0 {
            out.push(Token::new(TokenKind::Text, " "));
        } else {
            out.push(Token::new(TokenKind::OperandSeparator, ", "));
        }
        out.push(operand(d, op));
    }
    if let Some(c) = d.comment {
        out.push(Token::new(TokenKind::Text, "  "));
        out.push(Token::new(TokenKind::Comment, format!("; {c}")));
    }
    out
}

pub fn fmt_decoded(d: &Decoded) -> String {
    tokens(d).into_iter().map(|t| t.text).collect()
}
