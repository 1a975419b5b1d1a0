use crate::page::PageIndex;
use crate::regs::Reg;
use crate::word::Word;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("zero-length input to decode")]
    InvalidInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    Pset,
    Jp,
    Jpba,
    Call,
    Calz,
    Ret,
    Rets,
    Retd,
    Nop5,
    Nop7,
    Halt,
    Slp,
    Inc,
    Dec,
    Ld,
    Ldpx,
    Ldpy,
    Lbpx,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Or,
    Xor,
    Cp,
    Fan,
    Rlc,
    Rrc,
    Not,
    Acpx,
    Acpy,
    Scpx,
    Scpy,
    Set,
    Rst,
    Scf,
    Rcf,
    Szf,
    Rzf,
    Sdf,
    Rdf,
    Ei,
    Di,
    Push,
    Pop,
    Unknown,
}

impl Mnemonic {
    pub fn as_str(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Pset => "PSET",
            Jp => "JP",
            Jpba => "JPBA",
            Call => "CALL",
            Calz => "CALZ",
            Ret => "RET",
            Rets => "RETS",
            Retd => "RETD",
            Nop5 => "NOP5",
            Nop7 => "NOP7",
            Halt => "HALT",
            Slp => "SLP",
            Inc => "INC",
            Dec => "DEC",
            Ld => "LD",
            Ldpx => "LDPX",
            Ldpy => "LDPY",
            Lbpx => "LBPX",
            Add => "ADD",
            Adc => "ADC",
            Sub => "SUB",
            Sbc => "SBC",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Cp => "CP",
            Fan => "FAN",
            Rlc => "RLC",
            Rrc => "RRC",
            Not => "NOT",
            Acpx => "ACPX",
            Acpy => "ACPY",
            Scpx => "SCPX",
            Scpy => "SCPY",
            Set => "SET",
            Rst => "RST",
            Scf => "SCF",
            Rcf => "RCF",
            Szf => "SZF",
            Rzf => "RZF",
            Sdf => "SDF",
            Rdf => "RDF",
            Ei => "EI",
            Di => "DI",
            Push => "PUSH",
            Pop => "POP",
            Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch conditions tested by `JP cc, s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    C,
    NC,
    Z,
    NZ,
}

impl Condition {
    pub fn name(self) -> &'static str {
        match self {
            Condition::C => "C",
            Condition::NC => "NC",
            Condition::Z => "Z",
            Condition::NZ => "NZ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Immediate(u8),
    /// Word address (or in-page step for branches); doubled only for display.
    Address(u16),
    Condition(Condition),
    Register(Reg),
    /// Memory addressed by an index register (`MX`, `MY`).
    RegisterIndirect(Reg),
    /// Direct data memory `Mn` in RAM page 0.
    Memory(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Unconditional,
    True,
    False,
    Indirect,
    CallDestination,
    FunctionReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEdge {
    pub kind: BranchKind,
    /// Word address, when statically known.
    pub target: Option<u32>,
}

impl BranchEdge {
    pub fn new(kind: BranchKind, target: Option<u32>) -> Self {
        Self { kind, target }
    }

    /// Target as a host byte address.
    pub fn byte_target(&self) -> Option<u32> {
        self.target.map(|t| t * 2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub word: Word,
    pub address: u32,
    pub mnemonic: Mnemonic,
    pub op1: Option<Operand>,
    pub op2: Option<Operand>,
    pub branches: Vec<BranchEdge>,
    pub comment: Option<&'static str>,
}

impl Decoded {
    pub fn unknown(word: Word, address: u32) -> Self {
        Self {
            word,
            address,
            mnemonic: Mnemonic::Unknown,
            op1: None,
            op2: None,
            branches: Vec::new(),
            comment: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.mnemonic == Mnemonic::Unknown
    }

    /// First statically known branch target (word address).
    pub fn target(&self) -> Option<u32> {
        self.branches.iter().find_map(|b| match b.kind {
            BranchKind::False => None,
            _ => b.target,
        })
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.op1.iter().chain(self.op2.iter())
    }
}

/// Instructions are a fixed two bytes wide.
pub const INSTR_LEN: u32 = 2;

pub trait Decoder {
    /// Decode the word in `bytes` at word address `address`. Branch targets are
    /// resolved against `pages`, which must already hold every PSET.
    fn decode(&self, bytes: &[u8], address: u32, pages: &PageIndex) -> Result<Decoded, DecodeError>;
}
