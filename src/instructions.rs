//! The E0C6200-core opcode map as an ordered rule list.
//!
//! Rules are tried top to bottom and the first whose `mask`/`value` matches
//! wins. Several encodings overlap on purpose (`INC X` is the `LDPX A,A` slot,
//! `NOT r` is `XOR r,0xF`, `SCF` is `SET F,1`, ...), so the narrower rule is
//! always listed before the coarser one it shadows.

use crate::decoder::{Condition, Mnemonic, Operand};
use crate::regs::Reg;
use crate::word::Word;
use Field::{Imm4, Imm5, Imm8, Ind, Mem, Sel, Step};
use Mnemonic::*;

/// How an operand is pulled out of the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    None,
    /// 2-bit r/q selector (A, B, MX, MY) at the given bit offset.
    Sel(u8),
    Imm4,
    Imm5,
    Imm8,
    /// In-page branch step (bits 7..0).
    Step,
    /// Direct memory `Mn` (bits 3..0).
    Mem,
    Reg(Reg),
    Ind(Reg),
    Cond(Condition),
}

impl Field {
    pub fn extract(self, w: Word) -> Option<Operand> {
        let op = match self {
            Field::None => return None,
            Field::Sel(shift) => match Reg::from_selector(w.field2(shift)) {
                (r, false) => Operand::Register(r),
                (r, true) => Operand::RegisterIndirect(r),
            },
            Field::Imm4 => Operand::Immediate(w.lower()),
            Field::Imm5 => Operand::Immediate(w.imm5()),
            Field::Imm8 => Operand::Immediate(w.low8()),
            Field::Step => Operand::Address(w.low8() as u16),
            Field::Mem => Operand::Memory(w.lower()),
            Field::Reg(r) => Operand::Register(r),
            Field::Ind(r) => Operand::RegisterIndirect(r),
            Field::Cond(c) => Operand::Condition(c),
        };
        Some(op)
    }
}

/// Control-flow class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    /// `JP s`: bank/page from the governing PSET.
    Jump,
    /// `JP cc, s`: like `Jump`, plus fall-through.
    CondJump,
    /// `CALL s`: bank and page from the caller's address.
    Call,
    /// `CALZ s`: bank from the caller's address, page 0.
    CallZero,
    Return,
    /// `RETS`: returns past the instruction following the call.
    ReturnSkip,
    /// `JPBA`: target assembled from NBP:NPP:B:A at run time.
    JumpIndirect,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub mask: u16,
    pub value: u16,
    pub mnemonic: Mnemonic,
    pub op1: Field,
    pub op2: Field,
    pub flow: Flow,
}

impl InstrDesc {
    pub fn matches(&self, w: Word) -> bool {
        w.matches(self.mask, self.value)
    }

    pub fn condition(&self) -> Option<Condition> {
        match (self.op1, self.op2) {
            (Field::Cond(c), _) | (_, Field::Cond(c)) => Some(c),
            _ => None,
        }
    }
}

const M4: u16 = 0xF00;
const M6: u16 = 0xFC0;
const M7: u16 = 0xFE0;
const M8: u16 = 0xFF0;
const M10: u16 = 0xFFC;
const M12: u16 = 0xFFF;

const fn rule(mask: u16, value: u16, mnemonic: Mnemonic, op1: Field, op2: Field, flow: Flow) -> InstrDesc {
    InstrDesc { mask, value, mnemonic, op1, op2, flow }
}

const fn op(mask: u16, value: u16, mnemonic: Mnemonic, op1: Field, op2: Field) -> InstrDesc {
    rule(mask, value, mnemonic, op1, op2, Flow::Next)
}

const fn bare(value: u16, mnemonic: Mnemonic) -> InstrDesc {
    rule(M12, value, mnemonic, Field::None, Field::None, Flow::Next)
}

const R54: Field = Sel(4);
const R32: Field = Sel(2);
const R10: Field = Sel(0);
const NONE: Field = Field::None;

const fn reg(r: Reg) -> Field {
    Field::Reg(r)
}

pub const TABLE: &[InstrDesc] = &[
    // page set and branches
    rule(M7, 0xE40, Pset, Imm5, NONE, Flow::Next),
    rule(M4, 0x000, Jp, Step, NONE, Flow::Jump),
    rule(M4, 0x200, Jp, Field::Cond(Condition::C), Step, Flow::CondJump),
    rule(M4, 0x300, Jp, Field::Cond(Condition::NC), Step, Flow::CondJump),
    rule(M4, 0x600, Jp, Field::Cond(Condition::Z), Step, Flow::CondJump),
    rule(M4, 0x700, Jp, Field::Cond(Condition::NZ), Step, Flow::CondJump),
    rule(M12, 0xFE8, Jpba, NONE, NONE, Flow::JumpIndirect),
    rule(M4, 0x400, Call, Step, NONE, Flow::Call),
    rule(M4, 0x500, Calz, Step, NONE, Flow::CallZero),
    rule(M12, 0xFDF, Ret, NONE, NONE, Flow::Return),
    rule(M12, 0xFDE, Rets, NONE, NONE, Flow::ReturnSkip),
    rule(M4, 0x100, Retd, Imm8, NONE, Flow::Return),
    // system control
    bare(0xFFB, Nop5),
    bare(0xFFF, Nop7),
    bare(0xFF8, Halt),
    bare(0xFF9, Slp),
    // index registers
    op(M12, 0xEE0, Inc, reg(Reg::X), NONE),
    op(M12, 0xEF0, Inc, reg(Reg::Y), NONE),
    op(M4, 0xB00, Ld, reg(Reg::X), Imm8),
    op(M4, 0x800, Ld, reg(Reg::Y), Imm8),
    op(M10, 0xE80, Ld, reg(Reg::XP), R10),
    op(M10, 0xE84, Ld, reg(Reg::XH), R10),
    op(M10, 0xE88, Ld, reg(Reg::XL), R10),
    op(M10, 0xE8C, Rrc, R10, NONE),
    op(M10, 0xE90, Ld, reg(Reg::YP), R10),
    op(M10, 0xE94, Ld, reg(Reg::YH), R10),
    op(M10, 0xE98, Ld, reg(Reg::YL), R10),
    op(M10, 0xEA0, Ld, R10, reg(Reg::XP)),
    op(M10, 0xEA4, Ld, R10, reg(Reg::XH)),
    op(M10, 0xEA8, Ld, R10, reg(Reg::XL)),
    op(M10, 0xEB0, Ld, R10, reg(Reg::YP)),
    op(M10, 0xEB4, Ld, R10, reg(Reg::YH)),
    op(M10, 0xEB8, Ld, R10, reg(Reg::YL)),
    op(M8, 0xA00, Adc, reg(Reg::XH), Imm4),
    op(M8, 0xA10, Adc, reg(Reg::XL), Imm4),
    op(M8, 0xA20, Adc, reg(Reg::YH), Imm4),
    op(M8, 0xA30, Adc, reg(Reg::YL), Imm4),
    op(M8, 0xA40, Cp, reg(Reg::XH), Imm4),
    op(M8, 0xA50, Cp, reg(Reg::XL), Imm4),
    op(M8, 0xA60, Cp, reg(Reg::YH), Imm4),
    op(M8, 0xA70, Cp, reg(Reg::YL), Imm4),
    // data transfer
    op(M6, 0xE00, Ld, R54, Imm4),
    op(M8, 0xEC0, Ld, R32, R10),
    op(M8, 0xFA0, Ld, reg(Reg::A), Mem),
    op(M8, 0xFB0, Ld, reg(Reg::B), Mem),
    op(M8, 0xF80, Ld, Mem, reg(Reg::A)),
    op(M8, 0xF90, Ld, Mem, reg(Reg::B)),
    op(M8, 0xE60, Ldpx, Ind(Reg::IX), Imm4),
    op(M8, 0xEE0, Ldpx, R32, R10),
    op(M8, 0xE70, Ldpy, Ind(Reg::IY), Imm4),
    op(M8, 0xEF0, Ldpy, R32, R10),
    op(M4, 0x900, Lbpx, Ind(Reg::IX), Imm8),
    // flags
    bare(0xF41, Scf),
    bare(0xF42, Szf),
    bare(0xF44, Sdf),
    bare(0xF48, Ei),
    bare(0xF5E, Rcf),
    bare(0xF5D, Rzf),
    bare(0xF5B, Rdf),
    bare(0xF57, Di),
    op(M8, 0xF40, Set, reg(Reg::F), Imm4),
    op(M8, 0xF50, Rst, reg(Reg::F), Imm4),
    // stack
    op(M12, 0xFDB, Inc, reg(Reg::SP), NONE),
    op(M12, 0xFCB, Dec, reg(Reg::SP), NONE),
    op(M10, 0xFC0, Push, R10, NONE),
    op(M12, 0xFC4, Push, reg(Reg::XP), NONE),
    op(M12, 0xFC5, Push, reg(Reg::XH), NONE),
    op(M12, 0xFC6, Push, reg(Reg::XL), NONE),
    op(M12, 0xFC7, Push, reg(Reg::YP), NONE),
    op(M12, 0xFC8, Push, reg(Reg::YH), NONE),
    op(M12, 0xFC9, Push, reg(Reg::YL), NONE),
    op(M12, 0xFCA, Push, reg(Reg::F), NONE),
    op(M10, 0xFD0, Pop, R10, NONE),
    op(M12, 0xFD4, Pop, reg(Reg::XP), NONE),
    op(M12, 0xFD5, Pop, reg(Reg::XH), NONE),
    op(M12, 0xFD6, Pop, reg(Reg::XL), NONE),
    op(M12, 0xFD7, Pop, reg(Reg::YP), NONE),
    op(M12, 0xFD8, Pop, reg(Reg::YH), NONE),
    op(M12, 0xFD9, Pop, reg(Reg::YL), NONE),
    op(M12, 0xFDA, Pop, reg(Reg::F), NONE),
    op(M10, 0xFE0, Ld, reg(Reg::SPH), R10),
    op(M10, 0xFF0, Ld, reg(Reg::SPL), R10),
    op(M10, 0xFE4, Ld, R10, reg(Reg::SPH)),
    op(M10, 0xFF4, Ld, R10, reg(Reg::SPL)),
    // arithmetic and logic
    op(M6, 0xC00, Add, R54, Imm4),
    op(M8, 0xA80, Add, R32, R10),
    op(M6, 0xC40, Adc, R54, Imm4),
    op(M8, 0xA90, Adc, R32, R10),
    op(M8, 0xAA0, Sub, R32, R10),
    op(M6, 0xD40, Sbc, R54, Imm4),
    op(M8, 0xAB0, Sbc, R32, R10),
    op(M6, 0xC80, And, R54, Imm4),
    op(M8, 0xAC0, And, R32, R10),
    op(M6, 0xCC0, Or, R54, Imm4),
    op(M8, 0xAD0, Or, R32, R10),
    op(0xFCF, 0xD0F, Not, R54, NONE),
    op(M6, 0xD00, Xor, R54, Imm4),
    op(M8, 0xAE0, Xor, R32, R10),
    op(M6, 0xDC0, Cp, R54, Imm4),
    op(M8, 0xF00, Cp, R32, R10),
    op(M6, 0xD80, Fan, R54, Imm4),
    op(M8, 0xF10, Fan, R32, R10),
    // RLC repeats the register field in bits 3..2 and 1..0
    op(M8, 0xAF0, Rlc, R10, NONE),
    op(M8, 0xF60, Inc, Mem, NONE),
    op(M8, 0xF70, Dec, Mem, NONE),
    op(M10, 0xF28, Acpx, Ind(Reg::IX), R10),
    op(M10, 0xF2C, Acpy, Ind(Reg::IY), R10),
    op(M10, 0xF38, Scpx, Ind(Reg::IX), R10),
    op(M10, 0xF3C, Scpy, Ind(Reg::IY), R10),
];

/// First rule matching `w`, scanning the table in priority order.
pub fn find(w: Word) -> Option<(usize, &'static InstrDesc)> {
    TABLE.iter().enumerate().find(|(_, d)| d.matches(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_rules_win_over_coarse_ones() {
        assert_eq!(find(Word::new(0xEE0)).unwrap().1.mnemonic, Inc);
        assert_eq!(find(Word::new(0xEE1)).unwrap().1.mnemonic, Ldpx);
        assert_eq!(find(Word::new(0xD1F)).unwrap().1.mnemonic, Not);
        assert_eq!(find(Word::new(0xD1E)).unwrap().1.mnemonic, Xor);
        assert_eq!(find(Word::new(0xF41)).unwrap().1.mnemonic, Scf);
        assert_eq!(find(Word::new(0xF43)).unwrap().1.mnemonic, Set);
    }

    #[test]
    fn reserved_slots_have_no_rule() {
        for v in [0xED0u16, 0xF20, 0xF30, 0xE9C, 0xEAC, 0xEBC, 0xFCC, 0xFDC, 0xFE9, 0xFFA] {
            assert!(find(Word::new(v)).is_none(), "{v:#05x} should be reserved");
        }
    }
}
