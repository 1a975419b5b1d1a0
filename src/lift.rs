use crate::decoder::{Condition, DecodeError, Decoded, Decoder, Mnemonic, Operand, INSTR_LEN};
use crate::instructions::Flow;
use crate::isa::e0c6s46::{BranchTarget, E0c6s46Decoder};
use crate::page::PageIndex;
use crate::regs::{Flags, Reg};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    /// Rotate left through carry.
    Rlc,
    /// Rotate right through carry.
    Rrc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ult,
}

/// Sink for lifted operations. Expression methods build values; the other
/// methods append statements in call order.
pub trait Emitter {
    type Expr: Clone;
    type Label;

    fn constant(&mut self, size: usize, value: u64) -> Self::Expr;
    fn reg(&mut self, reg: Reg) -> Self::Expr;
    fn flag(&mut self, flag: Flags) -> Self::Expr;
    fn load(&mut self, size: usize, addr: Self::Expr) -> Self::Expr;
    fn binary(&mut self, op: BinOp, size: usize, lhs: Self::Expr, rhs: Self::Expr) -> Self::Expr;
    fn not(&mut self, size: usize, value: Self::Expr) -> Self::Expr;
    fn compare(&mut self, op: CmpOp, size: usize, lhs: Self::Expr, rhs: Self::Expr) -> Self::Expr;

    fn set_reg(&mut self, reg: Reg, value: Self::Expr);
    fn set_flag(&mut self, flag: Flags, value: Self::Expr);
    fn store(&mut self, size: usize, addr: Self::Expr, value: Self::Expr);
    fn new_label(&mut self) -> Self::Label;
    fn mark_label(&mut self, label: &Self::Label);
    /// Two-way conditional branch to labels in this instruction.
    fn branch(&mut self, cond: Self::Expr, t: &Self::Label, f: &Self::Label);
    fn jump(&mut self, target: Self::Expr);
    fn call(&mut self, target: Self::Expr);
    fn ret(&mut self);
    fn nop(&mut self);
}

/// Translates decoded instructions into [`Emitter`] calls.
///
/// Lifting is reentrant: the only shared state is the page index, which is
/// borrowed read-only.
#[derive(Default)]
pub struct Lifter {
    dec: E0c6s46Decoder,
}

impl Lifter {
    pub fn new(dec: E0c6s46Decoder) -> Self {
        Self { dec }
    }

    pub fn decoder(&self) -> &E0c6s46Decoder {
        &self.dec
    }

    /// Decode and lift one instruction. Always consumes two bytes.
    pub fn lift<E: Emitter>(&self, bytes: &[u8], address: u32, pages: &PageIndex, il: &mut E) -> Result<u32, DecodeError> {
        let d = self.dec.decode(bytes, address, pages)?;
        self.lift_decoded(&d, pages, il);
        Ok(INSTR_LEN)
    }

    pub fn lift_decoded<E: Emitter>(&self, d: &Decoded, pages: &PageIndex, il: &mut E) {
        let Some(desc) = self.dec.classify(d.word) else { return };
        let imm = match (d.op1, d.op2) {
            (Some(Operand::Immediate(v)), _) | (_, Some(Operand::Immediate(v))) => v as u64,
            _ => 0,
        };

        use Mnemonic::*;
        match d.mnemonic {
            Pset => {
                let bank = il.constant(1, imm >> 4);
                il.set_reg(Reg::NBP, bank);
                let page = il.constant(1, imm & 0xF);
                il.set_reg(Reg::NPP, page);
            }
            Jp | Call | Calz => {
                let Some(t) = self.dec.branch_target(desc, d.word, d.address, pages) else { return };
                let target = target_expr(il, t);
                match (desc.flow, desc.condition()) {
                    (Flow::CondJump, Some(c)) => {
                        let cond = condition(il, c);
                        let taken = il.new_label();
                        let fall = il.new_label();
                        il.branch(cond, &taken, &fall);
                        il.mark_label(&taken);
                        il.jump(target);
                        il.mark_label(&fall);
                    }
                    (Flow::Call | Flow::CallZero, _) => il.call(target),
                    _ => il.jump(target),
                }
            }
            Jpba => {
                // NBP:NPP:B:A
                let parts = [(Reg::NBP, 12), (Reg::NPP, 8), (Reg::B, 4), (Reg::A, 0)];
                let mut acc = il.constant(2, 0);
                for (r, shift) in parts {
                    let v = il.reg(r);
                    let amount = il.constant(1, shift);
                    let shifted = il.binary(BinOp::Shl, 2, v, amount);
                    acc = il.binary(BinOp::Or, 2, acc, shifted);
                }
                il.jump(acc);
            }
            Ret | Rets => il.ret(),
            Retd => {
                store_pair(il, Reg::IX, imm);
                post_increment(il, Reg::X, 2);
                il.ret();
            }
            Nop5 | Nop7 | Halt | Slp => il.nop(),
            Inc | Dec => {
                let Some(dst) = d.op1 else { return };
                let op = if d.mnemonic == Inc { BinOp::Add } else { BinOp::Sub };
                let size = operand_size(dst);
                let cur = read(il, dst);
                let one = il.constant(size, 1);
                let v = il.binary(op, size, cur, one);
                write(il, dst, v);
            }
            Ld => {
                let (Some(dst), Some(src)) = (d.op1, d.op2) else { return };
                let v = read(il, src);
                write(il, dst, v);
            }
            Ldpx | Ldpy => {
                let (Some(dst), Some(src)) = (d.op1, d.op2) else { return };
                let v = read(il, src);
                write(il, dst, v);
                let index = if d.mnemonic == Ldpx { Reg::X } else { Reg::Y };
                post_increment(il, index, 1);
            }
            Lbpx => {
                store_pair(il, Reg::IX, imm);
                post_increment(il, Reg::X, 2);
            }
            Add | Sub | And | Or | Xor => {
                let (Some(dst), Some(src)) = (d.op1, d.op2) else { return };
                let op = match d.mnemonic {
                    Add => BinOp::Add,
                    Sub => BinOp::Sub,
                    And => BinOp::And,
                    Or => BinOp::Or,
                    _ => BinOp::Xor,
                };
                let lhs = read(il, dst);
                let rhs = read(il, src);
                let v = il.binary(op, 1, lhs, rhs);
                write(il, dst, v);
            }
            Adc | Sbc | Acpx | Acpy | Scpx | Scpy => {
                let (Some(dst), Some(src)) = (d.op1, d.op2) else { return };
                let op = match d.mnemonic {
                    Adc | Acpx | Acpy => BinOp::Add,
                    _ => BinOp::Sub,
                };
                let lhs = read(il, dst);
                let rhs = read(il, src);
                let partial = il.binary(op, 1, lhs, rhs);
                let carry = il.flag(Flags::C);
                let v = il.binary(op, 1, partial, carry);
                write(il, dst, v);
                match d.mnemonic {
                    Acpx | Scpx => post_increment(il, Reg::X, 1),
                    Acpy | Scpy => post_increment(il, Reg::Y, 1),
                    _ => {}
                }
            }
            Cp => {
                let (Some(lhs), Some(rhs)) = (d.op1, d.op2) else { return };
                let a = read(il, lhs);
                let b = read(il, rhs);
                let z = il.compare(CmpOp::Eq, 1, a.clone(), b.clone());
                il.set_flag(Flags::Z, z);
                let c = il.compare(CmpOp::Ult, 1, a, b);
                il.set_flag(Flags::C, c);
            }
            Fan => {
                let (Some(lhs), Some(rhs)) = (d.op1, d.op2) else { return };
                let a = read(il, lhs);
                let b = read(il, rhs);
                let masked = il.binary(BinOp::And, 1, a, b);
                let zero = il.constant(1, 0);
                let z = il.compare(CmpOp::Eq, 1, masked, zero);
                il.set_flag(Flags::Z, z);
            }
            Rlc | Rrc => {
                let Some(dst) = d.op1 else { return };
                let op = if d.mnemonic == Rlc { BinOp::Rlc } else { BinOp::Rrc };
                let cur = read(il, dst);
                let one = il.constant(1, 1);
                let v = il.binary(op, 1, cur, one);
                write(il, dst, v);
            }
            Not => {
                let Some(dst) = d.op1 else { return };
                let cur = read(il, dst);
                let v = il.not(1, cur);
                write(il, dst, v);
            }
            // SET F,i and its aliases OR the mask in; RST F,i and its aliases AND it.
            Set | Scf | Szf | Sdf | Ei => {
                for f in Flags::from_bits_truncate(d.word.lower()).iter() {
                    let one = il.constant(1, 1);
                    il.set_flag(f, one);
                }
            }
            Rst | Rcf | Rzf | Rdf | Di => {
                let cleared = Flags::all() - Flags::from_bits_truncate(d.word.lower());
                for f in cleared.iter() {
                    let zero = il.constant(1, 0);
                    il.set_flag(f, zero);
                }
            }
            Push => {
                let Some(src) = d.op1 else { return };
                let v = read(il, src);
                step_sp(il, BinOp::Sub);
                let sp = il.reg(Reg::SP);
                il.store(1, sp, v);
            }
            Pop => {
                let Some(dst) = d.op1 else { return };
                let sp = il.reg(Reg::SP);
                let v = il.load(1, sp);
                write(il, dst, v);
                step_sp(il, BinOp::Add);
            }
            Unknown => {}
        }
    }
}

fn target_expr<E: Emitter>(il: &mut E, t: BranchTarget) -> E::Expr {
    let bank = il.constant(2, t.bank as u64);
    let s12 = il.constant(1, 12);
    let bank = il.binary(BinOp::Shl, 2, bank, s12);
    let page = il.constant(2, t.page as u64);
    let s8 = il.constant(1, 8);
    let page = il.binary(BinOp::Shl, 2, page, s8);
    let high = il.binary(BinOp::Or, 2, bank, page);
    let step = il.constant(2, t.step as u64);
    il.binary(BinOp::Or, 2, high, step)
}

fn condition<E: Emitter>(il: &mut E, c: Condition) -> E::Expr {
    let (flag, want) = match c {
        Condition::C => (Flags::C, 1),
        Condition::NC => (Flags::C, 0),
        Condition::Z => (Flags::Z, 1),
        Condition::NZ => (Flags::Z, 0),
    };
    let f = il.flag(flag);
    let v = il.constant(1, want);
    il.compare(CmpOp::Eq, 1, f, v)
}

fn operand_size(op: Operand) -> usize {
    match op {
        Operand::Register(r) => r.size(),
        Operand::Address(_) => 2,
        _ => 1,
    }
}

fn read<E: Emitter>(il: &mut E, op: Operand) -> E::Expr {
    match op {
        Operand::Register(Reg::F) => flag_register(il),
        Operand::Register(r) => il.reg(r),
        Operand::RegisterIndirect(r) => {
            let addr = il.reg(r);
            il.load(1, addr)
        }
        Operand::Memory(n) => {
            let addr = il.constant(2, n as u64);
            il.load(1, addr)
        }
        Operand::Immediate(v) => il.constant(1, v as u64),
        Operand::Address(v) => il.constant(2, v as u64),
        Operand::Condition(c) => condition(il, c),
    }
}

fn write<E: Emitter>(il: &mut E, op: Operand, value: E::Expr) {
    match op {
        Operand::Register(Reg::F) => {
            for f in Flags::all().iter() {
                let bit = il.constant(1, f.bits() as u64);
                let masked = il.binary(BinOp::And, 1, value.clone(), bit.clone());
                let set = il.compare(CmpOp::Eq, 1, masked, bit);
                il.set_flag(f, set);
            }
        }
        Operand::Register(r) => il.set_reg(r, value),
        Operand::RegisterIndirect(r) => {
            let addr = il.reg(r);
            il.store(1, addr, value);
        }
        Operand::Memory(n) => {
            let addr = il.constant(2, n as u64);
            il.store(1, addr, value);
        }
        Operand::Immediate(_) | Operand::Address(_) | Operand::Condition(_) => {}
    }
}

/// F assembled from its flag bits (I:D:Z:C).
fn flag_register<E: Emitter>(il: &mut E) -> E::Expr {
    let mut acc = il.constant(1, 0);
    for (i, f) in Flags::all().iter().enumerate() {
        let v = il.flag(f);
        let amount = il.constant(1, i as u64);
        let shifted = il.binary(BinOp::Shl, 1, v, amount);
        acc = il.binary(BinOp::Or, 1, acc, shifted);
    }
    acc
}

/// Low nibble of `value` to M(ptr), high nibble to M(ptr+1).
fn store_pair<E: Emitter>(il: &mut E, ptr: Reg, value: u64) {
    let addr = il.reg(ptr);
    let lo = il.constant(1, value & 0xF);
    il.store(1, addr, lo);
    let base = il.reg(ptr);
    let one = il.constant(2, 1);
    let addr = il.binary(BinOp::Add, 2, base, one);
    let hi = il.constant(1, (value >> 4) & 0xF);
    il.store(1, addr, hi);
}

fn post_increment<E: Emitter>(il: &mut E, index: Reg, by: u64) {
    let cur = il.reg(index);
    let amount = il.constant(1, by);
    let v = il.binary(BinOp::Add, 1, cur, amount);
    il.set_reg(index, v);
}

fn step_sp<E: Emitter>(il: &mut E, op: BinOp) {
    let sp = il.reg(Reg::SP);
    let one = il.constant(1, 1);
    let v = il.binary(op, 1, sp, one);
    il.set_reg(Reg::SP, v);
}
