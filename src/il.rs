//! A concrete [`Emitter`] that records lifted IL as a statement list.

use crate::lift::{BinOp, CmpOp, Emitter};
use crate::regs::{Flags, Reg};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    Const { size: usize, value: u64 },
    Reg(Reg),
    Flag(Flags),
    Load { size: usize, addr: Box<Expr> },
    Binary { op: BinOp, size: usize, lhs: Box<Expr>, rhs: Box<Expr> },
    Not { size: usize, value: Box<Expr> },
    Compare { op: CmpOp, size: usize, lhs: Box<Expr>, rhs: Box<Expr> },
}

fn mask(size: usize) -> u64 {
    if size >= 8 { u64::MAX } else { (1u64 << (size * 8)) - 1 }
}

impl Expr {
    /// Fold the expression when it only involves constants.
    pub fn eval_const(&self) -> Option<u64> {
        match self {
            Expr::Const { value, .. } => Some(*value),
            Expr::Binary { op, size, lhs, rhs } => {
                let (a, b) = (lhs.eval_const()?, rhs.eval_const()?);
                let v = match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::And => a & b,
                    BinOp::Or => a | b,
                    BinOp::Xor => a ^ b,
                    BinOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
                    BinOp::Rlc | BinOp::Rrc => return None,
                };
                Some(v & mask(*size))
            }
            Expr::Not { size, value } => Some(!value.eval_const()? & mask(*size)),
            Expr::Compare { op, lhs, rhs, .. } => {
                let (a, b) = (lhs.eval_const()?, rhs.eval_const()?);
                Some(match op {
                    CmpOp::Eq => (a == b) as u64,
                    CmpOp::Ult => (a < b) as u64,
                })
            }
            Expr::Reg(_) | Expr::Flag(_) | Expr::Load { .. } => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const { value, .. } => write!(f, "{value:#x}"),
            Expr::Reg(r) => write!(f, "{r}"),
            Expr::Flag(fl) => f.write_str(fl.name()),
            Expr::Load { addr, .. } => write!(f, "[{addr}]"),
            Expr::Binary { op, lhs, rhs, .. } => match op {
                BinOp::Rlc => write!(f, "rlc({lhs}, {rhs})"),
                BinOp::Rrc => write!(f, "rrc({lhs}, {rhs})"),
                _ => {
                    let sym = match op {
                        BinOp::Add => "+",
                        BinOp::Sub => "-",
                        BinOp::And => "&",
                        BinOp::Or => "|",
                        BinOp::Xor => "^",
                        _ => "<<",
                    };
                    write!(f, "({lhs} {sym} {rhs})")
                }
            },
            Expr::Not { value, .. } => write!(f, "~{value}"),
            Expr::Compare { op, lhs, rhs, .. } => match op {
                CmpOp::Eq => write!(f, "({lhs} == {rhs})"),
                CmpOp::Ult => write!(f, "({lhs} <u {rhs})"),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Label(pub usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Stmt {
    SetReg { reg: Reg, value: Expr },
    SetFlag { flag: Flags, value: Expr },
    Store { size: usize, addr: Expr, value: Expr },
    If { cond: Expr, t: Label, f: Label },
    Mark(Label),
    Jump(Expr),
    Call(Expr),
    Ret,
    Nop,
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::SetReg { reg, value } => write!(f, "{reg} = {value}"),
            Stmt::SetFlag { flag, value } => write!(f, "{} = {value}", flag.name()),
            Stmt::Store { addr, value, .. } => write!(f, "[{addr}] = {value}"),
            Stmt::If { cond, t, f: fl } => write!(f, "if {cond} then {t} else {fl}"),
            Stmt::Mark(l) => write!(f, "{l}:"),
            Stmt::Jump(e) => write!(f, "jump({e})"),
            Stmt::Call(e) => write!(f, "call({e})"),
            Stmt::Ret => f.write_str("ret"),
            Stmt::Nop => f.write_str("nop"),
        }
    }
}

/// Records every emitted statement in order.
#[derive(Debug, Default, Clone)]
pub struct IlBuffer {
    pub stmts: Vec<Stmt>,
    next_label: usize,
}

impl IlBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.stmts.clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.stmts.iter().map(|s| s.to_string()).collect()
    }
}

impl Emitter for IlBuffer {
    type Expr = Expr;
    type Label = Label;

    fn constant(&mut self, size: usize, value: u64) -> Expr {
        Expr::Const { size, value }
    }

    fn reg(&mut self, reg: Reg) -> Expr {
        Expr::Reg(reg)
    }

    fn flag(&mut self, flag: Flags) -> Expr {
        Expr::Flag(flag)
    }

    fn load(&mut self, size: usize, addr: Expr) -> Expr {
        Expr::Load { size, addr: Box::new(addr) }
    }

    fn binary(&mut self, op: BinOp, size: usize, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary { op, size, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    fn not(&mut self, size: usize, value: Expr) -> Expr {
        Expr::Not { size, value: Box::new(value) }
    }

    fn compare(&mut self, op: CmpOp, size: usize, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Compare { op, size, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    fn set_reg(&mut self, reg: Reg, value: Expr) {
        self.stmts.push(Stmt::SetReg { reg, value });
    }

    fn set_flag(&mut self, flag: Flags, value: Expr) {
        self.stmts.push(Stmt::SetFlag { flag, value });
    }

    fn store(&mut self, size: usize, addr: Expr, value: Expr) {
        self.stmts.push(Stmt::Store { size, addr, value });
    }

    fn new_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn mark_label(&mut self, label: &Label) {
        self.stmts.push(Stmt::Mark(*label));
    }

    fn branch(&mut self, cond: Expr, t: &Label, f: &Label) {
        self.stmts.push(Stmt::If { cond, t: *t, f: *f });
    }

    fn jump(&mut self, target: Expr) {
        self.stmts.push(Stmt::Jump(target));
    }

    fn call(&mut self, target: Expr) {
        self.stmts.push(Stmt::Call(target));
    }

    fn ret(&mut self) {
        self.stmts.push(Stmt::Ret);
    }

    fn nop(&mut self) {
        self.stmts.push(Stmt::Nop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_constant_target_composition() {
        let mut il = IlBuffer::new();
        let page = il.constant(2, 1);
        let eight = il.constant(1, 8);
        let high = il.binary(BinOp::Shl, 2, page, eight);
        let step = il.constant(2, 0x23);
        let t = il.binary(BinOp::Or, 2, high, step);
        assert_eq!(t.eval_const(), Some(0x123));
        assert_eq!(t.to_string(), "((0x1 << 0x8) | 0x23)");
    }

    #[test]
    fn registers_do_not_fold() {
        let mut il = IlBuffer::new();
        let a = il.reg(Reg::A);
        let one = il.constant(1, 1);
        assert_eq!(il.binary(BinOp::Add, 1, a, one).eval_const(), None);
    }

    #[test]
    fn labels_are_numbered_in_order() {
        let mut il = IlBuffer::new();
        let a = il.new_label();
        let b = il.new_label();
        let z = il.flag(Flags::Z);
        il.branch(z, &b, &a);
        il.mark_label(&a);
        assert_eq!(il.lines(), vec!["if Z then L1 else L0", "L0:"]);
    }
}
