use e0c6s46_rs::il::{Expr, IlBuffer, Stmt};
use e0c6s46_rs::lift::{BinOp, CmpOp};
use e0c6s46_rs::regs::{Flags, Reg};
use e0c6s46_rs::{Emitter, Lifter, PageIndex, Word};
use pretty_assertions::assert_eq;

fn lift_at(word: u16, address: u32, pages: &PageIndex) -> IlBuffer {
    let mut il = IlBuffer::new();
    let n = Lifter::default().lift(&Word::new(word).to_bytes(), address, pages, &mut il).unwrap();
    assert_eq!(n, 2);
    il
}

fn lift(word: u16) -> Vec<String> {
    lift_at(word, 0x100, &PageIndex::new()).lines()
}

#[test]
fn pset_writes_bank_and_page() {
    let mut il = IlBuffer::new();
    let n = Lifter::default().lift(&[0x0E, 0x41], 0, &PageIndex::new(), &mut il).unwrap();
    assert_eq!(n, 2);
    assert_eq!(
        il.stmts,
        vec![
            Stmt::SetReg { reg: Reg::NBP, value: Expr::Const { size: 1, value: 0x0 } },
            Stmt::SetReg { reg: Reg::NPP, value: Expr::Const { size: 1, value: 0x1 } },
        ]
    );
    assert_eq!(lift(0xE5A), vec!["NBP = 0x1", "NPP = 0xa"]);
}

#[test]
fn unknown_emits_nothing() {
    assert!(lift(0xED0).is_empty());
    let mut il = IlBuffer::new();
    assert!(Lifter::default().lift(&[], 0, &PageIndex::new(), &mut il).is_err());
    assert!(il.stmts.is_empty());
}

#[test]
fn jump_composes_constant_target() {
    let mut pages = PageIndex::new();
    pages.insert(0x010, 0x01);
    let il = lift_at(0x023, 0x100, &pages);
    assert_eq!(il.stmts.len(), 1);
    let Stmt::Jump(target) = &il.stmts[0] else { panic!("expected jump, got {:?}", il.stmts) };
    assert_eq!(target.eval_const(), Some(0x123));
}

#[test]
fn conditional_jump_shape() {
    let mut pages = PageIndex::new();
    pages.insert(0x100, 0x01);
    let il = lift_at(0x604, 0x101, &pages);
    assert_eq!(
        il.lines(),
        vec![
            "if (Z == 0x1) then L0 else L1",
            "L0:",
            "jump((((0x0 << 0xc) | (0x1 << 0x8)) | 0x4))",
            "L1:",
        ]
    );
}

#[test]
fn calls_and_returns() {
    let calz = lift_at(0x512, 0x1100, &PageIndex::new());
    let Stmt::Call(t) = &calz.stmts[0] else { panic!("expected call") };
    assert_eq!(t.eval_const(), Some(0x1012));
    let mut pages = PageIndex::new();
    pages.insert(0x10, 0x05);
    let call = lift_at(0x420, 0x1001, &pages);
    let Stmt::Call(t) = &call.stmts[0] else { panic!("expected call") };
    assert_eq!(t.eval_const(), Some(0x1020));
    assert_eq!(lift(0xFDF), vec!["ret"]);
    assert_eq!(lift(0xFDE), vec!["ret"]);
    assert_eq!(lift(0x1A5), vec!["[IX] = 0x5", "[(IX + 0x1)] = 0xa", "X = (X + 0x2)", "ret"]);
}

#[test]
fn data_moves_and_arithmetic() {
    assert_eq!(lift(0xE05), vec!["A = 0x5"]);
    assert_eq!(lift(0xEC7), vec!["B = [IY]"]);
    assert_eq!(lift(0xF83), vec!["[0x3] = A"]);
    assert_eq!(lift(0xC13), vec!["B = (B + 0x3)"]);
    assert_eq!(lift(0xEE0), vec!["X = (X + 0x1)"]);
    assert_eq!(lift(0xE61), vec!["[IX] = 0x1", "X = (X + 0x1)"]);
    assert_eq!(lift(0xD0F), vec!["A = ~A"]);
}

#[test]
fn compare_sets_zero_and_carry() {
    assert_eq!(lift(0xDC7), vec!["Z = (A == 0x7)", "C = (A <u 0x7)"]);
    assert_eq!(lift(0xD81), vec!["Z = ((A & 0x1) == 0x0)"]);
}

#[test]
fn flag_aliases() {
    assert_eq!(lift(0xF41), vec!["C = 0x1"]);
    assert_eq!(lift(0xF5E), vec!["C = 0x0"]);
    assert_eq!(lift(0xF43), vec!["C = 0x1", "Z = 0x1"]);
    assert_eq!(lift(0xF57), vec!["I = 0x0"]);
}

#[test]
fn stack_ops_move_sp() {
    assert_eq!(lift(0xFC0), vec!["SP = (SP - 0x1)", "[SP] = A"]);
    assert_eq!(lift(0xFD1), vec!["B = [SP]", "SP = (SP + 0x1)"]);
}

/// Counts statements without building anything.
#[derive(Default)]
struct Counter {
    stmts: usize,
}

impl Emitter for Counter {
    type Expr = ();
    type Label = ();

    fn constant(&mut self, _: usize, _: u64) {}
    fn reg(&mut self, _: Reg) {}
    fn flag(&mut self, _: Flags) {}
    fn load(&mut self, _: usize, _: ()) {}
    fn binary(&mut self, _: BinOp, _: usize, _: (), _: ()) {}
    fn not(&mut self, _: usize, _: ()) {}
    fn compare(&mut self, _: CmpOp, _: usize, _: (), _: ()) {}
    fn set_reg(&mut self, _: Reg, _: ()) { self.stmts += 1 }
    fn set_flag(&mut self, _: Flags, _: ()) { self.stmts += 1 }
    fn store(&mut self, _: usize, _: (), _: ()) { self.stmts += 1 }
    fn new_label(&mut self) {}
    fn mark_label(&mut self, _: &()) { self.stmts += 1 }
    fn branch(&mut self, _: (), _: &(), _: &()) { self.stmts += 1 }
    fn jump(&mut self, _: ()) { self.stmts += 1 }
    fn call(&mut self, _: ()) { self.stmts += 1 }
    fn ret(&mut self) { self.stmts += 1 }
    fn nop(&mut self) { self.stmts += 1 }
}

#[test]
fn any_emitter_sees_the_same_statement_stream() {
    let lifter = Lifter::default();
    let pages = PageIndex::new();
    for v in 0..=0xFFFu16 {
        let bytes = Word::new(v).to_bytes();
        let mut buf = IlBuffer::new();
        let mut count = Counter::default();
        assert_eq!(lifter.lift(&bytes, 0x200, &pages, &mut buf), Ok(2));
        assert_eq!(lifter.lift(&bytes, 0x200, &pages, &mut count), Ok(2));
        assert_eq!(buf.stmts.len(), count.stmts, "{v:#05x}");
    }
}
