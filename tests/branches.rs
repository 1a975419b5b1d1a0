use e0c6s46_rs::page::PageResolution;
use e0c6s46_rs::isa::e0c6s46::E0c6s46Decoder;
use e0c6s46_rs::{BranchEdge, BranchKind, Decoder, Mnemonic, Operand, PageIndex};
use pretty_assertions::assert_eq;

#[test]
fn jump_target_uses_governing_pset() {
    let mut pages = PageIndex::new();
    pages.insert(0x010, 0x01);
    let d = E0c6s46Decoder::new().decode(&[0x10, 0x23], 0x100, &pages).unwrap();
    assert_eq!(d.mnemonic, Mnemonic::Jp);
    assert_eq!(d.op1, Some(Operand::Address(0x23)));
    assert_eq!(d.branches, vec![BranchEdge::new(BranchKind::Unconditional, Some(0x123))]);
    assert_eq!(d.branches[0].byte_target(), Some(0x246));
}

#[test]
fn jump_without_pset_uses_default_page() {
    let pages = PageIndex::new();
    let d = E0c6s46Decoder::new().decode(&[0x00, 0x42], 0x500, &pages).unwrap();
    assert_eq!(d.target(), Some(0x142));
}

#[test]
fn bank_bit_selects_upper_half() {
    let mut pages = PageIndex::new();
    pages.insert(0x1200, 0x13); // bank 1, page 3
    let d = E0c6s46Decoder::new().decode(&[0x00, 0x07], 0x1201, &pages).unwrap();
    assert_eq!(d.target(), Some(0x1307));
}

#[test]
fn conditional_jump_has_true_and_false_edges() {
    let mut pages = PageIndex::new();
    pages.insert(0x200, 0x02);
    let d = E0c6s46Decoder::new().decode(&[0x02, 0x10], 0x201, &pages).unwrap(); // JP C,0x10
    assert_eq!(
        d.branches,
        vec![
            BranchEdge::new(BranchKind::True, Some(0x210)),
            BranchEdge::new(BranchKind::False, Some(0x202)),
        ]
    );
}

#[test]
fn call_stays_in_its_own_page() {
    let mut pages = PageIndex::new();
    pages.insert(0x10, 0x05);
    let d = E0c6s46Decoder::new().decode(&[0x04, 0x20], 0x1001, &pages).unwrap();
    assert_eq!(d.mnemonic, Mnemonic::Call);
    assert_eq!(d.branches, vec![BranchEdge::new(BranchKind::CallDestination, Some(0x1020))]);

    // Even a PSET in the same page does not redirect a CALL by default.
    pages.insert(0x1000, 0x05);
    let d = E0c6s46Decoder::new().decode(&[0x04, 0x20], 0x1001, &pages).unwrap();
    assert_eq!(d.target(), Some(0x1020));
}

#[test]
fn adjacent_pset_selects_call_page() {
    let mut pages = PageIndex::new();
    pages.insert(0x1000, 0x05);
    let dec = E0c6s46Decoder::with_resolution(PageResolution::Adjacent);
    assert_eq!(dec.decode(&[0x04, 0x20], 0x1001, &pages).unwrap().target(), Some(0x1520));
    assert_eq!(dec.decode(&[0x04, 0x20], 0x1002, &pages).unwrap().target(), Some(0x1020));
}

#[test]
fn calz_targets_page_zero() {
    let mut pages = PageIndex::new();
    pages.insert(0x100, 0x07);
    let d = E0c6s46Decoder::new().decode(&[0x05, 0x30], 0x101, &pages).unwrap();
    assert_eq!(d.mnemonic, Mnemonic::Calz);
    assert_eq!(d.target(), Some(0x030));
}

#[test]
fn returns_and_indirect_jumps() {
    let pages = PageIndex::new();
    let dec = E0c6s46Decoder::new();
    let ret = dec.decode(&[0x0F, 0xDF], 0, &pages).unwrap();
    assert_eq!(ret.branches, vec![BranchEdge::new(BranchKind::FunctionReturn, None)]);
    let rets = dec.decode(&[0x0F, 0xDE], 0, &pages).unwrap();
    assert_eq!(rets.mnemonic, Mnemonic::Rets);
    assert!(rets.comment.is_some());
    let retd = dec.decode(&[0x01, 0x55], 0, &pages).unwrap();
    assert_eq!(retd.op1, Some(Operand::Immediate(0x55)));
    assert_eq!(retd.branches[0].kind, BranchKind::FunctionReturn);
    let jpba = dec.decode(&[0x0F, 0xE8], 0, &pages).unwrap();
    assert_eq!(jpba.branches, vec![BranchEdge::new(BranchKind::Indirect, None)]);
}

#[test]
fn adjacent_resolution_ignores_distant_pset() {
    let mut pages = PageIndex::new();
    pages.insert(0x100, 0x03);
    let dec = E0c6s46Decoder::with_resolution(PageResolution::Adjacent);
    let near = dec.decode(&[0x00, 0x11], 0x101, &pages).unwrap();
    assert_eq!(near.target(), Some(0x311));
    let far = dec.decode(&[0x00, 0x11], 0x180, &pages).unwrap();
    assert_eq!(far.target(), Some(0x111));
}
