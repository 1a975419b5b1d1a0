use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use serde::Serialize;
use tracing::debug;

use e0c6s46_rs::{Arch, BranchKind};

use crate::model::{Image, is_mapped, read_word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind { Fallthrough, Branch, CondBranch, Call }

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Fallthrough => "ft",
            EdgeKind::Branch => "br",
            EdgeKind::CondBranch => "cbr",
            EdgeKind::Call => "call",
        }
    }
}

/// Control-flow edge between word addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge { pub from: u32, pub to: u32, pub kind: EdgeKind }

/// Result of walking the image from a set of entry words.
#[derive(Debug, Default, Clone)]
pub struct Analysis {
    pub visited: BTreeSet<u32>,
    pub edges: Vec<Edge>,
    pub rets: HashSet<u32>,
    /// Jumps whose target is only known at run time (`JPBA`).
    pub indirect: HashSet<u32>,
    /// Undefined words reached on some path.
    pub unknown: HashSet<u32>,
}

impl Analysis {
    /// Whether execution cannot fall from `pc` into `pc + 1`.
    fn ends_flow(&self, pc: u32) -> bool {
        self.rets.contains(&pc)
            || self.indirect.contains(&pc)
            || self.unknown.contains(&pc)
            || self.edges.iter().any(|e| e.from == pc && e.kind == EdgeKind::Branch)
    }
}

pub fn analyze_entries(img: &Image, arch: &Arch, entries: &[u32], max_instr: usize) -> Analysis {
    let mut out = Analysis::default();
    let mut queue: VecDeque<u32> = entries.iter().copied().filter(|&e| is_mapped(img, e)).collect();
    let mut steps = 0usize;
    while let Some(pc) = queue.pop_front() {
        if steps >= max_instr { break; }
        if !out.visited.insert(pc) { continue; }
        let Some(bytes) = read_word(img, pc) else { continue };
        let Ok(d) = arch.decode(&bytes, pc) else { continue };
        steps += 1;
        if d.is_unknown() {
            out.unknown.insert(pc);
            continue;
        }
        let ft = pc.wrapping_add(1);
        let mut push = |out: &mut Analysis, to: u32, kind: EdgeKind| {
            out.edges.push(Edge { from: pc, to, kind });
            if is_mapped(img, to) && !out.visited.contains(&to) { queue.push_back(to); }
        };
        if d.branches.is_empty() {
            push(&mut out, ft, EdgeKind::Fallthrough);
            continue;
        }
        for b in &d.branches {
            match (b.kind, b.target) {
                (BranchKind::Unconditional, Some(t)) => push(&mut out, t, EdgeKind::Branch),
                (BranchKind::True, Some(t)) => push(&mut out, t, EdgeKind::CondBranch),
                (BranchKind::False, Some(t)) => push(&mut out, t, EdgeKind::Fallthrough),
                (BranchKind::CallDestination, Some(t)) => {
                    push(&mut out, t, EdgeKind::Call);
                    push(&mut out, ft, EdgeKind::Fallthrough);
                }
                (BranchKind::FunctionReturn, _) => { out.rets.insert(pc); }
                _ => { out.indirect.insert(pc); }
            }
        }
    }
    debug!(insts = out.visited.len(), edges = out.edges.len(), "analysis finished");
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block { pub start: u32, pub end: u32 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeOut { pub from: u32, pub to: u32, pub kind: String }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionOut { pub entry: u32, pub blocks: Vec<u32> }

/// Block-level view of an [`Analysis`]. All addresses are host byte addresses.
#[derive(Debug, Clone, Serialize)]
pub struct Report<Blk=Block> {
    pub entries: Vec<u32>,
    pub blocks: Vec<Blk>,
    pub edges: Vec<EdgeOut>,
    pub functions: Vec<FunctionOut>,
}

pub fn build_report(an: &Analysis, seeds: &[u32]) -> Report {
    // Block starts: entries plus every edge destination that is not plain fallthrough.
    let mut starts: BTreeSet<u32> = seeds.iter().copied().collect();
    for e in an.edges.iter().filter(|e| e.kind != EdgeKind::Fallthrough) {
        starts.insert(e.to);
    }
    for e in an.edges.iter().filter(|e| e.kind == EdgeKind::CondBranch) {
        starts.insert(e.from.wrapping_add(1));
    }
    for &pc in &an.rets { starts.insert(pc.wrapping_add(1)); }

    let mut blocks: Vec<Block> = Vec::new();
    let mut addr_to_block: HashMap<u32, u32> = HashMap::new();
    for &start in &starts {
        if !an.visited.contains(&start) || addr_to_block.contains_key(&start) { continue; }
        let mut cur = start;
        loop {
            addr_to_block.insert(cur, start);
            let next = cur.wrapping_add(1);
            let should_end = an.ends_flow(cur)
                || an.edges.iter().any(|e| e.from == cur && e.kind == EdgeKind::CondBranch)
                || !an.visited.contains(&next)
                || starts.contains(&next);
            if should_end {
                blocks.push(Block { start, end: next });
                break;
            }
            cur = next;
        }
    }

    let mut edges_out: Vec<EdgeOut> = Vec::new();
    let mut seen_edges: HashSet<(u32, u32, EdgeKind)> = HashSet::new();
    for e in &an.edges {
        let from_block = *addr_to_block.get(&e.from).unwrap_or(&e.from);
        // Straight-line fallthrough inside a block is not an edge.
        if e.kind == EdgeKind::Fallthrough && addr_to_block.get(&e.to) == Some(&from_block) { continue; }
        if seen_edges.insert((from_block, e.to, e.kind)) {
            edges_out.push(EdgeOut { from: from_block, to: e.to, kind: e.kind.as_str().to_string() });
        }
    }

    // Functions: entries and call targets; calls do not extend the caller's body.
    let mut adj: HashMap<u32, Vec<u32>> = HashMap::new();
    for e in &edges_out {
        if e.kind != EdgeKind::Call.as_str() { adj.entry(e.from).or_default().push(e.to); }
    }
    let mut roots: BTreeSet<u32> = seeds.iter().copied().collect();
    for e in an.edges.iter().filter(|e| e.kind == EdgeKind::Call) {
        if an.visited.contains(&e.to) { roots.insert(e.to); }
    }
    let mut functions: Vec<FunctionOut> = Vec::new();
    for &entry in &roots {
        let mut seen: BTreeSet<u32> = BTreeSet::new();
        let mut q = VecDeque::from([entry]);
        while let Some(b) = q.pop_front() {
            if !seen.insert(b) { continue; }
            if let Some(nexts) = adj.get(&b) { q.extend(nexts.iter().copied()); }
        }
        functions.push(FunctionOut { entry: entry * 2, blocks: seen.into_iter().map(|b| b * 2).collect() });
    }

    Report {
        entries: seeds.iter().map(|s| s * 2).collect(),
        blocks: blocks.into_iter().map(|b| Block { start: b.start * 2, end: b.end * 2 }).collect(),
        edges: edges_out.into_iter().map(|e| EdgeOut { from: e.from * 2, to: e.to * 2, kind: e.kind }).collect(),
        functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Image, Segment};
    use e0c6s46_rs::ArchConfig;
    use pretty_assertions::assert_eq;

    fn image(words: &[u16]) -> Image {
        let bytes = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        Image { segments: vec![Segment { name: "rom".into(), base: 0x100, bytes, perms: "r-x", kind: "raw" }] }
    }

    #[test]
    fn uncond_jump_edges_and_blocking() {
        // 0x100: PSET 0x01 ; 0x101: JP 0x04 ; 0x102: NOP5 (dead) ; 0x103: NOP5 ; 0x104: RET
        let img = image(&[0xE41, 0x004, 0xFFB, 0xFFB, 0xFDF]);
        let arch = Arch::with_image(ArchConfig::default(), &img);
        let an = analyze_entries(&img, &arch, &[0x100], 100);
        assert!(an.edges.contains(&Edge { from: 0x101, to: 0x104, kind: EdgeKind::Branch }));
        assert!(!an.visited.contains(&0x102));
        assert!(an.rets.contains(&0x104));

        let report = build_report(&an, &[0x100]);
        assert_eq!(report.blocks, vec![Block { start: 0x200, end: 0x204 }, Block { start: 0x208, end: 0x20A }]);
        assert_eq!(report.edges, vec![EdgeOut { from: 0x200, to: 0x208, kind: "br".into() }]);
        assert_eq!(report.functions, vec![FunctionOut { entry: 0x200, blocks: vec![0x200, 0x208] }]);
    }

    #[test]
    fn conditional_jump_splits_block() {
        // 0x100: PSET 0x01 ; 0x101: JP Z,0x04 ; 0x102: NOP5 ; 0x103: NOP5 ; 0x104: RET
        let img = image(&[0xE41, 0x604, 0xFFB, 0xFFB, 0xFDF]);
        let arch = Arch::with_image(ArchConfig::default(), &img);
        let an = analyze_entries(&img, &arch, &[0x100], 100);
        assert!(an.edges.contains(&Edge { from: 0x101, to: 0x104, kind: EdgeKind::CondBranch }));
        assert!(an.edges.contains(&Edge { from: 0x101, to: 0x102, kind: EdgeKind::Fallthrough }));

        let report = build_report(&an, &[0x100]);
        let starts: Vec<u32> = report.blocks.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0x200, 0x204, 0x208]);
    }

    #[test]
    fn calls_become_functions_and_unknown_stops() {
        // 0x100: CALZ 0x05 ; 0x101: (reserved) ; ... page 0 is outside the image
        let img = image(&[0x505, 0xED0]);
        let arch = Arch::with_image(ArchConfig::default(), &img);
        let an = analyze_entries(&img, &arch, &[0x100], 100);
        assert!(an.edges.contains(&Edge { from: 0x100, to: 0x005, kind: EdgeKind::Call }));
        assert!(an.unknown.contains(&0x101));
        assert!(!an.visited.contains(&0x005));
        let report = build_report(&an, &[0x100]);
        assert_eq!(report.functions.len(), 1);
    }

    #[test]
    fn max_instr_bounds_the_walk() {
        let img = image(&[0xFFB; 16]);
        let arch = Arch::with_image(ArchConfig::default(), &img);
        let an = analyze_entries(&img, &arch, &[0x100], 4);
        assert_eq!(an.visited.len(), 4);
    }
}
