use crate::decoder::{BranchEdge, BranchKind, DecodeError, Decoded, Decoder};
use crate::instructions::{Flow, InstrDesc, TABLE};
use crate::page::{PageIndex, PageRecord, PageResolution};
use crate::word::Word;
use tracing::trace;

const SLOTS: usize = 1 << 12;

/// Absolute branch target split into its three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    pub bank: u8,
    pub page: u8,
    pub step: u8,
}

impl BranchTarget {
    /// `(bank << 12) | (page << 8) | step`, in words.
    pub fn word_address(self) -> u32 {
        ((self.bank as u32 & 1) << 12) | ((self.page as u32 & 0xF) << 8) | self.step as u32
    }
}

/// E0C6S46 decoder. The ordered rule table is compiled into one slot per
/// 12-bit value at construction, so decoding is a single lookup.
pub struct E0c6s46Decoder {
    slots: Box<[Option<u16>]>,
    resolution: PageResolution,
}

impl Default for E0c6s46Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl E0c6s46Decoder {
    pub fn new() -> Self {
        Self::with_resolution(PageResolution::default())
    }

    pub fn with_resolution(resolution: PageResolution) -> Self {
        let mut slots = vec![None; SLOTS].into_boxed_slice();
        for (value, slot) in slots.iter_mut().enumerate() {
            let w = Word::new(value as u16);
            *slot = TABLE.iter().position(|d| d.matches(w)).map(|i| i as u16);
        }
        Self { slots, resolution }
    }

    /// The rule that owns `word`, if any.
    pub fn classify(&self, word: Word) -> Option<&'static InstrDesc> {
        self.slots[word.value() as usize].map(|i| &TABLE[i as usize])
    }

    /// Resolve the static target of a branch or call at `address`.
    pub fn branch_target(&self, desc: &InstrDesc, word: Word, address: u32, pages: &PageIndex) -> Option<BranchTarget> {
        let step = word.low8();
        let own_bank = ((address >> 12) & 1) as u8;
        match desc.flow {
            Flow::Jump | Flow::CondJump => {
                let rec = pages.resolve(address, self.resolution);
                Some(BranchTarget { bank: rec.bank(), page: rec.page(), step })
            }
            // CALL runs in its own bank and page unless a PSET sits right before it.
            Flow::Call => {
                let rec = match self.resolution {
                    PageResolution::MostRecent => PageRecord::at(address),
                    PageResolution::Adjacent => pages.resolve(address, PageResolution::Adjacent),
                };
                Some(BranchTarget { bank: own_bank, page: rec.page(), step })
            }
            Flow::CallZero => Some(BranchTarget { bank: own_bank, page: 0, step }),
            _ => None,
        }
    }
}

impl Decoder for E0c6s46Decoder {
    fn decode(&self, bytes: &[u8], address: u32, pages: &PageIndex) -> Result<Decoded, DecodeError> {
        let word = Word::from_bytes(bytes)?;
        let Some(desc) = self.classify(word) else {
            trace!(address, word = word.value(), "undefined opcode");
            return Ok(Decoded::unknown(word, address));
        };

        let target = self.branch_target(desc, word, address, pages).map(BranchTarget::word_address);
        let mut branches = Vec::new();
        let mut comment = None;
        match desc.flow {
            Flow::Next => {}
            Flow::Jump => branches.push(BranchEdge::new(BranchKind::Unconditional, target)),
            Flow::CondJump => {
                branches.push(BranchEdge::new(BranchKind::True, target));
                branches.push(BranchEdge::new(BranchKind::False, Some(address.wrapping_add(1))));
            }
            Flow::Call | Flow::CallZero => branches.push(BranchEdge::new(BranchKind::CallDestination, target)),
            Flow::Return => branches.push(BranchEdge::new(BranchKind::FunctionReturn, None)),
            Flow::ReturnSkip => {
                branches.push(BranchEdge::new(BranchKind::FunctionReturn, None));
                comment = Some("skips the instruction after the call on return");
            }
            Flow::JumpIndirect => branches.push(BranchEdge::new(BranchKind::Indirect, None)),
        }

        Ok(Decoded {
            word,
            address,
            mnemonic: desc.mnemonic,
            op1: desc.op1.extract(word),
            op2: desc.op2.extract(word),
            branches,
            comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_owns_at_least_one_slot() {
        let dec = E0c6s46Decoder::new();
        let mut owned = vec![false; TABLE.len()];
        for i in dec.slots.iter().flatten() {
            owned[*i as usize] = true;
        }
        let shadowed: Vec<usize> = owned.iter().enumerate().filter_map(|(i, hit)| (!hit).then_some(i)).collect();
        assert!(shadowed.is_empty(), "shadowed: {shadowed:?}");
    }

    #[test]
    fn compiled_table_agrees_with_linear_scan() {
        let dec = E0c6s46Decoder::new();
        for v in 0..SLOTS as u16 {
            let w = Word::new(v);
            let linear = crate::instructions::find(w).map(|(i, _)| i);
            let compiled = dec.slots[v as usize].map(|i| i as usize);
            assert_eq!(linear, compiled, "{v:#05x}");
        }
    }

    #[test]
    fn most_of_the_map_is_defined() {
        let dec = E0c6s46Decoder::new();
        let undefined = dec.slots.iter().filter(|s| s.is_none()).count();
        assert!(undefined > 0 && undefined < 256, "undefined = {undefined}");
    }
}
