//! Reconstruction of the bank/page state set by `PSET`.
//!
//! A branch only carries the low 8 bits of its target; the bank bit and page
//! nibble come from an earlier `PSET`. [`PageIndex`] holds every `PSET` found
//! in the image and answers "which one governs address X".
//!
//! The index assumes that at most one `PSET` is live on any control-flow path
//! reaching a given branch. It cannot detect violations of that assumption.

use crate::decoder::Mnemonic;
use crate::isa::e0c6s46::E0c6s46Decoder;
use crate::memory::Bus;
use crate::word::Word;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

pub const DEFAULT_BUCKET_SPAN: u32 = 256;

/// A `PSET` seen at `address` with its 5-bit operand (bank bit 4, page 3..0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRecord {
    pub address: u32,
    pub page_value: u8,
}

impl PageRecord {
    /// Returned when no `PSET` precedes the query address: bank 0, page 1.
    pub const DEFAULT: PageRecord = PageRecord { address: 0, page_value: 0x01 };

    pub fn new(address: u32, page_value: u8) -> Self {
        Self { address, page_value: page_value & 0x1F }
    }

    /// The bank/page an instruction at `address` runs in.
    pub fn at(address: u32) -> Self {
        let bank = ((address >> 12) & 1) as u8;
        let page = ((address >> 8) & 0xF) as u8;
        Self::new(address, (bank << 4) | page)
    }

    pub fn bank(&self) -> u8 {
        (self.page_value >> 4) & 1
    }

    pub fn page(&self) -> u8 {
        self.page_value & 0xF
    }
}

/// How the governing page state of a branch is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageResolution {
    /// The most recent `PSET` at or before the branch, anywhere in the image.
    #[default]
    MostRecent,
    /// Only a `PSET` in the word right before the branch counts; otherwise the
    /// branch stays in its own bank and page.
    Adjacent,
}

/// Records whose address falls in one `span`-wide window, sorted by address.
#[derive(Debug, Clone, Default)]
struct Bucket {
    records: Vec<PageRecord>,
}

impl Bucket {
    fn min(&self) -> Option<u32> {
        self.records.first().map(|r| r.address)
    }
}

/// Append-only, bucketed index of `PSET` records keyed by word address.
/// Only windows that hold a record get a bucket.
#[derive(Debug, Clone)]
pub struct PageIndex {
    span: u32,
    buckets: BTreeMap<u32, Bucket>,
    len: usize,
}

impl Default for PageIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PageIndex {
    pub fn new() -> Self {
        Self::with_span(DEFAULT_BUCKET_SPAN)
    }

    pub fn with_span(span: u32) -> Self {
        Self { span: span.max(1), buckets: BTreeMap::new(), len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bucket_of(&self, address: u32) -> u32 {
        address / self.span
    }

    /// Record a `PSET` at `address`. Returns false (and keeps the existing
    /// record) when the address is already known.
    pub fn insert(&mut self, address: u32, page_value: u8) -> bool {
        let key = self.bucket_of(address);
        let bucket = self.buckets.entry(key).or_default();
        let pos = match bucket.records.binary_search_by_key(&address, |r| r.address) {
            Ok(_) => return false,
            Err(pos) => pos,
        };
        let record = PageRecord::new(address, page_value);
        bucket.records.insert(pos, record);
        self.len += 1;
        trace!(address, page_value = record.page_value, "page record");
        true
    }

    /// The record with the greatest address `<= address`, if any.
    pub fn lookup(&self, address: u32) -> Option<PageRecord> {
        for bucket in self.buckets.range(..=self.bucket_of(address)).map(|(_, b)| b).rev() {
            if bucket.min().is_some_and(|min| min <= address) {
                let n = bucket.records.partition_point(|r| r.address <= address);
                return Some(bucket.records[n - 1]);
            }
        }
        None
    }

    /// Like [`lookup`](Self::lookup), falling back to [`PageRecord::DEFAULT`].
    pub fn query(&self, address: u32) -> PageRecord {
        self.lookup(address).unwrap_or(PageRecord::DEFAULT)
    }

    /// Page state governing a branch at `address` under `mode`.
    pub fn resolve(&self, address: u32, mode: PageResolution) -> PageRecord {
        match mode {
            PageResolution::MostRecent => self.query(address),
            PageResolution::Adjacent => match address.checked_sub(1).and_then(|prev| self.lookup(prev)) {
                Some(r) if r.address + 1 == address => r,
                _ => PageRecord::at(address),
            },
        }
    }

    /// All records in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.buckets.values().flat_map(|b| b.records.iter())
    }

    /// Linear pre-pass over `bus` below word `limit`, inserting every `PSET`
    /// it holds.
    pub fn scan<B: Bus>(bus: &B, dec: &E0c6s46Decoder, span: u32, limit: u32) -> Self {
        let mut index = Self::with_span(span);
        let words = bus.words();
        let (start, end) = (words.start, words.end.min(limit));
        for addr in start..end {
            let Some(bytes) = bus.read_word(addr) else { continue };
            let word = Word::new(u16::from_be_bytes(bytes));
            if let Some(desc) = dec.classify(word) {
                if desc.mnemonic == Mnemonic::Pset {
                    index.insert(addr, word.imm5());
                }
            }
        }
        debug!(start, end, records = index.len(), "PSET pre-pass complete");
        index
    }
}
