use crate::decoder::{BranchEdge, DecodeError, Decoded, Decoder, INSTR_LEN};
use crate::disasm::{tokens, Token};
use crate::isa::e0c6s46::E0c6s46Decoder;
use crate::lift::{Emitter, Lifter};
use crate::memory::Bus;
use crate::page::{PageIndex, PageResolution, DEFAULT_BUCKET_SPAN};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const NAME: &str = "E0C6S46";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchConfig {
    /// Word addresses per page index bucket.
    pub bucket_span: u32,
    /// Reset vector, word address.
    pub entry_point: u32,
    /// Size of program memory in words.
    pub rom_words: u32,
    pub page_resolution: PageResolution,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            bucket_span: DEFAULT_BUCKET_SPAN,
            entry_point: 0x100,
            rom_words: 0x1800,
            page_resolution: PageResolution::MostRecent,
        }
    }
}

impl ArchConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&txt).with_context(|| format!("parsing {}", path.display()))?;
        anyhow::ensure!(cfg.bucket_span > 0, "bucket_span must be non-zero");
        Ok(cfg)
    }
}

/// What a host needs to lay out control flow for one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionInfo {
    pub length: u32,
    pub branches: Vec<BranchEdge>,
}

/// The three per-instruction callbacks a host analysis drives, bound to one
/// image's page index. Addresses are word addresses.
pub struct Arch {
    cfg: ArchConfig,
    lifter: Lifter,
    pages: PageIndex,
}

impl Arch {
    /// An architecture with no page records yet (every query gets the default).
    pub fn new(cfg: ArchConfig) -> Self {
        let dec = E0c6s46Decoder::with_resolution(cfg.page_resolution);
        Self { cfg, lifter: Lifter::new(dec), pages: PageIndex::with_span(cfg.bucket_span) }
    }

    /// Build the architecture for an image, running the PSET pre-pass first.
    /// Words at or above `rom_words` are not scanned.
    pub fn with_image<B: Bus>(cfg: ArchConfig, bus: &B) -> Self {
        let mut arch = Self::new(cfg);
        arch.pages = PageIndex::scan(bus, arch.lifter.decoder(), cfg.bucket_span, cfg.rom_words);
        debug!(records = arch.pages.len(), "architecture ready");
        arch
    }

    pub fn config(&self) -> &ArchConfig {
        &self.cfg
    }

    pub fn pages(&self) -> &PageIndex {
        &self.pages
    }

    pub fn decoder(&self) -> &E0c6s46Decoder {
        self.lifter.decoder()
    }

    pub fn decode(&self, bytes: &[u8], addr: u32) -> Result<Decoded, DecodeError> {
        self.decoder().decode(bytes, addr, &self.pages)
    }

    pub fn instruction_info(&self, bytes: &[u8], addr: u32) -> Result<InstructionInfo, DecodeError> {
        let d = self.decode(bytes, addr)?;
        Ok(InstructionInfo { length: INSTR_LEN, branches: d.branches })
    }

    pub fn instruction_text(&self, bytes: &[u8], addr: u32) -> Result<(Vec<Token>, u32), DecodeError> {
        let d = self.decode(bytes, addr)?;
        Ok((tokens(&d), INSTR_LEN))
    }

    pub fn instruction_il<E: Emitter>(&self, bytes: &[u8], addr: u32, il: &mut E) -> Result<u32, DecodeError> {
        self.lifter.lift(bytes, addr, &self.pages, il)
    }
}
