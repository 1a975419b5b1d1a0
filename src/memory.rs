use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Words addressable by a 13-bit program counter (bank bit plus 12 bits).
pub const ADDRESS_WORDS: u32 = 0x2000;

/// Word-addressed program memory. Each word is two bytes, big-endian, with
/// the instruction in the low 12 bits.
pub trait Bus {
    fn read_word(&self, addr: u32) -> Option<[u8; 2]>;
    /// Word addresses backed by this bus.
    fn words(&self) -> Range<u32>;
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    /// Word address of `mem[0..2]`.
    pub base: u32,
}

impl LinearMemory {
    pub fn new(words: usize) -> Self {
        Self {
            mem: vec![0; words * 2],
            base: 0,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, base: u32) -> Self {
        Self { mem: bytes, base }
    }

    /// Store a 12-bit word, growing the buffer as needed.
    pub fn write_word(&mut self, addr: u32, value: u16) -> Result<()> {
        anyhow::ensure!(addr < ADDRESS_WORDS, "word address {addr:#x} outside program space");
        let Some(rel) = addr.checked_sub(self.base) else {
            anyhow::bail!("word address {addr:#x} below base {:#x}", self.base);
        };
        let off = rel as usize * 2;
        if self.mem.len() < off + 2 {
            self.mem.resize(off + 2, 0);
        }
        self.mem[off..off + 2].copy_from_slice(&(value & 0x0FFF).to_be_bytes());
        Ok(())
    }
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("base", &self.base)
            .field("words", &(self.mem.len() / 2))
            .finish()
    }
}

impl Bus for LinearMemory {
    fn read_word(&self, addr: u32) -> Option<[u8; 2]> {
        let off = (addr.checked_sub(self.base)? as usize).checked_mul(2)?;
        let bytes = self.mem.get(off..off + 2)?;
        Some([bytes[0], bytes[1]])
    }

    fn words(&self) -> Range<u32> {
        self.base..self.base + (self.mem.len() / 2) as u32
    }
}
