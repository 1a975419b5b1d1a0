pub mod arch;
pub mod decoder;
pub mod disasm;
pub mod il;
pub mod instructions;
pub mod lift;
pub mod memory;
pub mod page;
pub mod regs;
pub mod word;

pub mod isa {
    pub mod e0c6s46; // Epson E0C6200 core as found in the E0C6S46
}

pub use arch::{Arch, ArchConfig};
pub use decoder::{BranchEdge, BranchKind, DecodeError, Decoded, Decoder, Mnemonic, Operand};
pub use lift::{Emitter, Lifter};
pub use memory::{Bus, LinearMemory};
pub use page::{PageIndex, PageRecord};
pub use word::Word;
