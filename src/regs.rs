use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Registers visible to the decoder and lifter, including the sub-register
/// views of the index registers and the stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg {
    A,
    B,
    IX,
    X,
    XP,
    XH,
    XL,
    IY,
    Y,
    YP,
    YH,
    YL,
    SP,
    SPH,
    SPL,
    NBP,
    NPP,
    F,
}

/// Where a register lives: its full-width parent and the bit offset/width
/// inside it. Full-width registers are their own parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegInfo {
    pub reg: Reg,
    pub parent: Reg,
    pub offset: u8,
    pub bits: u8,
}

const fn info(reg: Reg, parent: Reg, offset: u8, bits: u8) -> RegInfo {
    RegInfo { reg, parent, offset, bits }
}

//  IX: [XP . . .][XH . . .][XL . . .]
//                [X  . . . . . . . .]
pub const REGISTERS: &[RegInfo] = &[
    info(Reg::A, Reg::A, 0, 4),
    info(Reg::B, Reg::B, 0, 4),
    info(Reg::IX, Reg::IX, 0, 12),
    info(Reg::X, Reg::IX, 0, 8),
    info(Reg::XP, Reg::IX, 8, 4),
    info(Reg::XH, Reg::IX, 4, 4),
    info(Reg::XL, Reg::IX, 0, 4),
    info(Reg::IY, Reg::IY, 0, 12),
    info(Reg::Y, Reg::IY, 0, 8),
    info(Reg::YP, Reg::IY, 8, 4),
    info(Reg::YH, Reg::IY, 4, 4),
    info(Reg::YL, Reg::IY, 0, 4),
    info(Reg::SP, Reg::SP, 0, 8),
    info(Reg::SPH, Reg::SP, 4, 4),
    info(Reg::SPL, Reg::SP, 0, 4),
    info(Reg::NBP, Reg::NBP, 0, 1),
    info(Reg::NPP, Reg::NPP, 0, 4),
    info(Reg::F, Reg::F, 0, 4),
];

impl Reg {
    pub fn info(self) -> &'static RegInfo {
        // REGISTERS lists every variant in declaration order
        &REGISTERS[self as usize]
    }

    /// Width in storage units (one unit holds up to a byte).
    pub fn size(self) -> usize {
        (self.info().bits as usize).div_ceil(8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::A => "A",
            Reg::B => "B",
            Reg::IX => "IX",
            Reg::X => "X",
            Reg::XP => "XP",
            Reg::XH => "XH",
            Reg::XL => "XL",
            Reg::IY => "IY",
            Reg::Y => "Y",
            Reg::YP => "YP",
            Reg::YH => "YH",
            Reg::YL => "YL",
            Reg::SP => "SP",
            Reg::SPH => "SPH",
            Reg::SPL => "SPL",
            Reg::NBP => "NBP",
            Reg::NPP => "NPP",
            Reg::F => "F",
        }
    }

    /// Name used when the register is dereferenced as a memory pointer.
    pub fn indirect_name(self) -> &'static str {
        match self {
            Reg::IX => "MX",
            Reg::IY => "MY",
            Reg::SP => "MSP",
            other => other.name(),
        }
    }

    /// The 2-bit `r`/`q` operand selector: A, B, M(X), M(Y).
    pub fn from_selector(sel: u8) -> (Reg, bool) {
        match sel & 0x3 {
            0 => (Reg::A, false),
            1 => (Reg::B, false),
            2 => (Reg::IX, true),
            _ => (Reg::IY, true),
        }
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
/// Bits of the flag register F as addressed by SET/RST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags: u8 {
const C = 1 << 0; // Carry
const Z = 1 << 1; // Zero
const D = 1 << 2; // Decimal
const I = 1 << 3; // Interrupt enable
}
}

impl Flags {
    pub fn name(self) -> &'static str {
        match self {
            f if f == Flags::C => "C",
            f if f == Flags::Z => "Z",
            f if f == Flags::D => "D",
            f if f == Flags::I => "I",
            _ => "F",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_variant() {
        for (i, r) in REGISTERS.iter().enumerate() {
            assert_eq!(r.reg as usize, i, "{:?} out of order", r.reg);
        }
    }

    #[test]
    fn sub_registers_point_at_parents() {
        assert_eq!(Reg::XH.info().parent, Reg::IX);
        assert_eq!(Reg::XH.info().offset, 4);
        assert_eq!(Reg::YP.info().offset, 8);
        assert_eq!(Reg::SPL.info().parent, Reg::SP);
        assert_eq!(Reg::IX.size(), 2);
        assert_eq!(Reg::A.size(), 1);
    }

    #[test]
    fn selector_maps_memory_pointers() {
        assert_eq!(Reg::from_selector(0), (Reg::A, false));
        assert_eq!(Reg::from_selector(2), (Reg::IX, true));
        assert_eq!(Reg::from_selector(3), (Reg::IY, true));
    }
}
