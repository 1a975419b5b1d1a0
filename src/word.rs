use crate::decoder::DecodeError;
use serde::{Deserialize, Serialize};

// Field layout of a 12-bit instruction word:
//
//   B A 9 8 7 6 5 4 3 2 1 0
//  [opcode ]                  bits 11..8  (matched by mask)
//          [  low8         ]  bits 7..0  (step / 8-bit immediate)
//                  [lower  ]  bits 3..0
//              [r ]           bits 5..4  (field2(4))
//                  [r ]       bits 3..2  (field2(2))
//                      [q ]   bits 1..0  (field2(0))
//        [   imm5  ]          bits 4..0

/// One 12-bit instruction word, stored big-endian in a 2-byte container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word(u16);

impl Word {
    pub const MASK: u16 = 0x0FFF;

    pub fn new(value: u16) -> Self {
        Self(value & Self::MASK)
    }

    /// Build a word from raw instruction bytes.
    ///
    /// Only the last two bytes matter; a single byte is zero-extended on the
    /// high side. Empty input is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes {
            [] => Err(DecodeError::InvalidInput),
            [lo] => Ok(Self::new(*lo as u16)),
            [.., hi, lo] => Ok(Self::new(u16::from_be_bytes([*hi, *lo]))),
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn value(self) -> u16 {
        self.0
    }

    pub fn lower(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// middle‖lower: the step / 8-bit immediate field.
    pub fn low8(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Bottom five bits of the second byte (PSET operand).
    pub fn imm5(self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// Two-bit field starting at `shift`.
    pub fn field2(self, shift: u8) -> u8 {
        ((self.0 >> shift) & 0x3) as u8
    }

    pub fn matches(self, mask: u16, value: u16) -> bool {
        self.0 & mask == value
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03x}", self.0)
    }
}
