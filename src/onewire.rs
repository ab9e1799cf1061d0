//! 1-Wire addressing, ROM commands and CRC

use core::fmt;

pub const SEARCH_ROM: u8 = 0xF0;
pub const MATCH_ROM: u8 = 0x55;
pub const SKIP_ROM: u8 = 0xCC;

pub const ADDRESS_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Nobody pulled the line low after a reset
    NoPresence,
    /// The bus read back as idle (all ones) or shorted (all zeros)
    NoResponse,
    CrcMismatch,
    UnsupportedFamily(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoPresence => write!(f, "no presence pulse"),
            Error::NoResponse => write!(f, "device did not respond"),
            Error::CrcMismatch => write!(f, "CRC mismatch"),
            Error::UnsupportedFamily(code) => write!(f, "unsupported family 0x{:02X}", code),
        }
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected)
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// 64-bit ROM code: family code, 48-bit serial, CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// The last byte must be the CRC of the first seven
    pub fn is_valid(&self) -> bool {
        crc8(&self.0[..ADDRESS_LEN - 1]) == self.0[ADDRESS_LEN - 1]
    }

    /// Bit `index` of the ROM code in wire order (LSB of byte 0 first)
    pub fn bit(&self, index: usize) -> bool {
        (self.0[index / 8] >> (index % 8)) & 0x01 != 0
    }

    pub(crate) fn set_bit(&mut self, index: usize, value: bool) {
        let mask = 1 << (index % 8);
        if value {
            self.0[index / 8] |= mask;
        } else {
            self.0[index / 8] &= !mask;
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
