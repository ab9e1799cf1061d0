//! Hardware abstraction traits

/// A single-wire bus with open-drain signalling and a pull-up.
///
/// Implementations own the slot timing; everything above this trait only
/// deals in bits and bytes.
pub trait OneWireBus {
    /// Issue a reset pulse. Returns `true` if at least one device answered
    /// with a presence pulse.
    fn reset(&mut self) -> bool;

    /// Write a single time slot
    fn write_bit(&mut self, bit: bool);

    /// Read a single time slot. An idle bus reads as `true`.
    fn read_bit(&mut self) -> bool;

    /// Write a byte, least significant bit first
    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 != 0);
        }
    }

    /// Read a byte, least significant bit first
    fn read_byte(&mut self) -> u8 {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.read_byte();
        }
    }
}
