//! ROM search: enumerate every device sharing the bus
//!
//! Each pass walks the 64 ROM bits. At every bit all still-selected devices
//! answer with the bit and its complement; when both read 0 there is a
//! discrepancy, and the search takes the 0 branch first and remembers the
//! position so the next pass can take the 1 branch.

use heapless::Vec;

use crate::onewire::{Address, Error, SEARCH_ROM};
use crate::traits::OneWireBus;

const ROM_BITS: usize = 64;

#[derive(Debug, Default)]
pub struct DeviceSearch {
    rom: Address,
    last_discrepancy: usize,
    last_device: bool,
}

impl DeviceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    fn restart(&mut self) {
        *self = Self::default();
    }

    /// Find the next device. `Ok(None)` once every device has been returned.
    pub fn next<B: OneWireBus>(&mut self, bus: &mut B) -> Result<Option<Address>, Error> {
        if self.last_device {
            return Ok(None);
        }

        if !bus.reset() {
            self.restart();
            return Ok(None);
        }

        bus.write_byte(SEARCH_ROM);

        // Bit positions are 1-based so that 0 can mean "no discrepancy"
        let mut last_zero = 0;
        for bit_number in 1..=ROM_BITS {
            let id_bit = bus.read_bit();
            let cmp_id_bit = bus.read_bit();

            let direction = match (id_bit, cmp_id_bit) {
                (true, true) => {
                    self.restart();
                    return Err(Error::NoResponse);
                }
                (true, false) => true,
                (false, true) => false,
                (false, false) => {
                    let direction = if bit_number < self.last_discrepancy {
                        self.rom.bit(bit_number - 1)
                    } else {
                        bit_number == self.last_discrepancy
                    };
                    if !direction {
                        last_zero = bit_number;
                    }
                    direction
                }
            };

            self.rom.set_bit(bit_number - 1, direction);
            bus.write_bit(direction);
        }

        self.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.last_device = true;
        }

        // A line held low reads 0/0 on every bit, which passes the CRC
        if self.rom.family() == 0 {
            self.restart();
            return Err(Error::NoResponse);
        }

        if !self.rom.is_valid() {
            self.restart();
            return Err(Error::CrcMismatch);
        }

        Ok(Some(self.rom))
    }
}

/// Enumerate up to `N` devices on the bus
pub fn discover<B: OneWireBus, const N: usize>(bus: &mut B) -> Result<Vec<Address, N>, Error> {
    let mut found = Vec::new();
    let mut search = DeviceSearch::new();

    while let Some(address) = search.next(bus)? {
        if found.push(address).is_err() {
            break;
        }
    }

    Ok(found)
}
