//! DS18B20 / DS1822 digital thermometer

use embassy_time::Duration;

use crate::onewire::{Address, Error, MATCH_ROM, SKIP_ROM, crc8};
use crate::traits::OneWireBus;

pub const FAMILY_DS18B20: u8 = 0x28;
pub const FAMILY_DS1822: u8 = 0x22;

const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;

pub const SCRATCHPAD_LEN: usize = 9;

/// Worst case conversion time at 12-bit resolution
pub const MAX_CONVERSION_TIME: Duration = Duration::from_millis(750);
pub const CONVERSION_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn is_supported(address: &Address) -> bool {
    matches!(address.family(), FAMILY_DS18B20 | FAMILY_DS1822)
}

/// Start a conversion on every device on the bus at once
pub fn start_conversion<B: OneWireBus>(bus: &mut B) -> Result<(), Error> {
    if !bus.reset() {
        return Err(Error::NoPresence);
    }
    bus.write_byte(SKIP_ROM);
    bus.write_byte(CONVERT_T);
    Ok(())
}

/// Devices hold the line low while converting and release it when done
pub fn conversion_complete<B: OneWireBus>(bus: &mut B) -> bool {
    bus.read_bit()
}

pub fn read_scratchpad<B: OneWireBus>(
    bus: &mut B,
    address: &Address,
) -> Result<[u8; SCRATCHPAD_LEN], Error> {
    if !bus.reset() {
        return Err(Error::NoPresence);
    }
    bus.write_byte(MATCH_ROM);
    bus.write_bytes(address.as_bytes());
    bus.write_byte(READ_SCRATCHPAD);

    let mut scratchpad = [0u8; SCRATCHPAD_LEN];
    bus.read_bytes(&mut scratchpad);

    if scratchpad.iter().all(|&b| b == 0xFF) || scratchpad.iter().all(|&b| b == 0x00) {
        return Err(Error::NoResponse);
    }
    if crc8(&scratchpad[..SCRATCHPAD_LEN - 1]) != scratchpad[SCRATCHPAD_LEN - 1] {
        return Err(Error::CrcMismatch);
    }

    Ok(scratchpad)
}

/// Temperature register is a signed 12.4 fixed point value in °C
pub fn decode_temperature(lsb: u8, msb: u8) -> f32 {
    i16::from_le_bytes([lsb, msb]) as f32 / 16.0
}

/// Read the result of the last conversion from one device
pub fn read_temperature<B: OneWireBus>(bus: &mut B, address: &Address) -> Result<f32, Error> {
    if !is_supported(address) {
        return Err(Error::UnsupportedFamily(address.family()));
    }

    let scratchpad = read_scratchpad(bus, address)?;
    Ok(decode_temperature(scratchpad[0], scratchpad[1]))
}
