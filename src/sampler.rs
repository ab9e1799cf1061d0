//! One measurement pass over the bus

use embassy_time::{Instant, Timer};
use heapless::Vec;

use crate::config::MAX_BUS_DEVICES;
use crate::ds18b20::{self, CONVERSION_POLL_INTERVAL, MAX_CONVERSION_TIME};
use crate::model::{Sample, SensorSlot};
use crate::onewire::{Address, Error};
use crate::search;
use crate::traits::OneWireBus;

/// Start a conversion on every device and wait until the bus reports it
/// done, or the worst case conversion time has passed.
pub async fn convert_all<B: OneWireBus>(bus: &mut B) -> Result<(), Error> {
    ds18b20::start_conversion(bus)?;

    let started = Instant::now();
    loop {
        Timer::after(CONVERSION_POLL_INTERVAL).await;
        if ds18b20::conversion_complete(bus) {
            return Ok(());
        }
        if started.elapsed() >= MAX_CONVERSION_TIME {
            esp_println::println!(
                "[BUS] Conversion still busy after {} ms, reading anyway",
                MAX_CONVERSION_TIME.as_millis()
            );
            return Ok(());
        }
    }
}

/// Convert and read every slot. A failed conversion marks every sample with
/// the same error.
pub async fn sample_slots<B: OneWireBus>(
    bus: &mut B,
    slots: &[SensorSlot],
) -> Vec<Sample, MAX_BUS_DEVICES> {
    let converted = convert_all(bus).await;

    let mut samples = Vec::new();
    for slot in slots.iter() {
        let celsius = match converted {
            Ok(()) => ds18b20::read_temperature(bus, &slot.address),
            Err(e) => Err(e),
        };
        match celsius {
            Ok(t) => esp_println::println!("[BUS] {} ({}): {:.2}°C", slot.key, slot.address, t),
            Err(e) => esp_println::println!("[BUS] {} ({}): {}", slot.key, slot.address, e),
        }
        if samples
            .push(Sample {
                key: slot.key,
                celsius,
            })
            .is_err()
        {
            break;
        }
    }
    samples
}

/// Enumerate the bus, start a conversion and log every device found with
/// its temperature. Returns the addresses found.
pub async fn survey<B: OneWireBus>(bus: &mut B) -> Result<Vec<Address, MAX_BUS_DEVICES>, Error> {
    esp_println::println!("[BUS] Polling for devices");
    let devices = search::discover::<_, MAX_BUS_DEVICES>(bus)?;
    esp_println::println!("[BUS] Found {} devices", devices.len());

    if devices.is_empty() {
        return Ok(devices);
    }

    convert_all(bus).await?;
    for (index, address) in devices.iter().enumerate() {
        match ds18b20::read_temperature(bus, address) {
            Ok(t) => esp_println::println!("[BUS] Sensor {} - {} : {:.2}°C", index, address, t),
            Err(e) => esp_println::println!("[BUS] Sensor {} - {} : {}", index, address, e),
        }
    }

    Ok(devices)
}
