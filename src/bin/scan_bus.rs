//! 1-Wire bus scan
//!
//! Lists every device on the bus with its ROM code and current temperature,
//! then repeats. Use it to find the addresses for the sensor table in
//! `config.rs` and to check the wiring.
//!
//! Following pins are used:
//! - DQ => GPIO4 (4.7k pull-up to 3V3)

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use emontemp::{config::SENSORS, ds18b20, hardware::OneWireHardware, sampler};

const SCAN_INTERVAL_MS: u64 = 5_000;

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut bus = OneWireHardware::new(peripherals.GPIO4);

    loop {
        esp_println::println!("1-Wire scan start");
        match sampler::survey(&mut bus).await {
            Ok(devices) => {
                for address in devices.iter() {
                    let known = SENSORS.iter().find(|slot| slot.address == *address);
                    match known {
                        Some(slot) => esp_println::println!("  {} => {}", address, slot.key),
                        None if !ds18b20::is_supported(address) => {
                            esp_println::println!("  {} => not a thermometer", address)
                        }
                        None => esp_println::println!("  {} => not configured", address),
                    }
                }
                for slot in SENSORS.iter() {
                    if !devices.contains(&slot.address) {
                        esp_println::println!("  {} ({}) missing", slot.address, slot.key);
                    }
                }
            }
            Err(e) => esp_println::println!("Scan failed: {}", e),
        }
        esp_println::println!("1-Wire scan done");

        Timer::after(Duration::from_millis(SCAN_INTERVAL_MS)).await;
    }
}
