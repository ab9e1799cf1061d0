//! Build-time configuration
//!
//! Credentials come from the build environment (see `.cargo/config.toml`).

use embassy_time::Duration;

use crate::model::SensorSlot;
use crate::onewire::Address;

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

pub const EMONCMS_WRITE_KEY: &str = env!("EMONCMS_WRITE_KEY");
pub const EMONCMS_NODE: &str = env!("EMONCMS_NODE");
/// Input API endpoint; `http://` skips TLS for a local emoncms
pub const EMONCMS_URL: &str = match option_env!("EMONCMS_URL") {
    Some(url) => url,
    None => "https://emoncms.org/input/post",
};

/// Time between the end of one cycle and the start of the next
pub const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Disconnected or disturbed sensors report -127, so anything at or below
/// this is not a real reading
pub const MIN_VALID_TEMPERATURE: f32 = -20.0;

/// Upper bound for devices enumerated on the bus
pub const MAX_BUS_DEVICES: usize = 8;

pub const SENSORS: [SensorSlot; 3] = [
    SensorSlot::new(
        "outdoor-temp",
        Address::new([0x28, 0x2E, 0x41, 0xEB, 0x04, 0x00, 0x00, 0xDC]),
    ),
    SensorSlot::new(
        "boiler-flow-temp",
        Address::new([0x28, 0x03, 0x96, 0x75, 0xD0, 0x01, 0x3C, 0x85]),
    ),
    SensorSlot::new(
        "boiler-return-temp",
        Address::new([0x28, 0xFF, 0xAA, 0xDE, 0x91, 0x16, 0x05, 0x28]),
    ),
];
