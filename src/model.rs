// Model of the data read in this app

use crate::onewire::{Address, Error};

/// A known sensor and the feed key its readings are reported under
#[derive(Debug, Clone, Copy)]
pub struct SensorSlot {
    pub key: &'static str,
    pub address: Address,
}

impl SensorSlot {
    pub const fn new(key: &'static str, address: Address) -> Self {
        Self { key, address }
    }
}

/// One reading taken from one slot during a cycle
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub key: &'static str,
    pub celsius: Result<f32, Error>,
}
