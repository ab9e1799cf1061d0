//! Business logic layer (hardware-independent)

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::config::{MAX_BUS_DEVICES, MIN_VALID_TEMPERATURE};
use crate::model::Sample;

pub const JSON_CAPACITY: usize = 256;

/// A reading is usable only when strictly above the validity floor
pub fn is_valid(celsius: f32) -> bool {
    celsius.is_finite() && celsius > MIN_VALID_TEMPERATURE
}

/// Key/value pairs that passed the validity filter, in slot order
#[derive(Debug, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(&'static str, f32), MAX_BUS_DEVICES>,
}

impl Payload {
    pub fn fields(&self) -> &[(&'static str, f32)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| *value)
    }

    /// Compact JSON object, e.g. `{"outdoor-temp":12.5,"boiler-flow-temp":55}`
    pub fn to_json(&self) -> Result<String<JSON_CAPACITY>, fmt::Error> {
        let mut json = String::new();
        json.push('{').map_err(|_| fmt::Error)?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                json.push(',').map_err(|_| fmt::Error)?;
            }
            write!(json, "\"{}\":{}", key, value)?;
        }
        json.push('}').map_err(|_| fmt::Error)?;
        Ok(json)
    }
}

#[derive(Debug, PartialEq)]
pub enum CycleOutcome {
    Report(Payload),
    Skip { invalid: usize },
}

/// Decide what a cycle does with its samples: report only when every
/// sample is a valid reading, otherwise send nothing.
pub fn evaluate(samples: &[Sample]) -> CycleOutcome {
    let mut payload = Payload::default();
    let mut invalid = 0;

    for sample in samples {
        match sample.celsius {
            Ok(celsius) if is_valid(celsius) => {
                if payload.fields.push((sample.key, celsius)).is_err() {
                    invalid += 1;
                }
            }
            _ => invalid += 1,
        }
    }

    if invalid > 0 || payload.fields.is_empty() {
        CycleOutcome::Skip { invalid }
    } else {
        CycleOutcome::Report(payload)
    }
}
