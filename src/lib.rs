#![no_std]

pub mod config;
pub mod ds18b20;
pub mod hardware;
pub mod http;
pub mod logic;
pub mod model;
pub mod onewire;
pub mod sampler;
pub mod search;
pub mod socket;
pub mod telemetry;
pub mod tls;
pub mod traits;
pub mod wifi;
