#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use rand_core::{CryptoRng, RngCore};
use static_cell::StaticCell;

use emontemp::{
    config::{MAX_BUS_DEVICES, REPORT_INTERVAL, SENSORS},
    hardware::{HardwareRng, OneWireHardware},
    http::{Buffers, HttpClient},
    logic::{self, CycleOutcome},
    sampler, search, telemetry,
    tls::{TLS_READ_BUFFER_SIZE, TLS_WRITE_BUFFER_SIZE},
    traits::OneWireBus,
    wifi,
};

const TCP_BUFFER_SIZE: usize = 4096;

static TCP_RX_BUFFER: StaticCell<[u8; TCP_BUFFER_SIZE]> = StaticCell::new();
static TCP_TX_BUFFER: StaticCell<[u8; TCP_BUFFER_SIZE]> = StaticCell::new();
static TLS_READ_BUFFER: StaticCell<[u8; TLS_READ_BUFFER_SIZE]> = StaticCell::new();
static TLS_WRITE_BUFFER: StaticCell<[u8; TLS_WRITE_BUFFER_SIZE]> = StaticCell::new();

esp_bootloader_esp_idf::esp_app_desc!();

async fn halt(reason: &str) -> ! {
    esp_println::println!("[ERROR] {}", reason);
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}

/// One sampling/reporting cycle
async fn run_cycle<B, R>(bus: &mut B, stack: Stack<'_>, client: &mut HttpClient<'_, R>)
where
    B: OneWireBus,
    R: RngCore + CryptoRng,
{
    esp_println::println!("[CYCLE] Timer expired, requesting temperatures");

    // Re-enumerate every cycle
    match search::discover::<_, MAX_BUS_DEVICES>(bus) {
        Ok(devices) => esp_println::println!("[BUS] {} devices on the bus", devices.len()),
        Err(e) => esp_println::println!("[BUS] Search failed: {}", e),
    }

    let samples = sampler::sample_slots(bus, &SENSORS).await;

    let payload = match logic::evaluate(&samples) {
        CycleOutcome::Report(payload) => payload,
        CycleOutcome::Skip { invalid } => {
            esp_println::println!(
                "[CYCLE] {} readings not above the minimum valid value, skipping until next cycle",
                invalid
            );
            return;
        }
    };

    match payload.to_json() {
        Ok(json) => esp_println::println!("[CYCLE] {}", json),
        Err(_) => esp_println::println!("[CYCLE] Payload too large"),
    }

    if !wifi::is_online(stack) {
        esp_println::println!("[WIFI] Disconnected, reading dropped");
        return;
    }

    match telemetry::post(client, &payload).await {
        Ok(response) => {
            esp_println::println!("[HTTP] Response code: {}", response.status);
            esp_println::println!("[HTTP] {}", response.body);
            if !response.is_success() {
                esp_println::println!("[HTTP] Endpoint rejected the reading");
            }
        }
        Err(e) => esp_println::println!("[HTTP] Error: {}", e),
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("=== emontemp ===");

    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let stack = match wifi::start(spawner, peripherals.WIFI) {
        Ok(stack) => stack,
        Err(e) => halt(e).await,
    };
    wifi::wait_for_ip(stack).await;

    // DQ => GPIO4, 4.7k pull-up to 3V3
    let mut bus = OneWireHardware::new(peripherals.GPIO4);

    if let Err(e) = sampler::survey(&mut bus).await {
        esp_println::println!("[BUS] Survey failed: {}", e);
    }

    let buffers = Buffers {
        tcp_rx: TCP_RX_BUFFER.init_with(|| [0; TCP_BUFFER_SIZE]),
        tcp_tx: TCP_TX_BUFFER.init_with(|| [0; TCP_BUFFER_SIZE]),
        tls_read: TLS_READ_BUFFER.init_with(|| [0; TLS_READ_BUFFER_SIZE]),
        tls_write: TLS_WRITE_BUFFER.init_with(|| [0; TLS_WRITE_BUFFER_SIZE]),
    };
    let mut client = HttpClient::new(stack, buffers, HardwareRng::new());

    loop {
        run_cycle(&mut bus, stack, &mut client).await;
        Timer::after(REPORT_INTERVAL).await;
    }
}
