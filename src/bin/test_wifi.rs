//! Wi-Fi smoke test
//!
//! Joins the configured network, waits for DHCP and fetches the root of the
//! telemetry host once, over TLS when the endpoint is `https://`. No readings
//! are posted.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;

use static_cell::StaticCell;

use emontemp::{
    config::EMONCMS_URL,
    hardware::HardwareRng,
    http::{Buffers, HttpClient, Url},
    tls::{TLS_READ_BUFFER_SIZE, TLS_WRITE_BUFFER_SIZE},
    wifi,
};

static TLS_READ_BUFFER: StaticCell<[u8; TLS_READ_BUFFER_SIZE]> = StaticCell::new();
static TLS_WRITE_BUFFER: StaticCell<[u8; TLS_WRITE_BUFFER_SIZE]> = StaticCell::new();

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("=== Wi-Fi Test ===");

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let stack = match wifi::start(spawner, peripherals.WIFI) {
        Ok(stack) => stack,
        Err(e) => {
            esp_println::println!("[ERROR] {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };
    wifi::wait_for_ip(stack).await;

    let mut rx_buffer = [0u8; 4096];
    let mut tx_buffer = [0u8; 4096];
    let buffers = Buffers {
        tcp_rx: &mut rx_buffer,
        tcp_tx: &mut tx_buffer,
        tls_read: TLS_READ_BUFFER.init_with(|| [0; TLS_READ_BUFFER_SIZE]),
        tls_write: TLS_WRITE_BUFFER.init_with(|| [0; TLS_WRITE_BUFFER_SIZE]),
    };
    let mut client = HttpClient::new(stack, buffers, HardwareRng::new());

    let Some(endpoint) = Url::parse(EMONCMS_URL) else {
        esp_println::println!("\n✗ Wi-Fi test failed: bad EMONCMS_URL {}", EMONCMS_URL);
        loop {
            Timer::after(Duration::from_secs(10)).await;
        }
    };
    let root = Url {
        target: "/",
        ..endpoint
    };
    esp_println::println!("[HTTP] GET {}", root);

    match client.get(root).await {
        Ok(response) => {
            esp_println::println!("[HTTP] Response code: {}", response.status);
            esp_println::println!("[HTTP] {}", response.body);
            esp_println::println!("\n✓ Wi-Fi test passed");
        }
        Err(e) => esp_println::println!("\n✗ Wi-Fi test failed: {}", e),
    }

    loop {
        esp_println::println!("[WIFI] online: {}", wifi::is_online(stack));
        Timer::after(Duration::from_secs(10)).await;
    }
}
