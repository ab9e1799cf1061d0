//! Wi-Fi station management and network stack tasks

use embassy_executor::Spawner;
use embassy_net::{Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::{peripherals::WIFI, rng::Rng};
use esp_radio::{
    Controller,
    wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState},
};

use crate::config::{WIFI_PASSWORD, WIFI_SSID};

const RECONNECT_DELAY_MS: u64 = 5_000;
const LINK_POLL_INTERVAL_MS: u64 = 500;

// DHCP, DNS and one TCP socket, plus a spare
const SOCKET_COUNT: usize = 4;

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

/// Bring up the radio and the network stack, and spawn the tasks that keep
/// them running. Must be called once.
pub fn start(spawner: Spawner, wifi: WIFI<'static>) -> Result<Stack<'static>, &'static str> {
    let radio = esp_radio::init().map_err(|_| "Failed to initialize radio")?;
    let radio = &*mk_static!(Controller<'static>, radio);

    let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|_| "Failed to create Wi-Fi controller")?;

    let config = embassy_net::Config::dhcpv4(Default::default());
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        config,
        mk_static!(
            StackResources<SOCKET_COUNT>,
            StackResources::<SOCKET_COUNT>::new()
        ),
        seed,
    );

    spawner.spawn(connection(controller)).map_err(|_| "Failed to spawn Wi-Fi task")?;
    spawner.spawn(net_task(runner)).map_err(|_| "Failed to spawn network task")?;

    Ok(stack)
}

/// Keep the station associated, reconnecting after every disconnect
#[embassy_executor::task]
pub async fn connection(mut controller: WifiController<'static>) {
    esp_println::println!("[WIFI] Connecting to {}", WIFI_SSID);

    loop {
        if matches!(esp_radio::wifi::sta_state(), WifiStaState::Connected) {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            esp_println::println!("[WIFI] Disconnected, retrying in {} ms", RECONNECT_DELAY_MS);
            Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(WIFI_SSID.into())
                    .with_password(WIFI_PASSWORD.into()),
            );
            if let Err(e) = controller.set_config(&client_config) {
                esp_println::println!("[WIFI] Invalid configuration: {:?}", e);
                Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                esp_println::println!("[WIFI] Failed to start: {:?}", e);
                Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
                continue;
            }
            esp_println::println!("[WIFI] Started");
        }

        match controller.connect_async().await {
            Ok(_) => esp_println::println!("[WIFI] Connected"),
            Err(e) => {
                esp_println::println!("[WIFI] Connect failed: {:?}", e);
                Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Link is up and DHCP has handed out an address
pub fn is_online(stack: Stack<'_>) -> bool {
    stack.is_link_up() && stack.config_v4().is_some()
}

pub async fn wait_for_ip(stack: Stack<'_>) {
    esp_println::println!("[WIFI] Waiting for link up...");
    while !stack.is_link_up() {
        Timer::after(Duration::from_millis(LINK_POLL_INTERVAL_MS)).await;
    }

    esp_println::println!("[WIFI] Waiting for IP address...");
    loop {
        if let Some(config) = stack.config_v4() {
            esp_println::println!("[WIFI] IP address: {}", config.address);
            return;
        }
        Timer::after(Duration::from_millis(LINK_POLL_INTERVAL_MS)).await;
    }
}
