//! Station-mode WiFi for the ESP32-C3
//!
//! Association goes through esp-wifi's async controller, the IPv4 lease comes
//! from the embassy-net DHCP client.

use crate::{BoardError, config, println};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, with_timeout};
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController, WifiEvent};

/// Change reported by [`WiFiManager::monitor_connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Unchanged,
    Lost,
    Restored,
}

/// Owns the WiFi controller and tracks whether we are associated
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
    is_connected: bool,
}

impl<'a> WiFiManager<'a> {
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self {
            controller,
            stack,
            is_connected: false,
        }
    }

    /// Connect to WiFi network, bounded by `WIFI_CONNECT_TIMEOUT_MS`
    pub async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), BoardError> {
        if ssid.is_empty() {
            println!("[WIFI] No SSID configured, set WIFI_SSID in .env");
            return Err(BoardError::ConfigError);
        }

        println!("[WIFI] Connecting to WiFi network: {}", ssid);

        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| BoardError::WiFiError)?,
            password: password.try_into().map_err(|_| BoardError::WiFiError)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller
                .set_configuration(&Configuration::Client(client_config))
                .map_err(|_| BoardError::WiFiError)?;
            self.controller
                .start_async()
                .await
                .map_err(|_| BoardError::WiFiError)?;
        }

        let timeout = Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS as u64);
        match with_timeout(timeout, self.controller.connect_async()).await {
            Ok(Ok(())) => {
                self.is_connected = true;
                println!("[WIFI] Successfully connected to WiFi network");
                Ok(())
            }
            Ok(Err(e)) => {
                println!("[WIFI] Failed to connect to WiFi network: {:?}", e);
                Err(BoardError::WiFiError)
            }
            Err(_) => {
                println!(
                    "[WIFI] No association within {} ms",
                    config::WIFI_CONNECT_TIMEOUT_MS
                );
                Err(BoardError::Timeout)
            }
        }
    }

    /// Waits for a DHCP lease, polling every 500 ms
    pub async fn wait_for_ip(&self, timeout: Duration) -> Result<[u8; 4], BoardError> {
        let polls = (timeout.as_millis() / 500).max(1);
        for _ in 0..polls {
            if let Some(ip) = self.get_ip_address() {
                println!(
                    "[DHCP] IP address obtained: {}.{}.{}.{}",
                    ip[0], ip[1], ip[2], ip[3]
                );
                return Ok(ip);
            }
            Timer::after(Duration::from_millis(500)).await;
        }
        println!("[DHCP] No lease within {} ms", timeout.as_millis());
        Err(BoardError::Timeout)
    }

    /// Leased IPv4 address, `None` until associated and configured
    pub fn get_ip_address(&self) -> Option<[u8; 4]> {
        if !self.is_connected {
            return None;
        }
        self.stack
            .config_v4()
            .map(|config| config.address.address().octets())
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected && self.controller.is_connected().unwrap_or(false)
    }

    /// Blocks until the access point drops us
    pub async fn wait_for_disconnect(&mut self) {
        self.controller
            .wait_for_event(WifiEvent::StaDisconnected)
            .await;
        self.is_connected = false;
        println!("[WIFI] WiFi connection lost!");
    }

    /// Compares the driver's link state with ours and reports the edge
    pub fn monitor_connection(&mut self) -> LinkChange {
        let current_status = self.controller.is_connected().unwrap_or(false);

        if self.is_connected && !current_status {
            println!("[WIFI] WiFi connection lost!");
            self.is_connected = false;
            LinkChange::Lost
        } else if !self.is_connected && current_status {
            println!("[WIFI] WiFi connection restored!");
            self.is_connected = true;
            LinkChange::Restored
        } else {
            LinkChange::Unchanged
        }
    }
}
