#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Alert Station Board Library
//!
//! Temperature alerting with buzzer, LED matrix and OLED feedback, a WiFi/TCP
//! alert-reporting client, and the small peripheral demos that share the board
//! (joystick cursor, sound meter, matrix painter, HTTP control server).
//!
//! Hardware-independent logic builds on the host so it can be unit tested with
//! `cargo test --lib`; the drivers that touch esp-hal or embassy-net are only
//! compiled for the bare-metal target.

extern crate alloc;

#[cfg(target_os = "none")]
pub use esp_println::println;

/// Serial console logging; goes to stdout in host tests and nowhere otherwise.
#[cfg(not(target_os = "none"))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        #[cfg(test)]
        ::std::println!($($arg)*);
        #[cfg(not(test))]
        let _ = ::core::format_args!($($arg)*);
    }};
}

pub mod alert;
pub mod buttons;
pub mod buzzer;
pub mod cursor;
pub mod display;
pub mod matrix;
pub mod microphone;
pub mod report;
pub mod state_machine;
pub mod temperature;
pub mod web_control;

#[cfg(target_os = "none")]
pub mod http_server;
#[cfg(target_os = "none")]
pub mod led_control;
#[cfg(target_os = "none")]
pub mod tcp_client;
#[cfg(target_os = "none")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Default configuration constants
pub mod config {
    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// WiFi connection timeout in milliseconds
    pub const WIFI_CONNECT_TIMEOUT_MS: u32 = 10000;

    /// WiFi reconnection interval in milliseconds
    pub const WIFI_RECONNECT_INTERVAL_MS: u32 = 5000;

    /// Address of the TCP collector that receives alert reports
    pub const REPORT_SERVER_IP: &str = env!("REPORT_SERVER_IP");
    pub const REPORT_SERVER_PORT: u16 = parse_port(env!("REPORT_SERVER_PORT"), 5000);

    /// Minimum time between two connection attempts to the collector
    pub const RECONNECT_INTERVAL_MS: u64 = 5000;

    /// Connection attempts before the reporter gives up until the network comes back
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

    /// Upper bound for a TCP connect or send
    pub const TCP_TIMEOUT_MS: u64 = 10000;

    /// Receive buffer for replies from the collector
    pub const TCP_RX_BUFFER_SIZE: usize = 512;

    /// Temperature measurement period of the alert loop
    pub const MEASURE_INTERVAL_MS: u64 = 1000;

    /// Default alert threshold and hysteresis band in °C
    pub const ALERT_THRESHOLD_C: f32 = 30.0;
    pub const ALERT_HYSTERESIS_C: f32 = 2.0;
    pub const THRESHOLD_STEP_C: f32 = 1.0;

    /// Matrix alert: steady red, or toggled on every measurement
    pub const ALERT_INDICATOR: crate::alert::IndicatorStyle = crate::alert::IndicatorStyle::Steady;

    /// ADC samples averaged per temperature reading, and the gap between them
    pub const TEMP_SAMPLES: usize = 200;
    pub const TEMP_SAMPLE_GAP_US: u32 = 50;

    /// Buzzer tone
    pub const BUZZER_FREQ_HZ: u32 = 1200;

    /// Button debounce window
    pub const DEBOUNCE_MS: u64 = 50;

    /// HTTP control server port
    pub const HTTP_PORT: u16 = 80;

    /// Web-control WiFi retry and link check periods
    pub const WEB_WIFI_RETRY_MS: u64 = 15000;
    pub const WEB_LINK_CHECK_MS: u64 = 60000;

    /// Joystick demo refresh period
    pub const CURSOR_PERIOD_MS: u64 = 150;

    /// Microphone burst size and refresh period
    pub const MIC_SAMPLES: usize = 200;
    pub const MIC_PERIOD_MS: u64 = 50;

    /// Board wiring (ESP32-C3 GPIO numbers)
    pub const TEMP_SENSOR_PIN: u8 = 0;
    pub const JOYSTICK_X_PIN: u8 = 1;
    pub const MIC_PIN: u8 = 2;
    pub const JOYSTICK_Y_PIN: u8 = 3;
    pub const BUZZER_PIN: u8 = 4;
    pub const BUTTON_A_PIN: u8 = 5;
    pub const BUTTON_B_PIN: u8 = 6;
    pub const STATUS_LED_PIN: u8 = 7;
    pub const LED_DATA_PIN: u8 = 8;
    pub const BUTTON_C_PIN: u8 = 9;
    pub const I2C_SDA_PIN: u8 = 20;
    pub const I2C_SCL_PIN: u8 = 21;

    /// Parses a decimal port at compile time, falling back on malformed input.
    pub const fn parse_port(s: &str, fallback: u16) -> u16 {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 5 {
            return fallback;
        }
        let mut value: u32 = 0;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b < b'0' || b > b'9' {
                return fallback;
            }
            value = value * 10 + (b - b'0') as u32;
            i += 1;
        }
        if value == 0 || value > u16::MAX as u32 {
            fallback
        } else {
            value as u16
        }
    }
}

/// Error types for the alert station board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// WiFi connection error
    WiFiError,
    /// TCP connect/send error
    TcpError,
    /// Operation did not finish in time
    Timeout,
    /// LED control error
    LedError,
    /// OLED display error
    DisplayError,
    /// Buzzer PWM error
    PwmError,
    /// Sensor read error
    SensorError,
    /// Request/report parsing error
    ProtocolError,
    /// Invalid compile-time configuration
    ConfigError,
}

#[cfg(test)]
mod tests {
    use super::config::parse_port;

    #[test]
    fn parse_port_accepts_decimal_ports() {
        assert_eq!(parse_port("5000", 1), 5000);
        assert_eq!(parse_port("65535", 1), 65535);
    }

    #[test]
    fn parse_port_falls_back_on_garbage() {
        assert_eq!(parse_port("", 5000), 5000);
        assert_eq!(parse_port("50a0", 5000), 5000);
        assert_eq!(parse_port("70000", 5000), 5000);
        assert_eq!(parse_port("0", 5000), 5000);
    }
}
