//! Joystick cursor on the 5x5 matrix
//!
//! The two joystick axes move a dim green pixel one cell per period, the
//! joystick switch brings it back to the centre. Both axes are also drawn as
//! text bars on the serial console.

#![no_std]
#![no_main]

use alert_station::config;
use alert_station::cursor::{JoystickCursor, axis_bar};
use alert_station::led_control::MatrixDriver;
use alert_station::matrix;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Pull};
use esp_hal::rmt::{Rmt, TxChannelConfig, TxChannelCreator};
use esp_hal::time::Rate;
use esp_println::println;

esp_bootloader_esp_idf::esp_app_desc!();

const BAR_WIDTH: usize = 20;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[MAIN] Panic: {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(10)).expect("rmt init");
    let tx_config = TxChannelConfig::default()
        .with_clk_divider(1)
        .with_idle_output_level(Level::Low)
        .with_idle_output(false)
        .with_carrier_modulation(false);
    let channel = rmt
        .channel0
        .configure(peripherals.GPIO8, tx_config)
        .expect("rmt channel init");
    let mut matrix_driver = MatrixDriver::new(channel);

    let mut adc_config = AdcConfig::new();
    let mut pin_x = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let mut pin_y = adc_config.enable_pin(peripherals.GPIO3, Attenuation::_11dB);
    let mut adc = Adc::new(peripherals.ADC1, adc_config);

    let switch = Input::new(peripherals.GPIO9, InputConfig::default().with_pull(Pull::Up));
    let delay = Delay::new();

    let mut cursor = JoystickCursor::new();
    println!("[JOY] Joystick cursor started at {:?}", cursor.position());

    loop {
        let (raw_x, raw_y) = match (
            nb::block!(adc.read_oneshot(&mut pin_x)),
            nb::block!(adc.read_oneshot(&mut pin_y)),
        ) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                println!("[JOY] ADC read failed");
                delay.delay_millis(config::CURSOR_PERIOD_MS as u32);
                continue;
            }
        };

        if switch.is_low() {
            cursor.recenter();
            println!("[JOY] Recentered");
        } else {
            cursor.update(raw_x, raw_y);
        }

        if let Err(e) = matrix_driver.write(&cursor.render(matrix::CURSOR_GREEN)) {
            println!("[LED] Matrix update failed: {:?}", e);
        }

        println!(
            "X: {}  Y: {}  ({}, {})",
            axis_bar::<{ BAR_WIDTH + 2 }>(raw_x, BAR_WIDTH),
            axis_bar::<{ BAR_WIDTH + 2 }>(raw_y, BAR_WIDTH),
            cursor.position().0,
            cursor.position().1
        );

        delay.delay_millis(config::CURSOR_PERIOD_MS as u32);
    }
}
