//! Button painter: A/B walk a cursor along the strip, C marks the cell

#![no_std]
#![no_main]

use alert_station::cursor::LinePainter;
use alert_station::led_control::MatrixDriver;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Pull};
use esp_hal::rmt::{Rmt, TxChannelConfig, TxChannelCreator};
use esp_hal::time::Rate;
use esp_println::println;

esp_bootloader_esp_idf::esp_app_desc!();

/// Held buttons repeat at this rate
const REPEAT_DELAY_MS: u32 = 200;
const POLL_MS: u32 = 10;

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

    let pull_up = InputConfig::default().with_pull(Pull::Up);
    let button_a = Input::new(peripherals.GPIO5, pull_up);
    let button_b = Input::new(peripherals.GPIO6, pull_up);
    let button_c = Input::new(peripherals.GPIO9, pull_up);
    let delay = Delay::new();

    let mut painter = LinePainter::new();
    if let Err(e) = matrix_driver.write(&painter.render()) {
        println!("[LED] Matrix update failed: {:?}", e);
    }
    println!("[PAINT] A = right, B = left, C = mark");

    loop {
        let acted = if button_a.is_low() {
            painter.move_right();
            true
        } else if button_b.is_low() {
            painter.move_left();
            true
        } else if button_c.is_low() {
            let marked = painter.toggle();
            println!(
                "[PAINT] Cell {} {}",
                painter.cursor(),
                if marked { "marked" } else { "cleared" }
            );
            true
        } else {
            false
        };

        if acted {
            if let Err(e) = matrix_driver.write(&painter.render()) {
                println!("[LED] Matrix update failed: {:?}", e);
            }
            delay.delay_millis(REPEAT_DELAY_MS);
        } else {
            delay.delay_millis(POLL_MS);
        }
    }
}
