//! Microphone level meter: bursts of samples become a staircase on the matrix

#![no_std]
#![no_main]

use alert_station::config;
use alert_station::led_control::MatrixDriver;
use alert_station::matrix::Frame;
use alert_station::microphone::LevelMeter;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::Level;
use esp_hal::rmt::{Rmt, TxChannelConfig, TxChannelCreator};
use esp_hal::time::Rate;
use esp_println::println;

esp_bootloader_esp_idf::esp_app_desc!();

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
    let mut mic_pin = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let mut adc = Adc::new(peripherals.ADC1, adc_config);
    let delay = Delay::new();

    let mut meter = LevelMeter::new();
    let mut samples = [0u16; config::MIC_SAMPLES];
    let mut last_bar = u8::MAX;

    println!(
        "[MIC] Sampling {} values every {} ms",
        config::MIC_SAMPLES,
        config::MIC_PERIOD_MS
    );

    loop {
        let mut complete = true;
        for sample in samples.iter_mut() {
            match nb::block!(adc.read_oneshot(&mut mic_pin)) {
                Ok(raw) => *sample = raw,
                Err(_) => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            println!("[MIC] ADC read failed");
            delay.delay_millis(config::MIC_PERIOD_MS as u32);
            continue;
        }

        let level = meter.process(&samples);
        if level.bar != last_bar {
            match matrix_driver.write(&Frame::staircase(level.bar)) {
                Ok(()) => last_bar = level.bar,
                Err(e) => println!("[LED] Matrix update failed: {:?}", e),
            }
        }

        println!("{} {:.4}", level.intensity, level.volts);
        if meter.debug_due() {
            println!(
                "[MIC] cycle {}: {:.4} V, intensity {}, bar {}",
                meter.cycles(),
                level.volts,
                level.intensity,
                level.bar
            );
        }

        delay.delay_millis(config::MIC_PERIOD_MS as u32);
    }
}
