#![no_std]
#![no_main]

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::ledc::{
    LSGlobalClkSource, Ledc, LowSpeed,
    channel::{self as ledc_channel, ChannelIFace as _},
    timer::{self as ledc_timer, TimerIFace as _},
};
use esp_hal::peripherals::{ADC1, GPIO0};
use esp_hal::rmt::{Rmt, TxChannelCreator};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_println::println;

extern crate alloc;

use esp_wifi::wifi;

use embassy_net::{Config, Stack, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use esp_hal_embassy::Executor;
use static_cell::StaticCell;

use alert_station::BoardError;
use alert_station::alert::{AlertIndicator, AlertMonitor};
use alert_station::buttons::{ButtonEvent, Debouncer};
use alert_station::buzzer::Buzzer;
use alert_station::config;
use alert_station::display::{StatusDisplay, alert_screen};
use alert_station::led_control::MatrixDriver;
use alert_station::matrix::{self, Frame};
use alert_station::report::{ReportTarget, TelemetryReport};
use alert_station::state_machine::{Action, LinkEvent, LinkStateMachine};
use alert_station::tcp_client::{SendOutcome, TcpLink};
use alert_station::temperature::{Calibration, TemperatureSensor};
use alert_station::wifi::WiFiManager;

esp_bootloader_esp_idf::esp_app_desc!();

type MatrixChannel = esp_hal::rmt::Channel<Blocking, 0>;
type SharedLink = Mutex<CriticalSectionRawMutex, LinkStateMachine>;
type SharedAlert = Mutex<CriticalSectionRawMutex, AlertMonitor>;
type Display = StatusDisplay<I2c<'static, Blocking>>;

static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static BUZZER_TIMER: StaticCell<ledc_timer::Timer<'static, LowSpeed>> = StaticCell::new();
static LINK_CELL: StaticCell<SharedLink> = StaticCell::new();
static ALERT_CELL: StaticCell<SharedAlert> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Latest report waiting for the reporter; a newer one overwrites it
static REPORTS: Signal<CriticalSectionRawMutex, TelemetryReport> = Signal::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[MAIN] Panic: {}", info);
    loop {}
}

#[embassy_executor::task]
async fn net_task(
    mut runner: embassy_net::Runner<'static, esp_wifi::wifi::WifiDevice<'static>>,
) -> ! {
    runner.run().await
}

/// Keeps the station associated and tells the link state machine about it
#[embassy_executor::task]
async fn wifi_task(mut wifi_manager: WiFiManager<'static>, link: &'static SharedLink) -> ! {
    let dhcp_timeout = Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS as u64);

    loop {
        let connected = match wifi_manager
            .connect(config::WIFI_SSID, config::WIFI_PASSWORD)
            .await
        {
            Ok(()) => wifi_manager.wait_for_ip(dhcp_timeout).await.is_ok(),
            Err(_) => false,
        };

        if connected {
            link.lock().await.handle_event(LinkEvent::NetworkUp);
            wifi_manager.wait_for_disconnect().await;
            link.lock().await.handle_event(LinkEvent::NetworkDown);
        }

        Timer::after(Duration::from_millis(
            config::WIFI_RECONNECT_INTERVAL_MS as u64,
        ))
        .await;
    }
}

/// Executes the link state machine actions against the TCP socket
#[embassy_executor::task]
async fn reporter_task(stack: Stack<'static>, link: &'static SharedLink) {
    let target = match ReportTarget::parse(config::REPORT_SERVER_IP, config::REPORT_SERVER_PORT) {
        Ok(target) => target,
        Err(e) => {
            println!(
                "[TCP] Invalid collector address {}:{} ({:?}), reporting disabled",
                config::REPORT_SERVER_IP,
                config::REPORT_SERVER_PORT,
                e
            );
            return;
        }
    };

    let mut rx_buffer = [0u8; config::TCP_RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; 1024];
    let mut tcp = TcpLink::new(stack, target, &mut rx_buffer, &mut tx_buffer);

    println!("[TCP] Reporter ready");

    loop {
        if let Some(report) = REPORTS.try_take() {
            link.lock().await.queue_report(report);
        }

        let now_ms = Instant::now().as_millis();
        let actions = link.lock().await.update(now_ms);

        for action in actions {
            match action {
                Action::OpenConnection { .. } => {
                    let event = match tcp.open().await {
                        Ok(()) => LinkEvent::ConnectSucceeded,
                        Err(_) => LinkEvent::ConnectFailed,
                    };
                    link.lock().await.handle_event(event);
                }
                Action::SendReport(report) => {
                    let event = match report.encode() {
                        Ok(message) => match tcp.send(message.as_bytes()).await {
                            Ok(SendOutcome::Delivered) => {
                                tcp.drain().await;
                                LinkEvent::SendSucceeded
                            }
                            Ok(SendOutcome::PeerClosed) => {
                                tcp.abort();
                                LinkEvent::PeerClosed
                            }
                            Err(_) => LinkEvent::SendFailed,
                        },
                        Err(e) => {
                            println!("[TCP] Report does not fit the buffer: {:?}", e);
                            LinkEvent::SendFailed
                        }
                    };
                    link.lock().await.handle_event(event);
                }
                Action::CloseConnection => {
                    tcp.close().await;
                }
                Action::LogError(state) => {
                    println!(
                        "[LINK] Reporting stopped in state {:?}, waiting for WiFi to reconnect",
                        state
                    );
                }
            }
        }

        // 服务器在两次报告之间关闭连接
        if tcp.is_connected() {
            tcp.drain().await;
            if tcp.peer_closed() {
                println!("[TCP] Collector closed the idle connection");
                tcp.abort();
                link.lock().await.handle_event(LinkEvent::PeerClosed);
            }
        }

        Timer::after(Duration::from_millis(100)).await;
    }
}

/// Button A raises the threshold, button B lowers it
#[embassy_executor::task]
async fn button_task(button_a: Input<'static>, button_b: Input<'static>, alert: &'static SharedAlert) -> ! {
    let mut debounce_a = Debouncer::new(config::DEBOUNCE_MS);
    let mut debounce_b = Debouncer::new(config::DEBOUNCE_MS);

    loop {
        let now_ms = Instant::now().as_millis();

        if let Some(ButtonEvent::Pressed) = debounce_a.update(button_a.is_low(), now_ms) {
            alert.lock().await.raise_threshold();
        }
        if let Some(ButtonEvent::Pressed) = debounce_b.update(button_b.is_low(), now_ms) {
            alert.lock().await.lower_threshold();
        }

        Timer::after(Duration::from_millis(10)).await;
    }
}

/// Blinks the status LED according to the link state
#[embassy_executor::task]
async fn status_led_task(mut led: Output<'static>, link: &'static SharedLink) -> ! {
    let mut tick: u32 = 0;
    loop {
        let pattern = link.lock().await.get_status_pattern();
        led.set_level(if pattern.is_lit(tick) { Level::High } else { Level::Low });
        tick = tick.wrapping_add(1);
        Timer::after(Duration::from_millis(100)).await;
    }
}

/// Measurement loop: temperature, alert feedback, screen and report
#[embassy_executor::task]
async fn sensor_task(
    mut adc: Adc<'static, ADC1<'static>, Blocking>,
    mut adc_pin: AdcPin<GPIO0<'static>, ADC1<'static>>,
    mut buzzer: Buzzer<ledc_channel::Channel<'static, LowSpeed>>,
    mut matrix_driver: MatrixDriver<MatrixChannel>,
    mut display: Option<Display>,
    alert: &'static SharedAlert,
    link: &'static SharedLink,
) -> ! {
    let read_adc = move || nb::block!(adc.read_oneshot(&mut adc_pin)).map_err(|_| BoardError::SensorError);
    let mut sensor = TemperatureSensor::new(read_adc, Calibration::TMP36)
        .with_sampling(config::TEMP_SAMPLES, config::TEMP_SAMPLE_GAP_US);
    let mut delay = Delay::new();
    let mut indicator = AlertIndicator::default();
    let mut matrix_lit = false;

    println!("[TEMP] Measuring every {} ms", config::MEASURE_INTERVAL_MS);

    loop {
        let reading = match sensor.read(&mut delay) {
            Ok(reading) => reading,
            Err(e) => {
                println!("[TEMP] Read failed: {:?}", e);
                Timer::after(Duration::from_millis(config::MEASURE_INTERVAL_MS)).await;
                continue;
            }
        };
        let snapshot = {
            let mut monitor = alert.lock().await;
            monitor.evaluate(reading.celsius);
            monitor.snapshot()
        };

        if let Err(e) = buzzer.set(snapshot.active) {
            println!("[ALERT] Buzzer error: {:?}", e);
        }
        let lit = indicator.tick(snapshot.active);
        if lit != matrix_lit {
            let frame = if lit { Frame::filled(matrix::ALERT_RED) } else { Frame::new() };
            match matrix_driver.write(&frame) {
                Ok(()) => matrix_lit = lit,
                Err(e) => println!("[LED] Matrix update failed: {:?}", e),
            }
        }

        let link_state = link.lock().await.get_current_state();
        if let Some(screen) = display.as_mut() {
            if let Err(e) = screen.show_lines(&alert_screen(reading.celsius, &snapshot, link_state)) {
                println!("[MAIN] Display error: {:?}", e);
            }
        }

        let report = TelemetryReport::new(reading.celsius, &snapshot);
        match report.encode() {
            Ok(line) => println!("{}", line),
            Err(e) => println!("[TEMP] Could not format report: {:?}", e),
        }
        REPORTS.signal(report);

        Timer::after(Duration::from_millis(config::MEASURE_INTERVAL_MS)).await;
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    println!("[MAIN] Alert station v{}", alert_station::VERSION);

    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // WiFi driver and embassy-net stack with DHCP
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;
    let wifi_init = WIFI_INIT_CELL.init(
        esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK).expect("wifi driver init"),
    );
    let (wifi_controller, wifi_interfaces) =
        wifi::new(wifi_init, peripherals.WIFI).expect("wifi controller init");

    let (stack, runner) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );
    let wifi_manager = WiFiManager::new(wifi_controller, stack);
    println!("[WIFI] Embassy-net stack created with DHCP configuration");

    // WS2812 matrix on RMT channel 0 at 10 MHz
    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(10)).expect("rmt init");
    let tx_config = esp_hal::rmt::TxChannelConfig::default()
        .with_clk_divider(1)
        .with_idle_output_level(Level::Low)
        .with_idle_output(false)
        .with_carrier_modulation(false);
    let rmt_channel = rmt
        .channel0
        .configure(peripherals.GPIO8, tx_config)
        .expect("rmt channel init");
    let mut matrix_driver = MatrixDriver::new(rmt_channel);
    if let Err(e) = matrix_driver.clear() {
        println!("[LED] Initial clear failed: {:?}", e);
    }
    println!("[LED] Matrix ready on GPIO{}", config::LED_DATA_PIN);

    // Buzzer on LEDC
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut buzzer_timer = ledc.timer::<LowSpeed>(ledc_timer::Number::Timer0);
    buzzer_timer
        .configure(ledc_timer::config::Config {
            duty: ledc_timer::config::Duty::Duty10Bit,
            clock_source: ledc_timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(config::BUZZER_FREQ_HZ),
        })
        .expect("buzzer timer");
    let buzzer_timer = BUZZER_TIMER.init(buzzer_timer);
    let mut buzzer_channel = ledc.channel::<LowSpeed>(ledc_channel::Number::Channel0, peripherals.GPIO4);
    buzzer_channel
        .configure(ledc_channel::config::Config {
            timer: &*buzzer_timer,
            duty_pct: 0,
            drive_mode: DriveMode::PushPull,
        })
        .expect("buzzer channel");
    let buzzer = Buzzer::new(buzzer_channel).expect("buzzer init");

    // Temperature sensor on ADC1
    let mut adc_config = AdcConfig::new();
    let adc_pin = adc_config.enable_pin(peripherals.GPIO0, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    // OLED is optional: the station keeps alerting without a screen
    let display = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .map_err(|_| BoardError::DisplayError)
    .map(|i2c| i2c.with_sda(peripherals.GPIO20).with_scl(peripherals.GPIO21))
    .and_then(StatusDisplay::new);
    let display = match display {
        Ok(display) => Some(display),
        Err(e) => {
            println!("[MAIN] OLED not available: {:?}", e);
            None
        }
    };

    let button_config = InputConfig::default().with_pull(Pull::Up);
    let button_a = Input::new(peripherals.GPIO5, button_config);
    let button_b = Input::new(peripherals.GPIO6, button_config);
    let status_led = Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default());

    let link = LINK_CELL.init(Mutex::new(LinkStateMachine::default()));
    let alert = ALERT_CELL.init(Mutex::new(AlertMonitor::default()));

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning tasks...");
        spawner.spawn(net_task(runner)).ok();
        spawner.spawn(wifi_task(wifi_manager, link)).ok();
        spawner.spawn(reporter_task(stack, link)).ok();
        spawner.spawn(button_task(button_a, button_b, alert)).ok();
        spawner.spawn(status_led_task(status_led, link)).ok();
        spawner
            .spawn(sensor_task(
                adc,
                adc_pin,
                buzzer,
                matrix_driver,
                display,
                alert,
                link,
            ))
            .ok();
    });
}
