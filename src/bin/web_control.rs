//! HTTP control of the status LED and the LED matrix
//!
//! Routes: `/led/on`, `/led/off`, `/led/matrix/all/on`, `/led/matrix/all/off`,
//! `/led/matrix/random`; anything else returns the status body. Button 1
//! shows random colours, button 2 lights the matrix while held.

#![no_std]
#![no_main]

extern crate alloc;

use alert_station::buttons::Debouncer;
use alert_station::config;
use alert_station::http_server::{self, CommandSender};
use alert_station::led_control::MatrixDriver;
use alert_station::matrix::{Frame, XorShift32};
use alert_station::web_control::{Button, ControlState, MatrixCommand};
use alert_station::wifi::{LinkChange, WiFiManager};
use embassy_net::{Config, Stack, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::Blocking;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rmt::{Rmt, TxChannelConfig, TxChannelCreator};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_println::println;
use esp_wifi::wifi;
use static_cell::StaticCell;

esp_bootloader_esp_idf::esp_app_desc!();

type SharedState = Mutex<CriticalSectionRawMutex, ControlState>;
type MatrixChannel = esp_hal::rmt::Channel<Blocking, 0>;

static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static STATE_CELL: StaticCell<SharedState> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static MATRIX_COMMANDS: Channel<CriticalSectionRawMutex, MatrixCommand, 4> = Channel::new();

const STARTUP_FLASH_MS: u64 = 500;

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

/// Connects, retries every 15 s on failure and checks the link every 60 s
#[embassy_executor::task]
async fn wifi_task(mut wifi_manager: WiFiManager<'static>, state: &'static SharedState) -> ! {
    let dhcp_timeout = Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS as u64);

    loop {
        let ip = match wifi_manager
            .connect(config::WIFI_SSID, config::WIFI_PASSWORD)
            .await
        {
            Ok(()) => wifi_manager.wait_for_ip(dhcp_timeout).await.ok(),
            Err(_) => None,
        };

        let Some(ip) = ip else {
            println!("[WIFI] Retrying in {} ms", config::WEB_WIFI_RETRY_MS);
            Timer::after(Duration::from_millis(config::WEB_WIFI_RETRY_MS)).await;
            continue;
        };

        state.lock().await.ip = Some(ip);
        println!(
            "[HTTP] Open http://{}.{}.{}.{}:{}/",
            ip[0], ip[1], ip[2], ip[3], config::HTTP_PORT
        );

        loop {
            Timer::after(Duration::from_millis(config::WEB_LINK_CHECK_MS)).await;
            if wifi_manager.monitor_connection() == LinkChange::Lost {
                break;
            }
        }
        state.lock().await.ip = None;
    }
}

#[embassy_executor::task]
async fn http_task(stack: Stack<'static>, state: &'static SharedState, commands: CommandSender) -> ! {
    http_server::serve(stack, state, commands).await
}

/// Debounced button monitor feeding the shared state
#[embassy_executor::task]
async fn button_task(
    button_1: Input<'static>,
    button_2: Input<'static>,
    state: &'static SharedState,
    commands: CommandSender,
) -> ! {
    let mut debouncers = [
        Debouncer::new(config::DEBOUNCE_MS),
        Debouncer::new(config::DEBOUNCE_MS),
    ];

    loop {
        let now_ms = Instant::now().as_millis();
        let inputs = [(Button::One, &button_1), (Button::Two, &button_2)];

        for ((button, input), debouncer) in inputs.into_iter().zip(debouncers.iter_mut()) {
            if let Some(event) = debouncer.update(input.is_low(), now_ms) {
                println!("[BTN] {:?} {:?}", button, event);
                let command = state.lock().await.button_event(button, event, now_ms);
                if let Some(command) = command {
                    if commands.try_send(command).is_err() {
                        println!("[BTN] Matrix queue full, dropping {:?}", command);
                    }
                }
            }
        }

        Timer::after(Duration::from_millis(10)).await;
    }
}

/// Owns the matrix: startup flash, then renders every queued command
#[embassy_executor::task]
async fn matrix_task(
    mut matrix_driver: MatrixDriver<MatrixChannel>,
    commands: Receiver<'static, CriticalSectionRawMutex, MatrixCommand, 4>,
) -> ! {
    let mut rng: Option<XorShift32> = None;

    for frame in [MatrixCommand::AllOn, MatrixCommand::AllOff] {
        let frame = frame.render(&mut XorShift32::new(0));
        if let Err(e) = matrix_driver.write(&frame) {
            println!("[LED] Startup flash failed: {:?}", e);
        }
        Timer::after(Duration::from_millis(STARTUP_FLASH_MS)).await;
    }

    loop {
        let command = commands.receive().await;
        // seeded on first use so the pattern depends on when the first request came in
        let rng = rng.get_or_insert_with(|| XorShift32::new(Instant::now().as_ticks() as u32));
        let frame: Frame = command.render(rng);
        match matrix_driver.write(&frame) {
            Ok(()) => println!("[LED] Matrix {:?}", command),
            Err(e) => println!("[LED] Matrix update failed: {:?}", e),
        }
    }
}

/// Mirrors the LED flag of the shared state on the GPIO
#[embassy_executor::task]
async fn led_task(mut led: Output<'static>, state: &'static SharedState) -> ! {
    loop {
        let on = state.lock().await.led_on;
        led.set_level(if on { Level::High } else { Level::Low });
        Timer::after(Duration::from_millis(50)).await;
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

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
    let matrix_driver = MatrixDriver::new(channel);

    let pull_up = InputConfig::default().with_pull(Pull::Up);
    let button_1 = Input::new(peripherals.GPIO5, pull_up);
    let button_2 = Input::new(peripherals.GPIO6, pull_up);
    let led = Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default());

    let state = STATE_CELL.init(Mutex::new(ControlState::new()));

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning web control tasks...");
        spawner.spawn(net_task(runner)).ok();
        spawner.spawn(wifi_task(wifi_manager, state)).ok();
        spawner
            .spawn(http_task(stack, state, MATRIX_COMMANDS.sender()))
            .ok();
        spawner
            .spawn(button_task(button_1, button_2, state, MATRIX_COMMANDS.sender()))
            .ok();
        spawner
            .spawn(matrix_task(matrix_driver, MATRIX_COMMANDS.receiver()))
            .ok();
        spawner.spawn(led_task(led, state)).ok();
    });
}
