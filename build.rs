fn main() {
    let firmware = std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none");

    // The linker re-runs this script with `<kind> <symbol>` on link errors;
    // linker_be_nice() exits in that case.
    if firmware || std::env::args().len() > 2 {
        linker_be_nice();
    }

    load_env_config();

    // Host builds only compile the library for unit tests.
    if firmware {
        // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
        println!("cargo:rustc-link-arg=-Tlinkall.x");
    }
}

/// Load environment configuration from .env file
/// Environment variables take priority over .env file values
fn load_env_config() {
    use std::path::Path;

    println!("cargo:rerun-if-changed=.env");
    for key in [
        "WIFI_SSID",
        "WIFI_PASSWORD",
        "REPORT_SERVER_IP",
        "REPORT_SERVER_PORT",
    ] {
        println!("cargo:rerun-if-env-changed={}", key);
    }

    // dotenvy never overrides variables that are already set
    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => println!("cargo:warning=Loaded .env file"),
            Err(e) => println!("cargo:warning=Failed to load .env file: {}", e),
        }
    }

    let wifi_ssid = read_var("WIFI_SSID", "");
    let wifi_password = read_var("WIFI_PASSWORD", "");
    let server_ip = read_var("REPORT_SERVER_IP", "192.168.1.100");
    let server_port = read_var("REPORT_SERVER_PORT", "5000");

    if server_port.parse::<u16>().map_or(true, |port| port == 0) {
        panic!("REPORT_SERVER_PORT must be a port number between 1 and 65535, got {:?}", server_port);
    }

    println!("cargo:rustc-env=WIFI_SSID={}", wifi_ssid);
    println!("cargo:rustc-env=WIFI_PASSWORD={}", wifi_password);
    println!("cargo:rustc-env=REPORT_SERVER_IP={}", server_ip);
    println!("cargo:rustc-env=REPORT_SERVER_PORT={}", server_port);

    if wifi_ssid.is_empty() {
        println!("cargo:warning=WIFI_SSID is empty - WiFi will not be configured");
    } else {
        println!("cargo:warning=WIFI_SSID configured: {}", wifi_ssid);
    }

    if wifi_password.is_empty() {
        println!("cargo:warning=WIFI_PASSWORD is empty - WiFi will not be configured");
    } else {
        println!("cargo:warning=WIFI_PASSWORD configured (length: {})", wifi_password.len());
    }

    println!("cargo:warning=Report server: {}:{}", server_ip, server_port);
}

/// Reads a variable, treating unset and blank values alike
fn read_var(key: &str, default: &str) -> String {
    let value = std::env::var(key).unwrap_or_default().trim().to_string();
    if value.is_empty() { default.to_string() } else { value }
}

fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_wifi_preempt_enable"
                | "esp_wifi_preempt_yield_task"
                | "esp_wifi_preempt_task_create" => {
                    eprintln!();
                    eprintln!("💡 `esp-wifi` has no scheduler enabled. Make sure you have the `builtin-scheduler` feature enabled, or that you provide an external scheduler.");
                    eprintln!();
                }
                _ => (),
            },
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
