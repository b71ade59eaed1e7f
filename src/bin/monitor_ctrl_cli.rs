//! Line-oriented one-shot variant: prompts for a brightness value and
//! broadcasts it to every external monitor, best effort.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::warn;

use monitor_ctrl::AppConfig;
use monitor_ctrl::config;
use monitor_ctrl::system::monitors::{DdcutilBackend, MonitorBackend};
use monitor_ctrl::util::parse_brightness_input;

fn main() -> Result<()> {
    init_tracing();

    let config = match config::load_settings() {
        Ok(config) => config,
        Err(err) => {
            warn!(
                error = %err,
                "failed to load monitor_ctrl configuration; using defaults"
            );
            AppConfig::default()
        }
    };

    print!("Enter brightness value (0-100): ");
    io::stdout().flush().context("failed to flush prompt")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read brightness value")?;

    match parse_brightness_input(&line) {
        Ok(value) => {
            let backend = DdcutilBackend::new(config.hardware_timeout());
            set_external_brightness(&backend, &config, value);
        }
        Err(err) => println!("Error: {err}"),
    }
    Ok(())
}

fn set_external_brightness<B: MonitorBackend>(backend: &B, config: &AppConfig, value: u8) {
    let displays = match backend.list_displays() {
        Ok(displays) => displays,
        Err(err) => {
            warn!(error = %err, "monitor enumeration failed; nothing to set");
            return;
        }
    };

    for display in displays {
        if config.skip_displays.contains(&display.name) {
            continue;
        }
        if let Some(serial) = &config.display_serial {
            if display.serial.as_deref() != Some(serial.as_str()) {
                continue;
            }
        }
        match backend.set_brightness(value, &display.selector()) {
            Ok(()) => println!("Brightness set to {value} for monitor {}", display.name),
            Err(err) => println!("Error setting brightness for monitor {}: {err}", display.name),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();
}
