use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed interval of the synchronizer cycle.
    pub poll_interval_ms: u64,
    /// Minimum gap between two hardware writes to the same monitor.
    pub write_dwell_ms: u64,
    /// Upper bound on a single ddcutil invocation.
    pub hardware_timeout_ms: u64,
    /// Display names that are never enumerated (e.g. a built-in panel that
    /// happens to answer DDC).
    pub skip_displays: Vec<String>,
    /// Restrict control to the monitor with this serial.
    pub display_serial: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            write_dwell_ms: 10,
            hardware_timeout_ms: 10_000,
            skip_displays: Vec::new(),
            display_serial: None,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn write_dwell(&self) -> Duration {
        Duration::from_millis(self.write_dwell_ms)
    }

    pub fn hardware_timeout(&self) -> Duration {
        Duration::from_millis(self.hardware_timeout_ms.max(1))
    }
}

/// Loads the first configuration file found on the candidate paths, falling
/// back to defaults when none exists. A file that exists but fails to parse
/// is an error; callers decide whether to fall back.
pub fn load_settings() -> Result<AppConfig> {
    for candidate in default_config_paths() {
        if !candidate.exists() {
            continue;
        }
        let contents = fs::read_to_string(&candidate).with_context(|| {
            format!(
                "failed to read monitor_ctrl configuration at {}",
                candidate.display()
            )
        })?;
        return parse_config(&contents).with_context(|| {
            format!(
                "failed to parse monitor_ctrl configuration at {}",
                candidate.display()
            )
        });
    }
    Ok(AppConfig::default())
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    serde_json::from_str(contents).context("configuration file is not valid JSON")
}

pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env::var_os("MONITOR_CTRL_CONFIG") {
        paths.push(PathBuf::from(explicit));
    }

    const CONFIG_NAME: &str = "monitor_ctrl.json";

    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("monitor_ctrl").join(CONFIG_NAME));
    }

    if let Some(home) = env::var_os("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config/monitor_ctrl")
                .join(CONFIG_NAME),
        );
    }

    paths.push(PathBuf::from(CONFIG_NAME));
    paths.push(PathBuf::from("config").join(CONFIG_NAME));

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn parses_full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor_ctrl.json");
        fs::write(
            &path,
            r#"{
                "poll_interval_ms": 25,
                "write_dwell_ms": 50,
                "hardware_timeout_ms": 2000,
                "skip_displays": ["Laptop screen"],
                "display_serial": "ABC123"
            }"#,
        )
        .unwrap();

        let config = parse_config(
            &fs::read_to_string(&path).expect("failed to read written config"),
        )
        .unwrap();

        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.write_dwell_ms, 50);
        assert_eq!(config.hardware_timeout_ms, 2000);
        assert_eq!(config.skip_displays, vec!["Laptop screen".to_string()]);
        assert_eq!(config.display_serial.as_deref(), Some("ABC123"));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = parse_config(r#"{ "write_dwell_ms": 50 }"#).unwrap();

        assert_eq!(config.write_dwell_ms, 50);
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.hardware_timeout_ms, 10_000);
        assert!(config.skip_displays.is_empty());
        assert!(config.display_serial.is_none());
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_config("poll_interval_ms = 10").is_err());
    }

    #[test]
    fn durations_never_collapse_to_zero() {
        let config =
            parse_config(r#"{ "poll_interval_ms": 0, "hardware_timeout_ms": 0 }"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.hardware_timeout(), Duration::from_millis(1));
        // A zero dwell is valid: every cycle may write.
        assert_eq!(
            parse_config(r#"{ "write_dwell_ms": 0 }"#)
                .unwrap()
                .write_dwell(),
            Duration::ZERO
        );
    }
}
