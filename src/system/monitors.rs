use std::fmt;
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{RecvTimeoutError, bounded};
use once_cell::sync::Lazy;
use regex::Regex;

static DDCUTIL_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    Command::new("ddcutil")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
});

/// How a monitor is addressed on the wire: by the serial it reported, or by
/// its positional display number when no serial is available. Resolved once
/// at enumeration and stored on the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySelector {
    Serial(String),
    Index(u8),
}

impl fmt::Display for DisplaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(serial) => write!(f, "serial {serial}"),
            Self::Index(index) => write!(f, "display {index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub index: u8,
    pub name: String,
    pub serial: Option<String>,
}

impl DisplayInfo {
    pub fn selector(&self) -> DisplaySelector {
        match &self.serial {
            Some(serial) => DisplaySelector::Serial(serial.clone()),
            None => DisplaySelector::Index(self.index),
        }
    }
}

pub trait MonitorBackend: Send {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>>;
    fn get_brightness(&self, display: &DisplaySelector) -> Result<u8>;
    fn set_brightness(&self, value: u8, display: &DisplaySelector) -> Result<()>;
    fn is_available(&self) -> bool {
        true
    }
}

/// Backend over the `ddcutil` CLI (DDC/CI VCP feature 0x10). Every
/// invocation is bounded by a timeout; a timed-out call fails like any other
/// and never takes the backend down with it.
#[derive(Debug, Clone)]
pub struct DdcutilBackend {
    timeout: Duration,
}

impl Default for DdcutilBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl DdcutilBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn is_available(&self) -> bool {
        *DDCUTIL_AVAILABLE
    }

    fn run_ddcutil(&self, args: Vec<String>) -> Result<String> {
        if !self.is_available() {
            bail!("ddcutil not available");
        }

        let label = args.first().cloned().unwrap_or_default();
        let (tx, rx) = bounded(1);
        thread::Builder::new()
            .name(format!("ddcutil-{label}"))
            .spawn(move || {
                let _ = tx.send(run_ddcutil_blocking(&args));
            })
            .context("failed to spawn ddcutil worker")?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                bail!("ddcutil {label} timed out after {:?}", self.timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                bail!("ddcutil {label} worker exited without a result")
            }
        }
    }
}

fn run_ddcutil_blocking(args: &[String]) -> Result<String> {
    let output = Command::new("ddcutil")
        .args(args)
        .output()
        .with_context(|| format!("failed to execute ddcutil with args {args:?}"))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ddcutil exited with {code}: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn selector_args(display: &DisplaySelector) -> [String; 2] {
    match display {
        DisplaySelector::Serial(serial) => ["--sn".into(), serial.clone()],
        DisplaySelector::Index(index) => ["--display".into(), index.to_string()],
    }
}

impl MonitorBackend for DdcutilBackend {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>> {
        let output = self.run_ddcutil(vec!["detect".into(), "--terse".into()])?;
        Ok(parse_detect_output(&output))
    }

    fn get_brightness(&self, display: &DisplaySelector) -> Result<u8> {
        let mut args = vec!["getvcp".into(), "10".into()];
        args.extend(selector_args(display));
        let output = self.run_ddcutil(args)?;
        parse_current_brightness(&output)
            .ok_or_else(|| anyhow!("unable to parse brightness from ddcutil output: {output}"))
    }

    fn set_brightness(&self, value: u8, display: &DisplaySelector) -> Result<()> {
        let mut args = vec!["setvcp".into(), "10".into(), value.min(100).to_string()];
        args.extend(selector_args(display));
        self.run_ddcutil(args).map(|_| ())
    }

    fn is_available(&self) -> bool {
        DdcutilBackend::is_available(self)
    }
}

/// Parses `ddcutil detect --terse` output. Sections start with
/// `Display <n>`; the `Monitor:` line carries `MFG:MODEL:SERIAL`, any field
/// of which may be empty. Sections without a display number (e.g.
/// `Invalid display`) are skipped.
fn parse_detect_output(output: &str) -> Vec<DisplayInfo> {
    static DISPLAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Display\s+(\d+)").unwrap());
    static MONITOR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"Monitor:\s*([^:]*):([^:]*):(.*)$").unwrap());

    let mut displays = Vec::new();
    let mut current: Option<DisplayInfo> = None;
    for line in output.lines() {
        if let Some(captures) = DISPLAY_RE.captures(line) {
            if let Some(display) = current.take() {
                displays.push(display);
            }
            let index = captures[1].parse().unwrap_or(0);
            current = Some(DisplayInfo {
                index,
                name: format!("Display {index}"),
                serial: None,
            });
            continue;
        }
        if let Some(captures) = MONITOR_RE.captures(line) {
            if let Some(display) = current.as_mut() {
                let model = captures[2].trim();
                let mfg = captures[1].trim();
                if !model.is_empty() {
                    display.name = model.to_string();
                } else if !mfg.is_empty() {
                    display.name = mfg.to_string();
                }
                let serial = captures[3].trim();
                if !serial.is_empty() {
                    display.serial = Some(serial.to_string());
                }
            }
        }
    }
    if let Some(display) = current.take() {
        displays.push(display);
    }
    displays
}

/// Extracts the current brightness from `ddcutil getvcp` output. A reading
/// that reports several values is normalized to its first one.
fn parse_current_brightness(output: &str) -> Option<u8> {
    static VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"current value\s*=\s*(\d+)").unwrap());

    let captures = VALUE_RE.captures_iter(output).next()?;
    let value: u16 = captures[1].parse().ok()?;
    Some(value.min(100) as u8)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockMonitorBackend {
        pub inner: Arc<Mutex<MockMonitorState>>,
    }

    #[derive(Debug, Default)]
    pub struct MockMonitorState {
        pub displays: Vec<MockDisplay>,
        pub history: Vec<(DisplaySelector, u8)>,
        pub fail_listing: bool,
    }

    #[derive(Debug, Clone)]
    pub struct MockDisplay {
        pub info: DisplayInfo,
        pub level: u8,
        pub fail_reads: bool,
        pub fail_writes: bool,
    }

    pub fn display(index: u8, name: &str, serial: Option<&str>, level: u8) -> MockDisplay {
        MockDisplay {
            info: DisplayInfo {
                index,
                name: name.to_string(),
                serial: serial.map(str::to_string),
            },
            level,
            fail_reads: false,
            fail_writes: false,
        }
    }

    impl MockMonitorBackend {
        pub fn with_displays(displays: Vec<MockDisplay>) -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockMonitorState {
                    displays,
                    history: Vec::new(),
                    fail_listing: false,
                })),
            }
        }

        pub fn level_of(&self, selector: &DisplaySelector) -> Option<u8> {
            let state = self.inner.lock().unwrap();
            state
                .displays
                .iter()
                .find(|display| display.info.selector() == *selector)
                .map(|display| display.level)
        }

        pub fn write_count(&self) -> usize {
            self.inner.lock().unwrap().history.len()
        }
    }

    impl MonitorBackend for MockMonitorBackend {
        fn list_displays(&self) -> Result<Vec<DisplayInfo>> {
            let state = self.inner.lock().unwrap();
            if state.fail_listing {
                bail!("facility unreachable");
            }
            Ok(state
                .displays
                .iter()
                .map(|display| display.info.clone())
                .collect())
        }

        fn get_brightness(&self, selector: &DisplaySelector) -> Result<u8> {
            let state = self.inner.lock().unwrap();
            let display = state
                .displays
                .iter()
                .find(|display| display.info.selector() == *selector)
                .ok_or_else(|| anyhow!("no such display: {selector}"))?;
            if display.fail_reads {
                bail!("read failed for {selector}");
            }
            Ok(display.level)
        }

        fn set_brightness(&self, value: u8, selector: &DisplaySelector) -> Result<()> {
            let mut state = self.inner.lock().unwrap();
            let display = state
                .displays
                .iter_mut()
                .find(|display| display.info.selector() == *selector)
                .ok_or_else(|| anyhow!("no such display: {selector}"))?;
            if display.fail_writes {
                bail!("write failed for {selector}");
            }
            display.level = value;
            state.history.push((selector.clone(), value));
            Ok(())
        }
    }

    #[test]
    fn parses_terse_detect_output() {
        let output = "\
Display 1
   I2C bus:  /dev/i2c-4
   Monitor:  DEL:DELL U2720Q:ABC123

Display 2
   I2C bus:  /dev/i2c-5
   Monitor:  GSM:LG HDR 4K:

Invalid display
   I2C bus:  /dev/i2c-6
";
        let displays = parse_detect_output(output);
        assert_eq!(
            displays,
            vec![
                DisplayInfo {
                    index: 1,
                    name: "DELL U2720Q".to_string(),
                    serial: Some("ABC123".to_string()),
                },
                DisplayInfo {
                    index: 2,
                    name: "LG HDR 4K".to_string(),
                    serial: None,
                },
            ]
        );
    }

    #[test]
    fn detect_falls_back_to_positional_name() {
        let displays = parse_detect_output("Display 3\n   I2C bus:  /dev/i2c-7\n");
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].name, "Display 3");
        assert_eq!(displays[0].selector(), DisplaySelector::Index(3));
    }

    #[test]
    fn serial_wins_over_index_in_selector() {
        let info = DisplayInfo {
            index: 1,
            name: "DELL U2720Q".to_string(),
            serial: Some("ABC123".to_string()),
        };
        assert_eq!(
            info.selector(),
            DisplaySelector::Serial("ABC123".to_string())
        );
    }

    #[test]
    fn parses_current_brightness() {
        let output = "VCP code 0x10 (Brightness): current value =    50, max value =   100\n";
        assert_eq!(parse_current_brightness(output), Some(50));
    }

    #[test]
    fn multi_value_reading_normalizes_to_first() {
        let output = "\
VCP code 0x10 (Brightness): current value = 40, max value = 100
VCP code 0x10 (Brightness): current value = 70, max value = 100
";
        assert_eq!(parse_current_brightness(output), Some(40));
    }

    #[test]
    fn out_of_scale_reading_is_clamped() {
        let output = "VCP code 0x10 (Brightness): current value = 255, max value = 255\n";
        assert_eq!(parse_current_brightness(output), Some(100));
    }

    #[test]
    fn unparsable_reading_is_none() {
        assert_eq!(parse_current_brightness("No value returned\n"), None);
    }
}
