use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::system::monitors::{DisplaySelector, MonitorBackend};

/// Stable handle addressing one monitor record for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(usize);

impl MonitorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// User interaction forwarded from the UI thread to the synchronizer.
#[derive(Debug)]
pub enum UiEvent {
    SliderMoved { monitor: MonitorId, value: u8 },
    ApplyAll { value: u8 },
}

/// Message-passing seam to the UI thread. The synchronizer never touches
/// widget state directly; it only sends these updates, and the UI thread is
/// the sole writer of its widgets.
pub trait PanelPipeline: Send {
    fn update_slider(&self, monitor: MonitorId, value: u8) -> Result<()>;
    fn update_readout(&self, monitor: MonitorId, value: u8) -> Result<()>;
}

/// One enumerated monitor. `applied` is the most recent value confirmed
/// written to hardware (initially the value read at enumeration); `desired`
/// is the latest slider position reported by the UI.
#[derive(Debug)]
pub struct MonitorRecord {
    pub id: MonitorId,
    pub selector: DisplaySelector,
    pub name: String,
    desired: u8,
    applied: u8,
    last_write: Option<Instant>,
}

impl MonitorRecord {
    pub fn desired(&self) -> u8 {
        self.desired
    }

    pub fn applied(&self) -> u8 {
        self.applied
    }
}

/// Queries the facility for connected displays and reads each one's current
/// brightness. A monitor whose read fails is logged and excluded for the
/// session; a facility-level failure yields an empty set. Selector
/// resolution (serial, or positional index when no serial is reported)
/// happens here, once.
pub fn enumerate<B: MonitorBackend>(backend: &B, config: &AppConfig) -> Vec<MonitorRecord> {
    let displays = match backend.list_displays() {
        Ok(displays) => displays,
        Err(err) => {
            warn!(error = %err, "monitor enumeration failed; no monitors will be controlled");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for disp in displays {
        if config.skip_displays.contains(&disp.name) {
            info!(monitor = %disp.name, "skipping monitor per configuration");
            continue;
        }
        if let Some(serial) = &config.display_serial {
            if disp.serial.as_deref() != Some(serial.as_str()) {
                continue;
            }
        }
        let selector = disp.selector();
        match backend.get_brightness(&selector) {
            Ok(value) => records.push(MonitorRecord {
                id: MonitorId(records.len()),
                selector,
                name: disp.name,
                desired: value,
                applied: value,
                last_write: None,
            }),
            Err(err) => {
                warn!(
                    monitor = %disp.name,
                    error = %err,
                    "failed to read brightness; excluding monitor"
                );
            }
        }
    }
    records
}

pub struct Synchronizer<B, P>
where
    B: MonitorBackend,
    P: PanelPipeline,
{
    backend: B,
    panel: P,
    records: Vec<MonitorRecord>,
    dwell: Duration,
}

impl<B, P> Synchronizer<B, P>
where
    B: MonitorBackend,
    P: PanelPipeline,
{
    pub fn new(backend: B, panel: P, records: Vec<MonitorRecord>, dwell: Duration) -> Self {
        Self {
            backend,
            panel,
            records,
            dwell,
        }
    }

    pub fn records(&self) -> &[MonitorRecord] {
        &self.records
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::SliderMoved { monitor, value } => {
                if let Some(record) = self.records.get_mut(monitor.index()) {
                    record.desired = value.min(100);
                }
            }
            UiEvent::ApplyAll { value } => {
                self.apply_global(value);
            }
        }
    }

    /// One synchronizer cycle. The readout always follows the slider
    /// position, even before a write is confirmed; hardware is written only
    /// when the position has moved away from the last applied value and the
    /// per-monitor dwell has elapsed. A failed write keeps `applied`
    /// unchanged, so the next cycle retries.
    pub fn cycle(&mut self) {
        let backend = &self.backend;
        let panel = &self.panel;
        let dwell = self.dwell;

        for record in &mut self.records {
            if let Err(err) = panel.update_readout(record.id, record.desired) {
                warn!(monitor = %record.name, error = %err, "failed to refresh readout");
            }

            if record.desired == record.applied {
                continue;
            }
            if let Some(last_write) = record.last_write {
                if last_write.elapsed() < dwell {
                    continue;
                }
            }

            match backend.set_brightness(record.desired, &record.selector) {
                Ok(()) => {
                    info!(
                        monitor = %record.name,
                        from = record.applied,
                        to = record.desired,
                        "brightness applied"
                    );
                    record.applied = record.desired;
                    record.last_write = Some(Instant::now());
                }
                Err(err) => {
                    warn!(
                        monitor = %record.name,
                        value = record.desired,
                        error = %err,
                        "failed to apply brightness"
                    );
                }
            }
        }
    }

    /// Broadcasts one value to every monitor, best effort: a failing monitor
    /// is logged and the remaining monitors still get their writes. Returns
    /// how many monitors were updated.
    pub fn apply_global(&mut self, value: u8) -> usize {
        if value > 100 {
            warn!(value, "rejecting global brightness outside 0-100");
            return 0;
        }

        let backend = &self.backend;
        let panel = &self.panel;
        let mut applied = 0;

        for record in &mut self.records {
            match backend.set_brightness(value, &record.selector) {
                Ok(()) => {
                    info!(
                        monitor = %record.name,
                        from = record.applied,
                        to = value,
                        "brightness applied"
                    );
                    record.desired = value;
                    record.applied = value;
                    record.last_write = Some(Instant::now());
                    applied += 1;
                    if let Err(err) = panel.update_slider(record.id, value) {
                        warn!(monitor = %record.name, error = %err, "failed to move slider");
                    }
                    if let Err(err) = panel.update_readout(record.id, value) {
                        warn!(monitor = %record.name, error = %err, "failed to refresh readout");
                    }
                }
                Err(err) => {
                    warn!(
                        monitor = %record.name,
                        value,
                        error = %err,
                        "failed to apply brightness"
                    );
                }
            }
        }
        applied
    }

    fn run(mut self, events: Receiver<UiEvent>, running: Arc<AtomicBool>, poll_interval: Duration) {
        let ticker = crossbeam_channel::tick(poll_interval);
        while running.load(Ordering::Relaxed) {
            crossbeam_channel::select! {
                recv(events) -> event => match event {
                    Ok(event) => self.handle_event(event),
                    Err(_) => {
                        warn!("ui event channel closed; stopping synchronizer");
                        break;
                    }
                },
                recv(ticker) -> _ => self.cycle(),
            }
        }
    }
}

/// Handle to the running synchronizer thread.
pub struct SyncHandle {
    events_tx: Sender<UiEvent>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Sender for UI callbacks to forward interaction events through.
    pub fn sender(&self) -> Sender<UiEvent> {
        self.events_tx.clone()
    }

    /// Signals the loop to terminate after its current cycle and waits for
    /// the thread to exit. No hardware write can occur once this returns.
    /// Safe to call from the UI shutdown path, and more than once.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("brightness synchronizer thread panicked");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the synchronizer on its own thread, separate from the UI event
/// loop, cycling at the configured poll interval.
pub fn start<B, P>(
    backend: B,
    panel: P,
    records: Vec<MonitorRecord>,
    config: &AppConfig,
) -> Result<SyncHandle>
where
    B: MonitorBackend + 'static,
    P: PanelPipeline + 'static,
{
    let (events_tx, events_rx) = unbounded();
    let running = Arc::new(AtomicBool::new(true));
    let synchronizer = Synchronizer::new(backend, panel, records, config.write_dwell());
    let poll_interval = config.poll_interval();
    let flag = Arc::clone(&running);

    let thread = thread::Builder::new()
        .name("brightness-sync".into())
        .spawn(move || synchronizer.run(events_rx, flag, poll_interval))
        .context("failed to spawn brightness synchronizer")?;

    Ok(SyncHandle {
        events_tx,
        running,
        thread: Some(thread),
    })
}
