use std::collections::HashMap;

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use gtk::gdk;
use gtk::prelude::*;
use gtk::{
    Application, ApplicationWindow, Box as GtkBox, Entry, EventControllerKey, Label, Orientation,
    Scale, Separator,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::sync::{self, MonitorId, PanelPipeline, UiEvent};
use crate::system::monitors::DdcutilBackend;
use crate::util::parse_brightness_input;

const APP_ID: &str = "dev.monitorctl.panel";

/// Widget updates marshalled from the synchronizer thread onto the GTK main
/// loop. The pump in `build_ui` is the only writer of slider and readout
/// state from this side.
#[derive(Debug)]
enum PanelCommand {
    SetSlider { monitor: MonitorId, value: u8 },
    SetReadout { monitor: MonitorId, value: u8 },
}

#[derive(Clone)]
struct PanelHandle {
    commands: async_channel::Sender<PanelCommand>,
}

impl PanelPipeline for PanelHandle {
    fn update_slider(&self, monitor: MonitorId, value: u8) -> Result<()> {
        self.commands
            .send_blocking(PanelCommand::SetSlider { monitor, value })
            .map_err(|err| anyhow!("panel command channel closed: {err}"))
    }

    fn update_readout(&self, monitor: MonitorId, value: u8) -> Result<()> {
        self.commands
            .send_blocking(PanelCommand::SetReadout { monitor, value })
            .map_err(|err| anyhow!("panel command channel closed: {err}"))
    }
}

#[derive(Clone)]
struct MonitorRow {
    id: MonitorId,
    name: String,
    brightness: u8,
}

/// Enumerates monitors, starts the synchronizer thread and runs the GTK
/// panel on the calling thread until the window is closed.
pub fn run(config: AppConfig) -> Result<()> {
    let backend = DdcutilBackend::new(config.hardware_timeout());
    if !backend.is_available() {
        warn!("ddcutil not found; no monitors will be detected");
    }

    let records = sync::enumerate(&backend, &config);
    let rows: Vec<MonitorRow> = records
        .iter()
        .map(|record| MonitorRow {
            id: record.id,
            name: record.name.clone(),
            brightness: record.applied(),
        })
        .collect();

    let (command_tx, command_rx) = async_channel::unbounded();
    let panel = PanelHandle {
        commands: command_tx,
    };
    let mut handle = sync::start(backend, panel, records, &config)?;
    let events_tx = handle.sender();

    let app = Application::builder().application_id(APP_ID).build();
    app.connect_activate(move |app| {
        build_ui(app, &rows, events_tx.clone(), command_rx.clone());
    });
    // Run without forwarding process arguments so GTK does not try to parse
    // them.
    let _ = app.run_with_args::<&str>(&[]);

    handle.stop();
    Ok(())
}

fn build_ui(
    app: &Application,
    rows: &[MonitorRow],
    events: Sender<UiEvent>,
    commands: async_channel::Receiver<PanelCommand>,
) {
    let window = ApplicationWindow::builder()
        .application(app)
        .title("Monitor Brightness")
        .default_width(480)
        .build();

    let vbox = GtkBox::new(Orientation::Vertical, 8);
    vbox.set_margin_top(12);
    vbox.set_margin_bottom(12);
    vbox.set_margin_start(12);
    vbox.set_margin_end(12);

    let mut widgets: HashMap<MonitorId, (Scale, Label)> = HashMap::new();

    if rows.is_empty() {
        vbox.append(&Label::new(Some("No monitors detected")));
    }

    for row in rows {
        let name = Label::new(Some(row.name.as_str()));
        name.set_xalign(0.0);

        let scale = Scale::with_range(Orientation::Horizontal, 0.0, 100.0, 1.0);
        scale.set_value(f64::from(row.brightness));
        scale.set_hexpand(true);

        let readout = Label::new(Some(readout_text(row.brightness).as_str()));
        readout.set_xalign(0.0);

        let monitor = row.id;
        let slider_events = events.clone();
        scale.connect_value_changed(move |scale| {
            let value = scale.value().round().clamp(0.0, 100.0) as u8;
            slider_events
                .send(UiEvent::SliderMoved { monitor, value })
                .ok();
        });

        vbox.append(&name);
        vbox.append(&scale);
        vbox.append(&readout);
        vbox.append(&Separator::new(Orientation::Horizontal));
        widgets.insert(row.id, (scale, readout));
    }

    let broadcast_row = GtkBox::new(Orientation::Horizontal, 8);
    broadcast_row.append(&Label::new(Some("Set all monitors:")));
    let entry = Entry::new();
    entry.set_placeholder_text(Some("0-100"));
    entry.set_hexpand(true);
    broadcast_row.append(&entry);
    vbox.append(&broadcast_row);

    let status = Label::new(None);
    status.set_xalign(0.0);
    vbox.append(&status);

    let entry_events = events.clone();
    let entry_status = status.clone();
    entry.connect_activate(move |entry| match parse_brightness_input(&entry.text()) {
        Ok(value) => {
            entry_status.set_text("");
            entry_events.send(UiEvent::ApplyAll { value }).ok();
        }
        Err(err) => {
            warn!(input = %entry.text(), error = %err, "rejected brightness input");
            entry_status.set_text(&format!("Error: {err}"));
        }
    });

    let keys = EventControllerKey::new();
    let key_window = window.clone();
    keys.connect_key_pressed(move |_, key, _, _| {
        if key == gdk::Key::Escape || key == gdk::Key::q {
            key_window.close();
            return glib::Propagation::Stop;
        }
        glib::Propagation::Proceed
    });
    window.add_controller(keys);

    glib::spawn_future_local(async move {
        while let Ok(command) = commands.recv().await {
            match command {
                PanelCommand::SetSlider { monitor, value } => {
                    if let Some((scale, _)) = widgets.get(&monitor) {
                        scale.set_value(f64::from(value));
                    }
                }
                PanelCommand::SetReadout { monitor, value } => {
                    if let Some((_, readout)) = widgets.get(&monitor) {
                        readout.set_text(&readout_text(value));
                    }
                }
            }
        }
    });

    window.set_child(Some(&vbox));
    window.present();
}

fn readout_text(value: u8) -> String {
    format!("Current Brightness: {value}%")
}
