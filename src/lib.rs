//! Per-monitor brightness control for external displays.
//!
//! A background synchronizer thread keeps each monitor's slider position and
//! its physical brightness in agreement through the DDC/CI brightness
//! facility, bounding the hardware write rate regardless of how fast the
//! user drags. The GTK panel and the line-oriented one-shot binary both sit
//! on top of this library.

pub mod config;
pub mod sync;
pub mod system;
pub mod ui;
pub mod util;

pub use config::AppConfig;
pub use sync::{MonitorId, SyncHandle, UiEvent};
