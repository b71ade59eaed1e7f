#[cfg(feature = "gui")]
use anyhow::Result;

#[cfg(feature = "gui")]
fn main() -> Result<()> {
    init_tracing();

    let config = match monitor_ctrl::config::load_settings() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                error = %err,
                "failed to load monitor_ctrl configuration; using defaults"
            );
            monitor_ctrl::AppConfig::default()
        }
    };
    monitor_ctrl::ui::run(config)
}

#[cfg(not(feature = "gui"))]
fn main() {
    init_tracing();
    eprintln!(
        "monitor_ctrl was built without the `gui` feature. Enable it to open the brightness panel."
    );
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
