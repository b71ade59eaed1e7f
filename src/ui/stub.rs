use anyhow::{Result, bail};

use crate::config::AppConfig;

pub fn run(_config: AppConfig) -> Result<()> {
    bail!("gui support disabled. Enable the `gui` feature to open the brightness panel.")
}
