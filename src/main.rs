use anyhow::Result;
use tracing::info;

use greenview::{commands, config::{self, Config}, telemetry};

fn main() -> Result<()> {
    let config = Config::load()?;
    telemetry::init(&config.log_level)?;
    info!(path = %config::config_path().display(), "loaded configuration");

    let output = commands::score::run(&config)?;
    println!("Wrote {}", output.display());
    Ok(())
}
