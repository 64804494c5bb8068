//! FX3 PPS service daemon (fx3ppsd)

use anyhow::{Context, Result};
use clap::Parser;
use fx3pps_service::{Cli, Daemon, ServiceConfig, UsbBackend, logging, shutdown_signal};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load_from_path(path).await?,
        None => ServiceConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&cli.log_filter(&config))?;
    config.validate().context("Invalid configuration")?;

    if cli.check_config {
        print!("{}", config.to_yaml().context("Cannot render configuration")?);
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        send_delay_ns = config.generator.send_delay_ns,
        chrony_socket = ?config.chrony_socket,
        "Starting fx3ppsd"
    );

    let backend = UsbBackend::new(config.usb, config.write_timeout());
    let detached = Daemon::new(backend, config).run(shutdown_signal()).await?;

    info!(devices = detached.len(), "fx3ppsd stopped");
    Ok(())
}
