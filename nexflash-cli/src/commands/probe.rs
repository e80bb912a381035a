//! Baud rate discovery without uploading.

use anyhow::{Context, Result};
use console::style;
use log::debug;
use nexflash::{BAUD_CANDIDATES, NativePort, Port, SerialConfig, Uploader};

use crate::config::Config;
use crate::{Cli, get_port};

/// Probe command implementation.
///
/// The panel is left running: no reset is sent.
pub(crate) fn cmd_probe(cli: &Cli, config: &Config) -> Result<()> {
    let port_name = get_port(cli, config)?;
    let port = NativePort::open(&SerialConfig::new(&port_name, BAUD_CANDIDATES[0]))
        .with_context(|| format!("Failed to open serial port {port_name}"))?;

    if !cli.quiet {
        eprintln!(
            "{} Probing {} at {} baud rates...",
            style("⏳").yellow(),
            style(&port_name).green(),
            BAUD_CANDIDATES.len()
        );
    }

    let mut uploader = Uploader::new(port, cli.upload_config(config));
    let found = uploader.connect();

    let mut port = uploader.into_port();
    if let Err(e) = port.close() {
        debug!("Closing {port_name} failed: {e}");
    }

    let baud = found.context("Probe failed")?;
    println!("{baud}");
    if !cli.quiet {
        eprintln!(
            "{} Panel answered at {} baud",
            style("✓").green(),
            style(baud).cyan().bold()
        );
    }

    Ok(())
}
