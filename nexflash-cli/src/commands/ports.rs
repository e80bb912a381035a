//! Serial port listing.

use anyhow::{Context, Result};
use console::style;
use nexflash::{NativePortEnumerator, PortEnumerator, PortInfo};

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;

    if json {
        println!("{}", ports_json(&ports)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{vid_pid}{product}",
            style("•").green(),
            style(&port.name).cyan()
        );
    }

    if let [only] = ports.as_slice() {
        eprintln!(
            "\n{} {} will be used when no port is given",
            style("→").green().bold(),
            style(&only.name).cyan().bold()
        );
    }

    Ok(())
}

fn ports_json(ports: &[PortInfo]) -> Result<String> {
    serde_json::to_string_pretty(ports).context("Failed to serialize port list")
}
