//! Serial port selection.
//!
//! Resolution order:
//! - the port given with `--port` / `NEXFLASH_PORT`
//! - the port from the config file
//! - the only port present on the system
//! - an interactive choice via dialoguer (needs a terminal, refused in
//!   non-interactive mode)

use {
    crate::{CliError, config::Config},
    anyhow::{Context, Result},
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, info},
    nexflash::{NativePortEnumerator, PortEnumerator, PortInfo},
    std::{cmp::Ordering, io::IsTerminal},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail if the choice is ambiguous).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Pick a port name.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<String> {
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    if let Some(port_name) = &config
        .connection
        .serial
    {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;

    if options.non_interactive || ports.len() < 2 {
        return select_without_prompt(ports);
    }

    ensure_interactive_terminal()?;
    select_port_interactive(ports)
}

/// Choose deterministically: exactly one candidate is accepted.
fn select_without_prompt(ports: Vec<PortInfo>) -> Result<String> {
    match ports
        .len()
        .cmp(&1)
    {
        Ordering::Equal => {
            let port = ports
                .into_iter()
                .next()
                .ok_or_else(|| usage_err("No serial ports found"))?;
            info!("Auto-selected port: {}", port.name);
            Ok(port.name)
        },
        Ordering::Greater => Err(usage_err(
            "Found multiple serial ports; choose one with --port",
        )),
        Ordering::Less => Err(usage_err(
            "No serial ports found; connect the panel or pass --port",
        )),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "Port selection needs an interactive terminal; pass --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Port selection cancelled".to_string()).into()
            } else {
                usage_err("Port selection prompt failed")
            }
        },
    }
}

/// One selection line per port.
fn port_label(port: &PortInfo) -> String {
    let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };
    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{vid_pid}{product}", port.name)
}

/// Interactive port selection.
fn select_port_interactive(ports: Vec<PortInfo>) -> Result<String> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    // Truncate labels to fit the terminal width
    let term_width = console::Term::stderr()
        .size()
        .1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|p| console::truncate_str(&port_label(p), max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the panel's serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .map(|p| p.name)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("Port selection cancelled".to_string()).into()),
    }
}
