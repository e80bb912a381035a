//! Firmware upload command.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use nexflash::{
    BAUD_CANDIDATES, ByteSource, NativePort, ReaderSource, SerialConfig, SourceLen, UploadReport,
    Uploader,
};
use std::path::Path;

use crate::config::Config;
use crate::{Cli, get_port, use_fancy_output};

fn progress_bar(total: u32, hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(u64::from(total));
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr());
    Ok(pb)
}

/// Upload command implementation.
pub(crate) fn cmd_upload(cli: &Cli, config: &Config, firmware: &Path, json: bool) -> Result<()> {
    let mut source = ReaderSource::open(firmware)
        .with_context(|| format!("Failed to open firmware file {}", firmware.display()))?;
    let total = match source.available() {
        SourceLen::Known(len) => len,
        SourceLen::Unknown => 0,
    };
    let chatty = !cli.quiet && !json;

    if chatty {
        eprintln!(
            "{} Loaded {} ({} bytes)",
            style("📦").cyan(),
            firmware.display(),
            total
        );
    }

    let port_name = get_port(cli, config)?;
    let upload_config = cli.upload_config(config);
    if chatty {
        eprintln!(
            "{} Using port {} (upload at {} baud)",
            style("🔌").cyan(),
            style(&port_name).green(),
            upload_config.upload_baud
        );
    }

    // Discovery reconfigures the baud rate; open at the first candidate
    let port = NativePort::open(&SerialConfig::new(&port_name, BAUD_CANDIDATES[0]))
        .with_context(|| format!("Failed to open serial port {port_name}"))?;

    if chatty {
        eprintln!("{} Searching for the panel...", style("⏳").yellow());
    }

    let pb = progress_bar(total, !chatty || !use_fancy_output())?;
    let hook = pb.clone();

    let result = Uploader::new(port, upload_config)
        .with_progress(move |p| hook.set_position(u64::from(p.sent)))
        .upload(source);

    let report = match result {
        Ok(report) => {
            pb.finish_with_message("done");
            report
        },
        Err(err) => {
            pb.abandon();
            return Err(err).context("Upload failed");
        },
    };

    if json {
        println!("{}", report_json(&report)?);
    } else if !cli.quiet {
        eprintln!(
            "\n{} {}: {} bytes in {} packets (panel found at {} baud)",
            style("🎉").green().bold(),
            report.status,
            report.bytes_sent,
            report.packets,
            report.discovered_baud
        );
    }

    Ok(())
}

fn report_json(report: &UploadReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize upload report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_fields() {
        let report = UploadReport {
            discovered_baud: 9600,
            upload_baud: 921600,
            bytes_sent: 10000,
            packets: 3,
            status: nexflash::STATUS_OK.to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(value["discovered_baud"], 9600);
        assert_eq!(value["upload_baud"], 921600);
        assert_eq!(value["bytes_sent"], 10000);
        assert_eq!(value["packets"], 3);
        assert_eq!(value["status"], "download ok");
    }

    #[test]
    fn test_hidden_progress_bar() {
        let pb = progress_bar(100, true).unwrap();
        assert!(pb.is_hidden());
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = progress_bar(8192, false).unwrap();
        assert_eq!(pb.length(), Some(8192));
    }
}
