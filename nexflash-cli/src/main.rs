//! nexflash CLI - Command-line tool for uploading firmware to HMI display panels.
//!
//! ## Features
//!
//! - Upload `.tft` firmware images with automatic baud rate discovery
//! - Probe which baud rate a panel is listening at
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use env_logger::Env;
use log::debug;
use nexflash::{DEFAULT_UPLOAD_BAUD, ErrorKind, UploadConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod serial;

use config::Config;
use serial::{SerialOptions, select_serial_port};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// nexflash - Upload firmware to serial HMI display panels.
///
/// Environment variables:
///   NEXFLASH_PORT              - Default serial port
///   NEXFLASH_BAUD              - Upload baud rate (default: 115200)
///   NEXFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "nexflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Config files: ./nexflash.toml, then the global nexflash/config.toml")]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "NEXFLASH_PORT")]
    port: Option<String>,

    /// Baud rate for the firmware transfer [default: 115200].
    #[arg(short, long, global = true, env = "NEXFLASH_BAUD")]
    baud: Option<u32>,

    /// Abort on the first packet that is not acknowledged.
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "NEXFLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a firmware image to the panel.
    Upload {
        /// Path to the firmware file.
        firmware: PathBuf,

        /// Print the upload report as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Find the baud rate the panel is listening at.
    Probe,

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Failures the CLI classifies itself.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing setup the user must fix.
    #[error("{0}")]
    Usage(String),
    /// Unusable configuration.
    #[error("{0}")]
    Config(String),
    /// The user backed out of a prompt.
    #[error("{0}")]
    Cancelled(String),
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => 2,
                CliError::Config(_) => 3,
                CliError::Cancelled(_) => 130,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<nexflash::Error>() {
            if lib_err.is_link_failure() || matches!(lib_err, nexflash::Error::Serial(_)) {
                return 4;
            }
            return match lib_err.kind() {
                ErrorKind::Config => 3,
                _ => 1,
            };
        }
    }
    1
}

impl Cli {
    /// Upload configuration from arguments, falling back to the config file.
    fn upload_config(&self, config: &Config) -> UploadConfig {
        let baud = self
            .baud
            .or(config
                .connection
                .baud)
            .unwrap_or(DEFAULT_UPLOAD_BAUD);
        let upload = UploadConfig::new(baud);
        if self.strict
            || config
                .upload
                .strict
        {
            upload.strict()
        } else {
            upload
        }
    }
}

/// Get serial port from CLI args, config, or interactive selection.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    let options = SerialOptions {
        port: cli
            .port
            .clone(),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options, config)
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "nexflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", console::style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)?
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Upload { firmware, json } => {
            commands::upload::cmd_upload(cli, &config, firmware, *json)?;
        },
        Commands::Probe => {
            commands::probe::cmd_probe(cli, &config)?;
        },
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(*json)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}
