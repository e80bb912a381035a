//! # nexflash
//!
//! A library for uploading firmware to serial HMI display panels.
//!
//! The panel accepts a new firmware image over its UART once it has been
//! put into download mode. This crate drives that exchange:
//!
//! - baud rate discovery with the `connect` / `comok` identification
//! - the `whmi-wri` download handshake and the switch to the upload baud rate
//! - 4096-byte packets, each acknowledged by the panel before the next one
//! - soft reset and port release once the image is written
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//! - Anything else that can implement [`Port`]
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for reports and port listings
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexflash::{UploadConfig, source::ReaderSource};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         // Any baud rate works here; discovery reconfigures the port
//!         let port = nexflash::NativePort::open_simple("/dev/ttyUSB0", 115200)?;
//!         let firmware = ReaderSource::open("panel.tft")?;
//!
//!         let report = nexflash::upload_firmware(port, UploadConfig::new(921600), firmware)?;
//!         println!(
//!             "{} ({} bytes in {} packets)",
//!             report.status, report.bytes_sent, report.packets
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod port;
pub mod protocol;
pub mod source;
pub mod uploader;

#[cfg(test)]
mod testing;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    config::{AckPolicy, BAUD_CANDIDATES, DEFAULT_UPLOAD_BAUD, Timing, UploadConfig},
    error::{Error, ErrorKind, Result},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{Command, PACKET_SIZE},
    source::{ByteSource, ReaderSource, SliceSource, SourceLen},
    uploader::{Progress, STATUS_OK, SessionState, UploadReport, Uploader},
};

/// Upload a complete firmware image in one call.
///
/// Runs discovery, handshake, transfer and teardown on `port`. The payload
/// length is taken from `source`, which must report a known length.
pub fn upload_firmware<P, S>(port: P, config: UploadConfig, source: S) -> Result<UploadReport>
where
    P: Port,
    S: ByteSource,
{
    Uploader::new(port, config).upload(source)
}
