//! Serial channel abstraction.
//!
//! The transfer engine never touches a serial driver directly. It talks to a
//! [`Port`], which models the small set of operations the panel protocol
//! needs: reconfigure the baud rate, ask how many bytes are waiting, pull one
//! byte without blocking, push bytes out, and close.
//!
//! ```text
//! +------------------+
//! |     Uploader     |   discovery, handshake, packets, teardown
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Port trait    |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | NativePort       |
//! |   (serialport)   |
//! +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexflash::port::Port;
//!
//! fn drain<P: Port>(port: &mut P) -> nexflash::Result<Vec<u8>> {
//!     let mut out = Vec::new();
//!     while port.bytes_available()? > 0 {
//!         if let Some(b) = port.read_byte()? {
//!             out.push(b);
//!         }
//!     }
//!     Ok(out)
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate the port is opened at.
    pub baud_rate: u32,
    /// Driver-level read timeout for a single read call.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(10),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Serial channel the uploader drives.
///
/// Reads are non-blocking: callers check [`Port::bytes_available`] and poll
/// against their own deadline, so an implementation must never park the
/// thread waiting for data.
pub trait Port: Send {
    /// Reconfigure the link to a new baud rate.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Number of received bytes waiting to be read.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read one received byte, or `None` if nothing is waiting.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Write all bytes to the link.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Write a single byte.
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Discard what is currently waiting in the receive buffer.
    ///
    /// Only the bytes reported available on entry are read, so a line that
    /// keeps receiving cannot hold the call.
    fn clear_input(&mut self) -> Result<()> {
        for _ in 0..self.bytes_available()? {
            if self.read_byte()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Whether the port is still open.
    fn is_open(&self) -> bool;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_bytes(data)
    }

    fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
