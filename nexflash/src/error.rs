//! Error types for nexflash.

use std::io;
use thiserror::Error;

/// Result type for nexflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for nexflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, firmware file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No candidate baud rate produced a `comok` identification response.
    #[error("get baudrate error: panel did not answer at any of {tried} baud rates")]
    BaudrateNotFound {
        /// Number of candidate rates probed.
        tried: usize,
    },

    /// The download-mode request was not acknowledged.
    #[error("modifybaudrate error: no acknowledgment after switching to {baud} baud")]
    HandshakeFailed {
        /// Target baud rate the link was switched to.
        baud: u32,
    },

    /// Packet acknowledgment timed out too many times in a row.
    #[error("download file error: packet {packet} not acknowledged after {timeouts} retries")]
    LinkLost {
        /// Zero-based packet index.
        packet: usize,
        /// Retried waits that also timed out.
        timeouts: u32,
    },

    /// The panel answered a packet with something other than the token (strict mode).
    #[error("download file error: packet {packet} rejected (response {response:02X?})")]
    PacketRejected {
        /// Zero-based packet index.
        packet: usize,
        /// NUL-filtered bytes received instead of the token.
        response: Vec<u8>,
    },

    /// The byte source ran dry before the declared length was sent.
    #[error("download file error: source ended after {sent} of {expected} bytes")]
    SourceExhaustedEarly {
        /// Declared payload length.
        expected: u32,
        /// Bytes actually sent.
        sent: u32,
    },

    /// More payload was pushed than the length announced in the handshake.
    #[error("download file error: {offered} bytes offered beyond the declared {declared}")]
    PayloadOverflow {
        /// Declared payload length.
        declared: u32,
        /// Bytes offered past the declared end.
        offered: usize,
    },

    /// Operation called out of lifecycle order.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-checkable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Host-side I/O or serial driver failure.
    Io,
    /// See [`Error::BaudrateNotFound`].
    BaudrateNotFound,
    /// See [`Error::HandshakeFailed`].
    HandshakeFailed,
    /// See [`Error::LinkLost`].
    LinkLost,
    /// See [`Error::PacketRejected`].
    PacketRejected,
    /// See [`Error::SourceExhaustedEarly`].
    SourceExhaustedEarly,
    /// See [`Error::PayloadOverflow`].
    PayloadOverflow,
    /// See [`Error::InvalidState`].
    InvalidState,
    /// See [`Error::Config`].
    Config,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            #[cfg(feature = "native")]
            Self::Serial(_) => ErrorKind::Io,
            Self::BaudrateNotFound { .. } => ErrorKind::BaudrateNotFound,
            Self::HandshakeFailed { .. } => ErrorKind::HandshakeFailed,
            Self::LinkLost { .. } => ErrorKind::LinkLost,
            Self::PacketRejected { .. } => ErrorKind::PacketRejected,
            Self::SourceExhaustedEarly { .. } => ErrorKind::SourceExhaustedEarly,
            Self::PayloadOverflow { .. } => ErrorKind::PayloadOverflow,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Status text a session reports after this error.
    pub fn status_message(&self) -> String {
        self.to_string()
    }

    /// Whether the failure happened on the panel side of the link.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BaudrateNotFound
                | ErrorKind::HandshakeFailed
                | ErrorKind::LinkLost
                | ErrorKind::PacketRejected
        )
    }
}
