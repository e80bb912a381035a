//! Upload configuration.

use std::time::Duration;

/// Baud rates probed during discovery, in probe order.
pub const BAUD_CANDIDATES: [u32; 7] = [115200, 19200, 9600, 57600, 38400, 4800, 2400];

/// Default transfer baud rate.
pub const DEFAULT_UPLOAD_BAUD: u32 = 115200;

/// Bytes pulled from a [`crate::ByteSource`] per read.
pub const READ_BUFFER_SIZE: usize = 2048;

/// Timed-out acknowledgment waits retried per packet.
pub const DEFAULT_MAX_TIMEOUTS: u32 = 8;

/// How a missing packet acknowledgment is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Wait again after a timeout; give up with `LinkLost` when a wait times
    /// out after `max_timeouts` retries.
    Retry {
        /// Retries allowed after the first wait.
        max_timeouts: u32,
    },
    /// Any wait that ends without the token is `PacketRejected`.
    Strict,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self::Retry {
            max_timeouts: DEFAULT_MAX_TIMEOUTS,
        }
    }
}

/// Protocol timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait for `comok` at each candidate baud rate.
    pub discovery_timeout: Duration,
    /// Pause between the download request and the local baud switch.
    pub handshake_settle: Duration,
    /// Wait for the token after the baud switch.
    pub handshake_timeout: Duration,
    /// Wait for the token after each packet.
    pub packet_timeout: Duration,
    /// Pause before the soft reset at teardown.
    pub teardown_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_millis(500),
            handshake_settle: Duration::from_millis(50),
            handshake_timeout: Duration::from_millis(500),
            packet_timeout: Duration::from_millis(500),
            teardown_settle: Duration::from_millis(1600),
        }
    }
}

impl Timing {
    /// Use one duration for every wait and settle delay.
    pub fn uniform(d: Duration) -> Self {
        Self {
            discovery_timeout: d,
            handshake_settle: d,
            handshake_timeout: d,
            packet_timeout: d,
            teardown_settle: d,
        }
    }
}

/// Uploader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadConfig {
    /// Baud rate the payload is transferred at.
    pub upload_baud: u32,
    /// Acknowledgment failure handling.
    pub ack_policy: AckPolicy,
    /// Protocol timing.
    pub timing: Timing,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_BAUD)
    }
}

impl UploadConfig {
    /// Create a configuration transferring at `upload_baud`.
    pub fn new(upload_baud: u32) -> Self {
        Self {
            upload_baud,
            ack_policy: AckPolicy::default(),
            timing: Timing::default(),
        }
    }

    /// Set the acknowledgment policy.
    #[must_use]
    pub fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    /// Switch to fail-fast acknowledgment handling.
    #[must_use]
    pub fn strict(self) -> Self {
        self.with_ack_policy(AckPolicy::Strict)
    }

    /// Override protocol timing.
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}
