//! Panel upload session.
//!
//! An [`Uploader`] owns the serial port for one transfer attempt and walks it
//! through the download sequence:
//!
//! 1. **Discovery**: probe [`BAUD_CANDIDATES`] until the panel answers
//!    `connect` with `comok`.
//! 2. **Handshake**: request download mode with `whmi-wri`, switch the local
//!    port to the upload baud rate and wait for the `0x05` token.
//! 3. **Transfer**: send the payload in 4096-byte packets, waiting for the
//!    token after each one.
//! 4. **Teardown**: let the panel settle, send `rest`, close the port.
//!
//! Payload can be pushed by the caller ([`Uploader::write`]) or pulled from a
//! [`ByteSource`] ([`Uploader::upload_from`]). Both feed the same packet
//! window and acknowledgment loop.
//!
//! Every wait is a polling loop against a deadline taken from
//! [`Instant::now`] when the wait starts. The yield hook runs on each
//! iteration so a cooperative host can schedule other work.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexflash::{NativePort, UploadConfig, Uploader, source::ReaderSource};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!     let source = ReaderSource::open("panel.tft")?;
//!
//!     let report = Uploader::new(port, UploadConfig::new(921600))
//!         .with_progress(|p| println!("{}/{}", p.sent, p.total))
//!         .upload(source)?;
//!
//!     println!("{}", report.status);
//!     Ok(())
//! }
//! ```

use crate::config::{AckPolicy, BAUD_CANDIDATES, READ_BUFFER_SIZE, UploadConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::port::Port;
use crate::protocol::{ACK_TOKEN, CONNECT_ACK, Command, PacketWindow, ResponseWindow};
use crate::source::{ByteSource, SourceLen};
use log::{debug, info, trace, warn};
use std::time::{Duration, Instant};

/// Status message after a successful upload.
pub const STATUS_OK: &str = "download ok";

/// Progress after an acknowledged packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Zero-based index of the packet just acknowledged.
    pub packet: usize,
    /// Payload bytes sent and acknowledged.
    pub sent: u32,
    /// Declared payload length.
    pub total: u32,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing sent yet.
    Idle,
    /// Baud rate discovered.
    Connected,
    /// Handshake accepted; payload may be sent.
    Downloading,
    /// Every declared byte sent and acknowledged.
    Completed,
    /// A fatal error ended the attempt.
    Failed(ErrorKind),
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UploadReport {
    /// Baud rate the panel answered at before the handshake.
    pub discovered_baud: u32,
    /// Baud rate the payload was sent at.
    pub upload_baud: u32,
    /// Payload bytes sent.
    pub bytes_sent: u32,
    /// Packets acknowledged.
    pub packets: usize,
    /// Final status message.
    pub status: String,
}

/// What a wait is looking for.
#[derive(Debug, Clone, Copy)]
enum Expect {
    /// The acknowledgment byte.
    Token,
    /// A text fragment.
    Text(&'static [u8]),
}

type ProgressHook = Box<dyn FnMut(Progress)>;
type YieldHook = Box<dyn FnMut()>;

/// One firmware transfer attempt over a serial port.
pub struct Uploader<P: Port> {
    port: P,
    config: UploadConfig,
    discovered_baud: Option<u32>,
    window: PacketWindow,
    timeouts: u32,
    state: SessionState,
    status: String,
    closed: bool,
    on_progress: Option<ProgressHook>,
    yield_point: YieldHook,
}

impl<P: Port> Uploader<P> {
    /// Create a session on an opened port.
    pub fn new(port: P, config: UploadConfig) -> Self {
        Self {
            port,
            config,
            discovered_baud: None,
            window: PacketWindow::default(),
            timeouts: 0,
            state: SessionState::Idle,
            status: String::new(),
            closed: false,
            on_progress: None,
            yield_point: Box::new(std::thread::yield_now),
        }
    }

    /// Call `hook` after every acknowledged packet.
    #[must_use]
    pub fn with_progress<F>(mut self, hook: F) -> Self
    where
        F: FnMut(Progress) + 'static,
    {
        self.on_progress = Some(Box::new(hook));
        self
    }

    /// Call `hook` on every iteration of every wait loop.
    #[must_use]
    pub fn with_yield_point<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.yield_point = Box::new(hook);
        self
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Consume the session and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Configuration in use.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Baud rate found by discovery.
    pub fn discovered_baud(&self) -> Option<u32> {
        self.discovered_baud
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Human-readable outcome of the last step.
    pub fn status_message(&self) -> &str {
        &self.status
    }

    /// Declared payload length (0 before the handshake).
    pub fn total_len(&self) -> u32 {
        self.window.total()
    }

    /// Payload bytes written so far.
    pub fn bytes_sent(&self) -> u32 {
        self.window.sent()
    }

    /// Bytes of the current packet written but not yet acknowledged.
    pub fn packet_fill(&self) -> usize {
        self.window.fill()
    }

    /// Packets acknowledged so far.
    pub fn packets_acked(&self) -> usize {
        self.window.index()
    }

    /// Whether teardown has closed the port.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Find the baud rate the panel is listening at.
    pub fn connect(&mut self) -> Result<u32> {
        self.ensure_state(&[SessionState::Idle, SessionState::Connected], "connect")?;
        let result = self.discover();
        self.record(result)
    }

    /// Discover the panel and enter download mode for `total_len` bytes.
    ///
    /// After this returns the payload is sent with [`Uploader::write`] or
    /// [`Uploader::upload_from`].
    pub fn prepare_upload(&mut self, total_len: u32) -> Result<()> {
        if self.discovered_baud.is_none() {
            self.connect()?;
        }
        self.ensure_state(&[SessionState::Connected], "prepare_upload")?;
        let result = self.handshake(total_len);
        self.record(result)
    }

    /// Push payload bytes.
    ///
    /// Buffers may be any size; packets are cut from the running byte count.
    /// The call returns once every byte of `data` has been written and each
    /// packet it completed has been acknowledged. On failure the session is
    /// left open; call [`Uploader::end`] to release the link.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_state(&[SessionState::Downloading, SessionState::Completed], "write")?;
        let result = self.push(data);
        self.record(result)
    }

    /// Pull the remaining payload from `source`, then tear down.
    ///
    /// Teardown runs whether the transfer succeeded or failed; the transfer
    /// error takes precedence over a teardown error.
    pub fn upload_from<S: ByteSource>(&mut self, mut source: S) -> Result<()> {
        self.ensure_state(
            &[SessionState::Downloading, SessionState::Completed],
            "upload_from",
        )?;
        let result = self.pull(&mut source);
        match self.record(result) {
            Ok(()) => self.end(),
            Err(e) => {
                if let Err(teardown) = self.end() {
                    debug!("Teardown after failure also failed: {teardown}");
                }
                Err(e)
            },
        }
    }

    /// Run the whole sequence with the length the source reports.
    pub fn upload<S: ByteSource>(self, mut source: S) -> Result<UploadReport> {
        match source.available() {
            SourceLen::Known(len) => self.upload_with_len(source, len),
            SourceLen::Unknown => Err(Error::Config(
                "payload length unknown; declare it with upload_with_len".into(),
            )),
        }
    }

    /// Run the whole sequence for a payload of `total_len` bytes.
    ///
    /// The session is consumed: a failed attempt is retried by building a
    /// new one.
    pub fn upload_with_len<S: ByteSource>(
        mut self,
        source: S,
        total_len: u32,
    ) -> Result<UploadReport> {
        if let Err(e) = self.prepare_upload(total_len) {
            if let Err(teardown) = self.end() {
                debug!("Teardown after failure also failed: {teardown}");
            }
            return Err(e);
        }
        self.upload_from(source)?;

        Ok(UploadReport {
            discovered_baud: self
                .discovered_baud
                .unwrap_or_default(),
            upload_baud: self
                .config
                .upload_baud,
            bytes_sent: self.window.sent(),
            packets: self.window.index(),
            status: self.status,
        })
    }

    /// Send the soft-reset instruction without closing the link.
    pub fn soft_reset(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("soft_reset after teardown".into()));
        }
        info!("Resetting panel...");
        self.send(Command::Reset)
    }

    /// Tear the session down.
    ///
    /// Waits for the panel to finish flashing, sends `rest` and closes the
    /// port. Later calls only reset the counters.
    pub fn end(&mut self) -> Result<()> {
        self.window
            .reset_fill();
        self.timeouts = 0;

        if self.closed {
            trace!("Teardown already done");
            return Ok(());
        }

        // Without a discovered baud rate nothing is listening for `rest`
        let reset = if self.discovered_baud.is_some() {
            self.settle(
                self.config
                    .timing
                    .teardown_settle,
            );
            self.send(Command::Reset)
        } else {
            Ok(())
        };
        let close = self.port.close();
        self.closed = true;

        match self.state {
            SessionState::Completed => self.status = STATUS_OK.to_string(),
            SessionState::Failed(_) => {},
            SessionState::Downloading => {
                self.status = format!(
                    "upload aborted after {} of {} bytes",
                    self.window.sent(),
                    self.window.total()
                );
            },
            SessionState::Idle | SessionState::Connected => {
                self.status = "closed before upload".to_string();
            },
        }
        debug!("Session closed: {}", self.status);

        reset.and(close)
    }

    fn discover(&mut self) -> Result<u32> {
        for &baud in &BAUD_CANDIDATES {
            if self.probe(baud)? {
                info!("Panel answered at {baud} baud");
                self.discovered_baud = Some(baud);
                self.state = SessionState::Connected;
                self.status = format!("connected at {baud} baud");
                return Ok(baud);
            }
        }
        Err(Error::BaudrateNotFound {
            tried: BAUD_CANDIDATES.len(),
        })
    }

    fn probe(&mut self, baud: u32) -> Result<bool> {
        trace!("Probing {baud} baud");
        self.port
            .set_baud_rate(baud)?;
        self.port
            .clear_input()?;
        self.send(Command::Empty)?;
        self.send(Command::Connect)?;

        let (found, reply) = self.wait_for(
            Expect::Text(CONNECT_ACK),
            self.config
                .timing
                .discovery_timeout,
        )?;
        if !found && !reply.is_empty() {
            trace!("No comok at {baud}: {:?}", reply.to_text());
        }
        Ok(found)
    }

    fn handshake(&mut self, total_len: u32) -> Result<()> {
        let baud = self
            .config
            .upload_baud;
        info!("Requesting download of {total_len} bytes at {baud} baud");

        self.send(Command::Empty)?;
        self.send(Command::Download {
            len: total_len,
            baud,
        })?;
        self.settle(
            self.config
                .timing
                .handshake_settle,
        );
        self.port
            .set_baud_rate(baud)?;

        let (found, _) = self.wait_for(
            Expect::Token,
            self.config
                .timing
                .handshake_timeout,
        )?;
        if !found {
            return Err(Error::HandshakeFailed { baud });
        }

        debug!("Download mode accepted");
        self.window = PacketWindow::new(total_len);
        self.timeouts = 0;
        self.state = if total_len == 0 {
            SessionState::Completed
        } else {
            SessionState::Downloading
        };
        self.status = format!("downloading at {baud} baud");
        Ok(())
    }

    fn push(&mut self, data: &[u8]) -> Result<()> {
        let remaining = self.window.remaining() as usize;
        if data.len() > remaining {
            return Err(Error::PayloadOverflow {
                declared: self.window.total(),
                offered: data.len() - remaining,
            });
        }

        let mut cursor = 0;
        while cursor < data.len() {
            let n = self
                .window
                .room()
                .min(data.len() - cursor);
            self.port
                .write_bytes(&data[cursor..cursor + n])?;
            self.window
                .advance(n);
            cursor += n;

            if self.window.is_complete() {
                self.await_packet_ack()?;
            }
        }

        if self.window.is_finished() {
            self.state = SessionState::Completed;
        }
        Ok(())
    }

    fn pull<S: ByteSource>(&mut self, source: &mut S) -> Result<()> {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        while !self.window.is_finished() {
            (self.yield_point)();
            if source.available() == SourceLen::Known(0) {
                break;
            }
            let want = READ_BUFFER_SIZE.min(self.window.remaining() as usize);
            let n = source.read(&mut buf[..want])?;
            if n == 0 {
                break;
            }
            self.push(&buf[..n])?;
        }

        if !self.window.is_finished() {
            return Err(Error::SourceExhaustedEarly {
                expected: self.window.total(),
                sent: self.window.sent(),
            });
        }
        self.state = SessionState::Completed;
        info!("Upload complete: {} bytes", self.window.sent());
        Ok(())
    }

    fn await_packet_ack(&mut self) -> Result<()> {
        let packet = self.window.index();
        let timeout = self
            .config
            .timing
            .packet_timeout;

        loop {
            let (found, reply) = self.wait_for(Expect::Token, timeout)?;
            if found {
                self.timeouts = 0;
                self.window
                    .acknowledge();
                debug!(
                    "Packet {packet} acknowledged ({}/{} bytes)",
                    self.window.sent(),
                    self.window.total()
                );
                let progress = Progress {
                    packet,
                    sent: self.window.sent(),
                    total: self.window.total(),
                };
                if let Some(hook) = self.on_progress.as_mut() {
                    hook(progress);
                }
                return Ok(());
            }

            match self
                .config
                .ack_policy
            {
                AckPolicy::Strict => {
                    return Err(Error::PacketRejected {
                        packet,
                        response: reply
                            .as_bytes()
                            .to_vec(),
                    });
                },
                AckPolicy::Retry { max_timeouts } => {
                    // The first wait is not a retry
                    if self.timeouts >= max_timeouts {
                        return Err(Error::LinkLost {
                            packet,
                            timeouts: self.timeouts,
                        });
                    }
                    self.timeouts += 1;
                    warn!(
                        "Timeout waiting for packet {packet} acknowledgment, retry {}/{max_timeouts}",
                        self.timeouts
                    );
                },
            }
        }
    }

    fn send(&mut self, cmd: Command) -> Result<()> {
        self.port
            .clear_input()?;
        debug!("Sending instruction {cmd}");
        self.port
            .write_bytes(&cmd.build())
    }

    /// Poll for `expect` until `timeout` elapses.
    ///
    /// NUL bytes are dropped; everything else lands in the returned window.
    /// The deadline holds even while the line keeps delivering bytes.
    fn wait_for(&mut self, expect: Expect, timeout: Duration) -> Result<(bool, ResponseWindow)> {
        let start = Instant::now();
        let mut reply = ResponseWindow::new();

        loop {
            while self.port.bytes_available()? > 0 {
                let Some(byte) = self.port.read_byte()? else {
                    break;
                };
                if !reply.push(byte) {
                    continue;
                }
                let hit = match expect {
                    Expect::Token => byte == ACK_TOKEN,
                    Expect::Text(text) => reply.ends_with(text),
                };
                if hit {
                    return Ok((true, reply));
                }
                if start.elapsed() >= timeout {
                    return Ok((false, reply));
                }
            }

            if start.elapsed() >= timeout {
                return Ok((false, reply));
            }
            (self.yield_point)();
        }
    }

    fn settle(&mut self, delay: Duration) {
        let start = Instant::now();
        while start.elapsed() < delay {
            (self.yield_point)();
        }
    }

    fn ensure_state(&self, allowed: &[SessionState], op: &str) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState(format!("{op} after teardown")));
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{op} not allowed in state {:?}",
                self.state
            )))
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("{e}");
            self.state = SessionState::Failed(e.kind());
            self.status = e.status_message();
        }
        result
    }
}
