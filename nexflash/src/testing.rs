//! Scripted panel for exercising the uploader without hardware.
//!
//! [`SimulatedPanel`] implements [`Port`] and plays the panel side of the
//! protocol: it answers `connect` only at the baud rate it listens at,
//! accepts `whmi-wri` and acknowledges once the host switches to the
//! requested baud rate, then collects payload packets and replies to each
//! one according to a script. A [`PanelProbe`] shares its state so tests can
//! inspect the wire after the port has been moved into an uploader.

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::{ACK_TOKEN, PACKET_SIZE, TERMINATOR};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Route library logs to the test harness; set `RUST_LOG` to see them.
pub(crate) fn init_logs() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

const IDENT_REPLY: &[u8] = b"comok 1,30601-0,NX4832T035_011R,52,61488,D264B8204F0E1828,16777216";

/// How the panel answers a completed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PacketReply {
    Ack,
    Silent,
    Noise(Vec<u8>),
    NoiseThenAck(Vec<u8>),
    /// Token becomes readable only after the delay.
    AckAfter(Duration),
}

type ReplyScript = Box<dyn FnMut(usize) -> PacketReply + Send>;

struct PanelState {
    listen_baud: Option<u32>,
    handshake_ack: bool,
    nul_padded_ident: bool,
    port_baud: u32,
    open: bool,
    baud_changes: Vec<u32>,
    rx: VecDeque<u8>,
    delayed_ack: Option<Instant>,
    frame: Vec<u8>,
    commands: Vec<(u32, String)>,
    pending_download: Option<(u32, u32)>,
    download_remaining: Option<u32>,
    fill: usize,
    awaiting_ack: bool,
    bytes_while_awaiting: usize,
    payload: Vec<u8>,
    packet_sizes: Vec<usize>,
    resets: usize,
    closes: usize,
    script: ReplyScript,
}

impl PanelState {
    fn receive(&mut self, byte: u8) {
        if let Some(remaining) = self.download_remaining {
            if self.awaiting_ack {
                self.bytes_while_awaiting += 1;
                return;
            }
            self.payload.push(byte);
            self.fill += 1;
            let remaining = remaining - 1;
            self.download_remaining = Some(remaining);

            if self.fill == PACKET_SIZE || remaining == 0 {
                self.packet_sizes.push(self.fill);
                self.fill = 0;
                self.awaiting_ack = true;
                let reply = (self.script)(self.packet_sizes.len() - 1);
                self.reply(reply);
                if remaining == 0 {
                    self.download_remaining = None;
                }
            }
            return;
        }

        self.frame.push(byte);
        if self.frame.ends_with(&TERMINATOR) {
            let len = self.frame.len() - TERMINATOR.len();
            let text = String::from_utf8_lossy(&self.frame[..len]).into_owned();
            self.frame.clear();
            if !text.is_empty() {
                self.command(text);
            }
        }
    }

    fn command(&mut self, text: String) {
        let understood = self.listen_baud == Some(self.port_baud);
        if understood {
            if text == "connect" {
                for &byte in IDENT_REPLY {
                    self.rx.push_back(byte);
                    if self.nul_padded_ident {
                        self.rx.push_back(0);
                    }
                }
                self.rx.extend(TERMINATOR);
            } else if text == "rest" {
                self.resets += 1;
            } else if let Some(args) = text.strip_prefix("whmi-wri ") {
                let mut parts = args.split(',');
                let len = parts.next().and_then(|v| v.parse().ok());
                let baud = parts.next().and_then(|v| v.parse().ok());
                if let (Some(len), Some(baud), true) = (len, baud, self.handshake_ack) {
                    self.pending_download = Some((len, baud));
                    self.listen_baud = Some(baud);
                }
            }
        }
        self.commands.push((self.port_baud, text));
    }

    fn reply(&mut self, reply: PacketReply) {
        match reply {
            PacketReply::Ack => self.rx.push_back(ACK_TOKEN),
            PacketReply::Silent => {},
            PacketReply::Noise(bytes) => self.rx.extend(bytes),
            PacketReply::NoiseThenAck(bytes) => {
                self.rx.extend(bytes);
                self.rx.push_back(ACK_TOKEN);
            },
            PacketReply::AckAfter(delay) => self.delayed_ack = Some(Instant::now() + delay),
        }
    }
}

/// Panel double implementing [`Port`].
pub(crate) struct SimulatedPanel {
    state: Arc<Mutex<PanelState>>,
}

/// Read-only view of a [`SimulatedPanel`]'s state.
#[derive(Clone)]
pub(crate) struct PanelProbe {
    state: Arc<Mutex<PanelState>>,
}

impl SimulatedPanel {
    /// Panel that answers `connect` at `baud` and acknowledges every packet.
    pub(crate) fn listening_at(baud: u32) -> (Self, PanelProbe) {
        Self::build(Some(baud))
    }

    /// Panel that never answers.
    pub(crate) fn silent() -> (Self, PanelProbe) {
        Self::build(None)
    }

    fn build(listen_baud: Option<u32>) -> (Self, PanelProbe) {
        let state = Arc::new(Mutex::new(PanelState {
            listen_baud,
            handshake_ack: true,
            nul_padded_ident: false,
            port_baud: 9600,
            open: true,
            baud_changes: Vec::new(),
            rx: VecDeque::new(),
            delayed_ack: None,
            frame: Vec::new(),
            commands: Vec::new(),
            pending_download: None,
            download_remaining: None,
            fill: 0,
            awaiting_ack: false,
            bytes_while_awaiting: 0,
            payload: Vec::new(),
            packet_sizes: Vec::new(),
            resets: 0,
            closes: 0,
            script: Box::new(|_| PacketReply::Ack),
        }));
        let probe = PanelProbe {
            state: Arc::clone(&state),
        };
        (Self { state }, probe)
    }

    /// Ignore download requests.
    pub(crate) fn without_handshake_ack(self) -> Self {
        self.lock().handshake_ack = false;
        self
    }

    /// Follow every byte of the `comok` reply with a NUL.
    pub(crate) fn with_nul_padded_ident(self) -> Self {
        self.lock().nul_padded_ident = true;
        self
    }

    /// Reply to packet `n` with `script(n)`.
    pub(crate) fn with_packet_replies<F>(self, script: F) -> Self
    where
        F: FnMut(usize) -> PacketReply + Send + 'static,
    {
        self.lock().script = Box::new(script);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap()
    }
}

impl Port for SimulatedPanel {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let mut state = self.lock();
        state.port_baud = baud_rate;
        state.baud_changes.push(baud_rate);
        if let Some((len, baud)) = state.pending_download {
            if baud == baud_rate {
                state.pending_download = None;
                state.rx.push_back(ACK_TOKEN);
                state.download_remaining = (len > 0).then_some(len);
                state.fill = 0;
            }
        }
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.lock().port_baud
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let mut state = self.lock();
        if state
            .delayed_ack
            .is_some_and(|due| Instant::now() >= due)
        {
            state.delayed_ack = None;
            state.rx.push_back(ACK_TOKEN);
        }
        Ok(state.rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut state = self.lock();
        let byte = state.rx.pop_front();
        if byte == Some(ACK_TOKEN) {
            state.awaiting_ack = false;
        }
        Ok(byte)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "simulated panel closed",
            )));
        }
        for &byte in data {
            state.receive(byte);
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.lock().rx.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.open = false;
        state.closes += 1;
        Ok(())
    }
}

/// Line that never stops delivering noise.
pub(crate) struct BabblingLine {
    baud: u32,
}

impl BabblingLine {
    pub(crate) fn new() -> Self {
        Self { baud: 9600 }
    }
}

impl Port for BabblingLine {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.baud = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(1)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        Ok(Some(b'x'))
    }

    fn write_bytes(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "babbling"
    }

    fn is_open(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl PanelProbe {
    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap()
    }

    /// Baud rate the host port is currently set to.
    pub(crate) fn port_baud(&self) -> u32 {
        self.lock().port_baud
    }

    /// Every baud rate the host switched to, in order.
    pub(crate) fn baud_changes(&self) -> Vec<u32> {
        self.lock().baud_changes.clone()
    }

    /// Non-empty instructions received, with the baud rate they were sent at.
    pub(crate) fn commands(&self) -> Vec<(u32, String)> {
        self.lock().commands.clone()
    }

    /// Payload bytes received in download mode.
    pub(crate) fn payload(&self) -> Vec<u8> {
        self.lock().payload.clone()
    }

    /// Size of every completed packet.
    pub(crate) fn packet_sizes(&self) -> Vec<usize> {
        self.lock().packet_sizes.clone()
    }

    /// Bytes written while a packet acknowledgment was still unread.
    pub(crate) fn bytes_while_awaiting_ack(&self) -> usize {
        self.lock().bytes_while_awaiting
    }

    /// `rest` instructions understood.
    pub(crate) fn resets(&self) -> usize {
        self.lock().resets
    }

    /// Times the port was closed.
    pub(crate) fn closes(&self) -> usize {
        self.lock().closes
    }
}
