//! Packet boundary bookkeeping.
//!
//! The panel acknowledges every 4096 payload bytes. The last packet carries
//! whatever remains. Boundaries are derived from the byte count alone, never
//! from how the caller slices its buffers.

/// Payload bytes per acknowledged packet.
pub const PACKET_SIZE: usize = 4096;

/// Sizes of the packets a payload of `total` bytes is sent as.
pub fn packet_sizes(total: u32) -> Vec<usize> {
    let total = total as usize;
    let mut sizes = vec![PACKET_SIZE; total / PACKET_SIZE];
    let tail = total % PACKET_SIZE;
    if tail > 0 {
        sizes.push(tail);
    }
    sizes
}

/// Position of the transfer within the declared payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketWindow {
    total: u32,
    sent: u32,
    fill: usize,
    index: usize,
}

impl PacketWindow {
    /// Start tracking a payload of `total` bytes.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Declared payload length.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Bytes written to the link so far.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Bytes of the current packet written so far.
    pub fn fill(&self) -> usize {
        self.fill
    }

    /// Zero-based index of the packet being filled.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declared bytes not yet written.
    pub fn remaining(&self) -> u32 {
        self.total - self.sent
    }

    /// Bytes that may be written before the current packet must be acknowledged.
    pub fn room(&self) -> usize {
        (PACKET_SIZE - self.fill).min(self.remaining() as usize)
    }

    /// Record `n` bytes written. `n` must not exceed [`PacketWindow::room`].
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.room());
        self.fill += n;
        self.sent += n as u32;
    }

    /// Whether the current packet is complete and awaits acknowledgment.
    pub fn is_complete(&self) -> bool {
        self.fill == PACKET_SIZE || (self.fill > 0 && self.sent == self.total)
    }

    /// Whether every declared byte has been written.
    pub fn is_finished(&self) -> bool {
        self.sent == self.total
    }

    /// Close the current packet after its acknowledgment.
    pub fn acknowledge(&mut self) {
        self.fill = 0;
        self.index += 1;
    }

    /// Drop the partial-packet counter.
    pub fn reset_fill(&mut self) {
        self.fill = 0;
    }
}
