//! Receive window for panel replies.

/// Bytes retained by a [`ResponseWindow`].
pub const WINDOW_CAPACITY: usize = 64;

/// Fixed-capacity tail of the bytes received during one wait.
///
/// NUL bytes are dropped on entry. When full, the oldest byte is discarded.
#[derive(Debug, Clone)]
pub struct ResponseWindow {
    buf: [u8; WINDOW_CAPACITY],
    len: usize,
}

impl Default for ResponseWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            buf: [0; WINDOW_CAPACITY],
            len: 0,
        }
    }

    /// Append a received byte. Returns `false` if it was filtered out.
    pub fn push(&mut self, byte: u8) -> bool {
        if byte == 0 {
            return false;
        }
        if self.len == WINDOW_CAPACITY {
            self.buf
                .copy_within(1.., 0);
            self.len -= 1;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    /// Retained bytes, oldest first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of retained bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the retained bytes end with `needle`.
    pub fn ends_with(&self, needle: &[u8]) -> bool {
        self.as_bytes()
            .ends_with(needle)
    }

    /// Lossy text rendering for log output.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}
