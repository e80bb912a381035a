//! Firmware byte sources for pull-mode uploads.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// What a source can say about its remaining length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLen {
    /// Exactly this many bytes remain.
    Known(u32),
    /// The source cannot tell; read until it returns 0.
    Unknown,
}

/// Sequential supplier of payload bytes.
pub trait ByteSource {
    /// Remaining length, if known.
    fn available(&mut self) -> SourceLen;

    /// Fill `buf` with up to `buf.len()` bytes. `Ok(0)` means no more data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn available(&mut self) -> SourceLen {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

/// In-memory payload.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Wrap a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ByteSource for SliceSource<'_> {
    #[allow(clippy::cast_possible_truncation)]
    fn available(&mut self) -> SourceLen {
        SourceLen::Known((self.data.len() - self.pos) as u32)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf
            .len()
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Adapter for anything implementing [`std::io::Read`].
pub struct ReaderSource<R> {
    reader: R,
    remaining: Option<u32>,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap a reader of unknown length.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            remaining: None,
        }
    }

    /// Wrap a reader that will deliver exactly `len` bytes.
    pub fn with_len(reader: R, len: u32) -> Self {
        Self {
            reader,
            remaining: Some(len),
        }
    }

    /// Consume the adapter and return the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderSource<File> {
    /// Open a firmware file; its length comes from the file metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file
            .metadata()?
            .len();
        let len = u32::try_from(len).map_err(|_| {
            Error::Config(format!(
                "{} is {len} bytes, larger than a panel can accept",
                path.display()
            ))
        })?;
        Ok(Self::with_len(file, len))
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn available(&mut self) -> SourceLen {
        self.remaining
            .map_or(SourceLen::Unknown, SourceLen::Known)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limit = match self.remaining {
            Some(left) => buf
                .len()
                .min(left as usize),
            None => buf.len(),
        };
        let n = loop {
            match self
                .reader
                .read(&mut buf[..limit])
            {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::Io(e)),
            }
        };
        if let Some(left) = self.remaining.as_mut() {
            *left -= n as u32;
        }
        Ok(n)
    }
}
