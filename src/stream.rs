//! In-memory byte stream used by the field codec.
//!
//! A [`Stream`] wraps one message payload. Reads advance a read cursor,
//! writes always append to the end of the buffer, and [`Stream::as_bytes`]
//! returns the whole buffer without consuming anything.
//!
//! # Example
//!
//! ```
//! use corerunner_worker::Stream;
//!
//! let mut stream = Stream::from_slice(b"hello");
//! assert_eq!(stream.read(2).unwrap(), b"he");
//!
//! stream.write(b" world");
//! assert_eq!(stream.as_bytes(), b"hello world");
//! assert_eq!(stream.read(9).unwrap(), b"llo world");
//! ```

use bytes::{Bytes, BytesMut};

use crate::codec::CodecError;

/// Backing storage of a [`Stream`].
#[derive(Debug, Clone)]
enum Buffer {
    /// Received payload. Reads hand out slices of it without copying.
    Shared(Bytes),
    /// Growable buffer, used once anything is written.
    Owned(BytesMut),
}

/// Seekable in-memory buffer with independent read and write positions.
///
/// Single-owner; not meant to be shared between tasks.
#[derive(Debug, Clone)]
pub struct Stream {
    buf: Buffer,
    pos: usize,
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            buf: Buffer::Owned(BytesMut::new()),
            pos: 0,
        }
    }
}

impl Stream {
    /// Create an empty stream, ready for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream over a copy of `data`, read cursor at 0.
    ///
    /// Use `Stream::from(Bytes)` to read a payload without copying it.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::from(Bytes::copy_from_slice(data))
    }

    fn contents(&self) -> &[u8] {
        match &self.buf {
            Buffer::Shared(bytes) => bytes,
            Buffer::Owned(bytes) => bytes,
        }
    }

    /// Check `n` more bytes are readable and advance past them.
    fn advance(&mut self, n: usize) -> Result<std::ops::Range<usize>, CodecError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(start..self.pos)
    }

    /// Read exactly `n` bytes and advance the read cursor.
    ///
    /// Fails without moving the cursor if fewer than `n` bytes remain.
    pub fn read(&mut self, n: usize) -> Result<&[u8], CodecError> {
        let range = self.advance(n)?;
        Ok(&self.contents()[range])
    }

    /// Like [`read`](Self::read), but returns an owned handle.
    ///
    /// Zero-copy when the stream was built from [`Bytes`] and nothing has
    /// been written to it since.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, CodecError> {
        let range = self.advance(n)?;
        Ok(match &self.buf {
            Buffer::Shared(bytes) => bytes.slice(range),
            Buffer::Owned(bytes) => Bytes::copy_from_slice(&bytes[range]),
        })
    }

    /// Read exactly `N` bytes into a fixed array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    /// Append `data` to the end of the buffer. Returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if let Buffer::Shared(shared) = &self.buf {
            let mut owned = BytesMut::with_capacity(shared.len() + data.len());
            owned.extend_from_slice(shared);
            self.buf = Buffer::Owned(owned);
        }
        if let Buffer::Owned(owned) = &mut self.buf {
            owned.extend_from_slice(data);
        }
        data.len()
    }

    /// Bytes left between the read cursor and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len() - self.pos
    }

    /// Current read cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total buffer length, independent of the read cursor.
    #[inline]
    pub fn len(&self) -> usize {
        self.contents().len()
    }

    /// Check if the buffer holds no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entire buffer from position 0. Does not consume.
    pub fn as_bytes(&self) -> &[u8] {
        self.contents()
    }

    /// Consume the stream and return its full contents.
    pub fn into_bytes(self) -> Bytes {
        match self.buf {
            Buffer::Shared(bytes) => bytes,
            Buffer::Owned(bytes) => bytes.freeze(),
        }
    }
}

impl From<Bytes> for Stream {
    fn from(data: Bytes) -> Self {
        Self {
            buf: Buffer::Shared(data),
            pos: 0,
        }
    }
}

impl From<Vec<u8>> for Stream {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}
