//! Length-prefixed framing over a byte pipe.
//!
//! ```text
//! <decimal byte length>\n<exactly that many payload bytes>
//! ```
//!
//! There is no terminator after the payload. The length counts bytes, never
//! characters. Chunking on either side is a buffering detail: a frame is one
//! contiguous byte run however many reads or writes carried it.
//!
//! # Example
//!
//! ```
//! use corerunner_worker::protocol::build_frame;
//!
//! assert_eq!(build_frame(b"hello"), b"5\nhello");
//! assert_eq!(build_frame(b""), b"0\n");
//! ```

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Result, WorkerError};

/// Readiness handshake written once before the first frame is read.
pub const READY_SIGNAL: &[u8] = b"ok\n";

/// Default bound on a single underlying read or write, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Default maximum frame payload (1 GiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 30;

/// Longest accepted header line, newline included. Fits any u64 plus `\r\n`.
pub const MAX_HEADER_LEN: usize = 22;

/// Upper bound on the buffer reserved up front for a frame payload.
const PREALLOC_LIMIT: usize = 1 << 20;

/// Encode the header line for a payload of `len` bytes.
#[inline]
pub fn encode_frame_header(len: usize) -> String {
    format!("{len}\n")
}

/// Build a complete frame (header + payload) in one buffer.
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let header = encode_frame_header(payload.len());
    let mut frame = Vec::with_capacity(header.len() + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Parse a header line into a payload length.
///
/// The trailing `\n` (and an optional `\r` before it) is ignored. A blank line
/// returns `None`, which the worker treats like end of input.
pub fn parse_frame_header(line: &[u8]) -> Result<Option<usize>> {
    let digits = line.strip_suffix(b"\n").unwrap_or(line);
    let digits = digits.strip_suffix(b"\r").unwrap_or(digits);

    if digits.is_empty() {
        return Ok(None);
    }

    let invalid =
        || WorkerError::Frame(format!("Invalid frame header {:?}", String::from_utf8_lossy(line)));

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .map(Some)
        .ok_or_else(invalid)
}

fn check_frame_size(len: usize, max_frame_size: usize) -> Result<()> {
    if len > max_frame_size {
        return Err(WorkerError::Frame(format!(
            "Frame size {} exceeds maximum {}",
            len, max_frame_size
        )));
    }
    Ok(())
}

/// Reads frames from the supervisor's side of the pipe.
///
/// The header is read as one line; the payload is then accumulated in reads
/// of at most `chunk_size` bytes until the declared length is satisfied.
/// Bytes past the current frame are never requested from the payload loop.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    chunk_size: usize,
    max_frame_size: usize,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with default chunk size and frame limit.
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reader with a custom chunk size and frame limit.
    ///
    /// A chunk size of zero is treated as one.
    pub fn with_limits(reader: R, chunk_size: usize, max_frame_size: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            chunk_size: chunk_size.max(1),
            max_frame_size,
            line: Vec::with_capacity(MAX_HEADER_LEN),
        }
    }

    /// Read the next frame payload.
    ///
    /// Returns `Ok(None)` on a clean end of input (EOF before any header byte,
    /// or a blank header line).
    ///
    /// # Errors
    ///
    /// Framing errors for a malformed, unterminated or oversized header, and
    /// for input that ends before the declared payload length.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        self.line.clear();
        let n = (&mut self.reader)
            .take(MAX_HEADER_LEN as u64)
            .read_until(b'\n', &mut self.line)
            .await?;

        if n == 0 {
            return Ok(None);
        }

        if self.line.last() != Some(&b'\n') {
            return Err(WorkerError::Frame(if n >= MAX_HEADER_LEN {
                format!("Frame header longer than {} bytes", MAX_HEADER_LEN)
            } else {
                format!(
                    "Input closed inside frame header {:?}",
                    String::from_utf8_lossy(&self.line)
                )
            }));
        }

        let len = match parse_frame_header(&self.line)? {
            Some(len) => len,
            None => return Ok(None),
        };
        check_frame_size(len, self.max_frame_size)?;

        self.read_payload(len).await.map(Some)
    }

    async fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(len.min(PREALLOC_LIMIT));
        let mut chunk = vec![0u8; self.chunk_size.min(len)];

        while payload.len() < len {
            let want = (len - payload.len()).min(self.chunk_size);
            let n = self.reader.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(WorkerError::Frame(format!(
                    "Input closed after {} of {} frame bytes",
                    payload.len(),
                    len
                )));
            }
            payload.extend_from_slice(&chunk[..n]);
        }

        Ok(payload.freeze())
    }

    /// Consume the reader and return the underlying input.
    ///
    /// Bytes already buffered but not yet returned as a frame are dropped.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Writes frames towards the supervisor.
pub struct FrameWriter<W> {
    writer: W,
    chunk_size: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a writer with the default chunk size.
    pub fn new(writer: W) -> Self {
        Self::with_chunk_size(writer, DEFAULT_CHUNK_SIZE)
    }

    /// Create a writer that issues writes of at most `chunk_size` bytes.
    pub fn with_chunk_size(writer: W, chunk_size: usize) -> Self {
        Self {
            writer,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write the readiness handshake. Not a frame.
    pub async fn write_ready(&mut self) -> Result<()> {
        self.writer.write_all(READY_SIGNAL).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write one frame and flush.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.writer
            .write_all(encode_frame_header(payload.len()).as_bytes())
            .await?;
        for chunk in payload.chunks(self.chunk_size) {
            self.writer.write_all(chunk).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Get a reference to the underlying output.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the writer and return the underlying output.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
