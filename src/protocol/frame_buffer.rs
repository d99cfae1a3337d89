//! Frame buffer for decoding a captured or fragmented frame stream.
//!
//! This is the push-based view of the framing used on the supervisor side
//! of the pipe (and in tests): feed it whatever bytes arrived and it returns
//! every frame completed so far.
//!
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForLength`: need a full `<len>\n` header line
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use corerunner_worker::protocol::{build_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_frame(b"hello");
//!
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[4..]).unwrap();
//! assert_eq!(&frames[0][..], b"hello");
//! ```

use bytes::{Bytes, BytesMut};

use super::frame::{parse_frame_header, DEFAULT_MAX_FRAME_SIZE, MAX_HEADER_LEN};
use crate::error::{Result, WorkerError};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete header line.
    WaitingForLength,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom frame limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or oversized header. The buffer should
    /// be discarded afterwards; the stream can no longer be resynchronised.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                    if self.buffer.len() >= MAX_HEADER_LEN {
                        return Err(WorkerError::Frame(format!(
                            "Frame header longer than {} bytes",
                            MAX_HEADER_LEN
                        )));
                    }
                    return Ok(None);
                };

                let line = self.buffer.split_to(newline + 1);
                let len = parse_frame_header(&line)?
                    .ok_or_else(|| WorkerError::Frame("Empty frame header".to_string()))?;

                if len > self.max_frame_size {
                    return Err(WorkerError::Frame(format!(
                        "Frame size {} exceeds maximum {}",
                        len, self.max_frame_size
                    )));
                }

                if len == 0 {
                    return Ok(Some(Bytes::new()));
                }

                self.state = State::WaitingForPayload { remaining: len };
                self.try_extract_one()
            }

            State::WaitingForPayload { remaining } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(payload))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if a frame is partially received.
    pub fn is_mid_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForPayload { .. })
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"hello");
        assert!(buffer.is_empty());
        assert!(!buffer.is_mid_frame());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let combined = [build_frame(b"first"), build_frame(b""), build_frame(b"third")].concat();

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"first");
        assert!(frames[1].is_empty());
        assert_eq!(&frames[2][..], b"third");
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(&[1u8; 1234]);

        assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForLength");

        let frames = buffer.push(&bytes[2..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1234);
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let bytes = build_frame(payload);

        assert!(buffer.push(&bytes[..10]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");
        assert!(buffer.is_mid_frame());

        let frames = buffer.push(&bytes[10..]).unwrap();
        assert_eq!(&frames[0][..], payload);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(b"hi there");

        let mut all = Vec::new();
        for byte in &bytes {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(&all[0][..], b"hi there");
    }

    #[test]
    fn test_max_frame_size() {
        let mut buffer = FrameBuffer::with_max_frame_size(100);
        let err = buffer.push(b"1000\n").unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_malformed_header() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"xyz\n").is_err());

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"\n").is_err());

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(&[b'9'; 40]).is_err());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"5\nab").unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.clear();
        assert_eq!(buffer.state_name(), "WaitingForLength");
        assert!(buffer.is_empty());

        let frames = buffer.push(b"2\nok").unwrap();
        assert_eq!(&frames[0][..], b"ok");
    }
}
