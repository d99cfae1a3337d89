//! Protocol module - stdio framing.
//!
//! - Length-prefixed frame encoding, reading and writing
//! - Frame buffer for decoding a fragmented frame stream

mod frame;
mod frame_buffer;

pub use frame::{
    build_frame, encode_frame_header, parse_frame_header, FrameReader, FrameWriter,
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FRAME_SIZE, MAX_HEADER_LEN, READY_SIGNAL,
};
pub use frame_buffer::FrameBuffer;
