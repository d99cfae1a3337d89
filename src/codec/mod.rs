//! Field codec - the binary encoding carried inside each frame.
//!
//! The encoding knows four wire primitives and nothing else:
//!
//! ```text
//! uint64        8 bytes, little endian
//! string/bytes  [uint64 len][len bytes]
//! list<T>       [uint64 count][T][T]...
//! map<string,T> [uint64 count][key][T][key][T]...
//! ```
//!
//! No type tags are written. Encoder and decoder must agree on field order,
//! so every structured message encodes and decodes its fields in exactly
//! the declared order.
//!
//! # Example
//!
//! ```
//! use corerunner_worker::codec::{JobRequest, Message};
//!
//! let req = JobRequest::new("resize", "img.png", 1000);
//! let bytes = req.to_bytes();
//! assert_eq!(JobRequest::from_bytes(bytes).unwrap(), req);
//! ```

mod messages;
mod primitives;

use bytes::Bytes;
use thiserror::Error;

use crate::stream::Stream;

pub use messages::{File, HttpRequest, HttpResponse, JobRequest, JobResponse};

/// Errors produced while decoding wire values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Fewer bytes left than the value needs.
    #[error("unexpected end of message: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the value required.
        needed: usize,
        /// Bytes that were left.
        remaining: usize,
    },

    /// A string field did not hold valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A length prefix that cannot be addressed on this platform.
    #[error("length {0} does not fit in memory")]
    LengthOverflow(u64),

    /// A map carried the same key twice.
    #[error("duplicate map key {0:?}")]
    DuplicateKey(String),

    /// Bytes left over after the last field of a message.
    #[error("{remaining} trailing bytes after {message}")]
    TrailingBytes {
        /// Message that was decoded.
        message: &'static str,
        /// Unconsumed bytes.
        remaining: usize,
    },

    /// A named field of a structured message failed to decode.
    #[error("failed to decode field `{field}` of {message}")]
    Field {
        /// Structured message being decoded.
        message: &'static str,
        /// Field that failed.
        field: &'static str,
        /// What went wrong inside the field.
        #[source]
        source: Box<CodecError>,
    },
}

/// A value with a wire representation.
pub trait Wire: Sized {
    /// Append the encoded value to `stream`.
    fn encode(&self, stream: &mut Stream);

    /// Decode one value from the read cursor of `stream`.
    fn decode(stream: &mut Stream) -> Result<Self, CodecError>;
}

/// A structured message: a fixed, ordered sequence of wire fields.
pub trait Message: Wire {
    /// Message name used in error reports.
    const NAME: &'static str;

    /// Encode into a fresh payload.
    fn to_bytes(&self) -> Bytes {
        let mut stream = Stream::new();
        self.encode(&mut stream);
        stream.into_bytes()
    }

    /// Decode a whole payload. The payload must hold exactly one message.
    ///
    /// Bytes fields of the result share memory with `data`.
    fn from_bytes(data: impl Into<Bytes>) -> Result<Self, CodecError> {
        let mut stream = Stream::from(data.into());
        let message = Self::decode(&mut stream)?;
        match stream.remaining() {
            0 => Ok(message),
            remaining => Err(CodecError::TrailingBytes {
                message: Self::NAME,
                remaining,
            }),
        }
    }
}

/// Decode one named field, tagging any failure with the message and field name.
pub(crate) fn decode_field<T: Wire>(
    stream: &mut Stream,
    message: &'static str,
    field: &'static str,
) -> Result<T, CodecError> {
    T::decode(stream).map_err(|source| CodecError::Field {
        message,
        field,
        source: Box::new(source),
    })
}
