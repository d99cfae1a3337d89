//! Wire primitives: uint64, bytes, string, list and string-keyed map.

use bytes::Bytes;
use indexmap::IndexMap;

use super::{CodecError, Wire};
use crate::stream::Stream;

/// Size of an encoded uint64.
pub const UINT64_SIZE: usize = 8;

/// Read a length or count prefix.
fn decode_len(stream: &mut Stream) -> Result<usize, CodecError> {
    let len = u64::decode(stream)?;
    usize::try_from(len).map_err(|_| CodecError::LengthOverflow(len))
}

/// Write a length or count prefix.
fn encode_len(stream: &mut Stream, len: usize) {
    (len as u64).encode(stream);
}

/// Initial capacity for a container of `count` elements.
///
/// Every element takes at least one byte, so a count larger than what is
/// left in the stream cannot be honest; never pre-allocate beyond that.
fn bounded_capacity(count: usize, stream: &Stream) -> usize {
    count.min(stream.remaining())
}

/// Write raw bytes with their length prefix.
fn encode_bytes(stream: &mut Stream, data: &[u8]) {
    encode_len(stream, data.len());
    stream.write(data);
}

impl Wire for u64 {
    fn encode(&self, stream: &mut Stream) {
        stream.write(&self.to_le_bytes());
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(u64::from_le_bytes(stream.read_array::<UINT64_SIZE>()?))
    }
}

impl Wire for Bytes {
    fn encode(&self, stream: &mut Stream) {
        encode_bytes(stream, self);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        let len = decode_len(stream)?;
        stream.read_bytes(len)
    }
}

impl Wire for String {
    fn encode(&self, stream: &mut Stream) {
        encode_bytes(stream, self.as_bytes());
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        let len = decode_len(stream)?;
        let raw = stream.read(len)?.to_vec();
        Ok(String::from_utf8(raw)?)
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn encode(&self, stream: &mut Stream) {
        encode_len(stream, self.len());
        for item in self {
            item.encode(stream);
        }
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        let count = decode_len(stream)?;
        let mut items = Vec::with_capacity(bounded_capacity(count, stream));
        for _ in 0..count {
            items.push(T::decode(stream)?);
        }
        Ok(items)
    }
}

impl<T: Wire> Wire for IndexMap<String, T> {
    fn encode(&self, stream: &mut Stream) {
        encode_len(stream, self.len());
        for (key, value) in self {
            key.encode(stream);
            value.encode(stream);
        }
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        let count = decode_len(stream)?;
        let mut map = IndexMap::with_capacity(bounded_capacity(count, stream));
        for _ in 0..count {
            let key = String::decode(stream)?;
            let value = T::decode(stream)?;
            if map.contains_key(&key) {
                return Err(CodecError::DuplicateKey(key));
            }
            map.insert(key, value);
        }
        Ok(map)
    }
}
