//! Error types for corerunner-worker.

use thiserror::Error;

use crate::codec::CodecError;

/// Boxed application error raised by a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all worker operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// I/O error on stdio or on the RPC socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (RPC channel only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A structured message could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Framing error (bad length header, truncated or oversized frame).
    #[error("Frame error: {0}")]
    Frame(String),

    /// Application error raised by a handler.
    #[error("Handler error: {0}")]
    Handler(#[source] BoxError),

    /// The RPC peer could not be reached.
    #[error("Could not open socket {addr}: {}: {source}", .source.raw_os_error().unwrap_or(0))]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The RPC peer closed the connection before replying.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The RPC client was used after its socket was closed.
    #[error("Not connected")]
    NotConnected,

    /// The RPC reply carried a different correlation id than the request.
    #[error("RPC reply id {actual} does not match request id {expected}")]
    IdMismatch {
        /// Id sent with the request.
        expected: u64,
        /// Id found in the reply.
        actual: u64,
    },

    /// Application-level failure reported by the RPC peer.
    #[error("Remote error: {0}")]
    Remote(String),
}

impl WorkerError {
    /// Wrap any application error as a handler failure.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        WorkerError::Handler(err.into())
    }
}

/// Result type alias using WorkerError.
pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_names_address_and_code() {
        let err = WorkerError::Connect {
            addr: "127.0.0.1:6000".to_string(),
            source: std::io::Error::from_raw_os_error(111),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Could not open socket 127.0.0.1:6000: 111: "));
    }

    #[test]
    fn test_handler_from_str() {
        let err = WorkerError::handler("boom");
        assert_eq!(err.to_string(), "Handler error: boom");
    }

    #[test]
    fn test_codec_error_converts() {
        let err: WorkerError = CodecError::UnexpectedEof {
            needed: 8,
            remaining: 3,
        }
        .into();
        assert!(matches!(err, WorkerError::Codec(_)));
    }
}
