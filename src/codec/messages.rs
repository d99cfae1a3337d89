//! Structured messages exchanged with the supervisor.
//!
//! Field order below is the wire order. Changing it breaks compatibility
//! with the supervisor.

use bytes::Bytes;
use indexmap::IndexMap;

use super::{decode_field, CodecError, Message, Wire};
use crate::stream::Stream;

/// HTTP request forwarded by the supervisor.
///
/// Only `body` is raw bytes. `method`, `url`, header values and form values
/// are decoded as UTF-8, and a request carrying anything else (for example
/// Latin-1 obs-text in a header) fails to decode as
/// [`CodecError::InvalidUtf8`] under the failing field. Run the dispatcher
/// with [`ErrorPolicy::Skip`](crate::ErrorPolicy::Skip) to keep serving
/// after such a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Bytes,
    /// Uploaded files by form field name.
    pub files: IndexMap<String, File>,
    pub form: IndexMap<String, String>,
}

impl Wire for HttpRequest {
    fn encode(&self, stream: &mut Stream) {
        self.method.encode(stream);
        self.url.encode(stream);
        self.headers.encode(stream);
        self.body.encode(stream);
        self.files.encode(stream);
        self.form.encode(stream);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(Self {
            method: decode_field(stream, Self::NAME, "method")?,
            url: decode_field(stream, Self::NAME, "url")?,
            headers: decode_field(stream, Self::NAME, "headers")?,
            body: decode_field(stream, Self::NAME, "body")?,
            files: decode_field(stream, Self::NAME, "files")?,
            form: decode_field(stream, Self::NAME, "form")?,
        })
    }
}

impl Message for HttpRequest {
    const NAME: &'static str = "HTTPRequest";
}

/// Uploaded file, already stored by the supervisor at `tmp_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub filename: String,
    pub tmp_path: String,
    pub size: u64,
}

impl Wire for File {
    fn encode(&self, stream: &mut Stream) {
        self.filename.encode(stream);
        self.tmp_path.encode(stream);
        self.size.encode(stream);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(Self {
            filename: decode_field(stream, Self::NAME, "filename")?,
            tmp_path: decode_field(stream, Self::NAME, "tmpPath")?,
            size: decode_field(stream, Self::NAME, "size")?,
        })
    }
}

impl Message for File {
    const NAME: &'static str = "File";
}

/// HTTP response returned to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u64,
    pub headers: IndexMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with the given status, no headers and an empty body.
    pub fn new(status_code: u64) -> Self {
        Self {
            status_code,
            headers: IndexMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header. A repeated name replaces the earlier value in place.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Wire for HttpResponse {
    fn encode(&self, stream: &mut Stream) {
        self.status_code.encode(stream);
        self.headers.encode(stream);
        self.body.encode(stream);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(Self {
            status_code: decode_field(stream, Self::NAME, "statusCode")?,
            headers: decode_field(stream, Self::NAME, "headers")?,
            body: decode_field(stream, Self::NAME, "body")?,
        })
    }
}

impl Message for HttpResponse {
    const NAME: &'static str = "HTTPResponse";
}

/// Background job sent to the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRequest {
    pub name: String,
    pub payload: Bytes,
    /// Time budget in milliseconds, enforced by the supervisor.
    pub timeout: u64,
}

impl JobRequest {
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>, timeout: u64) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            timeout,
        }
    }
}

impl Wire for JobRequest {
    fn encode(&self, stream: &mut Stream) {
        self.name.encode(stream);
        self.payload.encode(stream);
        self.timeout.encode(stream);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(Self {
            name: decode_field(stream, Self::NAME, "name")?,
            payload: decode_field(stream, Self::NAME, "payload")?,
            timeout: decode_field(stream, Self::NAME, "timeout")?,
        })
    }
}

impl Message for JobRequest {
    const NAME: &'static str = "JobRequest";
}

/// Result of a [`JobRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobResponse {
    pub payload: Bytes,
}

impl JobResponse {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

impl Wire for JobResponse {
    fn encode(&self, stream: &mut Stream) {
        self.payload.encode(stream);
    }

    fn decode(stream: &mut Stream) -> Result<Self, CodecError> {
        Ok(Self {
            payload: decode_field(stream, Self::NAME, "payload")?,
        })
    }
}

impl Message for JobResponse {
    const NAME: &'static str = "JobResponse";
}
