//! Handlers that work on structured messages instead of raw payloads.

use std::future::Future;
use std::marker::PhantomData;

use bytes::Bytes;

use super::{BoxFuture, Handler, HandlerResult};
use crate::codec::Message;
use crate::error::{Result, WorkerError};

/// Wrapper that decodes the payload before calling the handler and encodes
/// its response afterwards.
pub struct TypedHandler<F, Req, Resp, Fut>
where
    F: FnMut(Req) -> Fut + Send,
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(Req) -> Fut>,
}

impl<F, Req, Resp, Fut> TypedHandler<F, Req, Resp, Fut>
where
    F: FnMut(Req) -> Fut + Send,
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Req, Resp, Fut> Handler for TypedHandler<F, Req, Resp, Fut>
where
    F: FnMut(Req) -> Fut + Send,
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult> {
        let request = match Req::from_bytes(payload) {
            Ok(req) => req,
            Err(e) => return Box::pin(async move { Err(WorkerError::from(e)) }),
        };

        let fut = (self.handler)(request);
        Box::pin(async move { fut.await.map(|resp| resp.to_bytes()) })
    }
}

/// Build a [`TypedHandler`] from a closure.
pub fn typed<F, Req, Resp, Fut>(handler: F) -> TypedHandler<F, Req, Resp, Fut>
where
    F: FnMut(Req) -> Fut + Send,
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
{
    TypedHandler::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, JobRequest, JobResponse};

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let mut handler = typed(|job: JobRequest| async move {
            Ok::<_, WorkerError>(JobResponse::new(format!("{}:{}", job.name, job.timeout)))
        });

        let payload = JobRequest::new("resize", "img.png", 1000).to_bytes();
        let out = handler.call(payload).await.unwrap();

        assert_eq!(JobResponse::from_bytes(out).unwrap().payload, "resize:1000");
    }

    #[tokio::test]
    async fn test_typed_decode_failure_is_codec_error() {
        let mut handler =
            typed(|_job: JobRequest| async move { Ok::<_, WorkerError>(JobResponse::default()) });

        let err = handler.call(Bytes::from_static(b"\x01")).await.unwrap_err();
        match err {
            WorkerError::Codec(CodecError::Field { field, .. }) => assert_eq!(field, "name"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
