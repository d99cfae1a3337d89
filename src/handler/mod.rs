//! Handler module - application logic plugged into the dispatcher.
//!
//! A handler receives one raw frame payload and returns the raw payload to
//! frame back. Any error it returns is an application error (see
//! [`ErrorPolicy`](crate::ErrorPolicy)).
//!
//! Provides:
//! - [`Handler`] - the trait the dispatcher drives, implemented for closures
//! - [`TypedHandler`] / [`typed`] - decode a request message, encode a response
//!
//! # Example
//!
//! ```ignore
//! use corerunner_worker::codec::{JobRequest, JobResponse};
//! use corerunner_worker::handler::typed;
//!
//! let handler = typed(|job: JobRequest| async move {
//!     Ok(JobResponse::new(format!("done: {}", job.name)))
//! });
//! ```

mod typed;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::Result;

pub use typed::{typed, TypedHandler};

/// Result type for handler functions: the payload to send back.
pub type HandlerResult = Result<Bytes>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Application logic invoked once per frame.
///
/// The returned future may borrow the handler, so a handler struct can keep
/// per-worker state (an RPC client, caches) across frames.
pub trait Handler: Send {
    /// Handle one frame payload.
    fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: FnMut(Bytes) -> Fut + Send,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult> {
        Box::pin(self(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;

    struct Counter {
        calls: usize,
    }

    impl Handler for Counter {
        fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult> {
            Box::pin(async move {
                self.calls += 1;
                Ok(Bytes::from(format!("{}:{}", self.calls, payload.len())))
            })
        }
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let mut echo = |payload: Bytes| async move { Ok::<_, WorkerError>(payload) };
        let out = echo.call(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(&out[..], b"ping");
    }

    #[tokio::test]
    async fn test_closure_handler_error() {
        let mut failing =
            |_payload: Bytes| async move { Err::<Bytes, _>(WorkerError::handler("nope")) };
        let err = failing.call(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Handler(_)));
    }

    #[tokio::test]
    async fn test_stateful_handler_borrows_self() {
        let mut counter = Counter { calls: 0 };
        counter.call(Bytes::from_static(b"a")).await.unwrap();
        let out = counter.call(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(&out[..], b"2:3");
        assert_eq!(counter.calls, 2);
    }
}
