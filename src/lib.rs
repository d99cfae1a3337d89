//! # corerunner-worker
//!
//! Worker-side runtime for the corerunner process-supervision protocol.
//!
//! A supervisor spawns the worker and talks to it over stdio. The worker
//! answers `ok\n` once, then serves length-prefixed frames one at a time
//! until its input is closed.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): `<len>\n<payload>` over stdin/stdout
//! - **Field codec** ([`codec`]): little-endian binary encoding of the
//!   structured messages carried inside frames
//! - **Dispatcher** ([`Dispatcher`]): the half-duplex read/handle/write loop
//! - **RPC client** ([`RpcClient`]): line-delimited JSON calls to a sibling
//!   process over TCP
//!
//! Logs go through `tracing`. stdout belongs to the protocol, so install a
//! subscriber that writes to stderr.
//!
//! ## Example
//!
//! ```ignore
//! use corerunner_worker::codec::{JobRequest, JobResponse};
//! use corerunner_worker::handler::typed;
//! use corerunner_worker::{Dispatcher, Result};
//!
//! async fn run_job(job: JobRequest) -> Result<JobResponse> {
//!     Ok(JobResponse::new(format!("done: {}", job.name)))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let exit = Dispatcher::stdio().run(typed(run_job)).await;
//!     std::process::exit(exit.exit_code());
//! }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod rpc;

mod dispatcher;
mod stream;

pub use dispatcher::{Dispatcher, DispatcherBuilder, ErrorPolicy, ExitReason};
pub use error::{Result, WorkerError};
pub use handler::{Handler, HandlerResult};
pub use rpc::{RpcClient, RpcResponse};
pub use stream::Stream;
