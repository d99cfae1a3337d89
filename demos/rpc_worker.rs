//! RPC Worker - calling back into the supervisor while handling jobs.
//!
//! This example demonstrates:
//! - Implementing [`Handler`] on a struct that owns state
//! - Using [`RpcClient`] from inside a handler
//! - Closing the RPC connection after the loop ends
//!
//! The supervisor is expected to listen for JSON-RPC lines on
//! `127.0.0.1:6000`, or on the address in `CORERUNNER_RPC_ADDR`.

use bytes::Bytes;
use corerunner_worker::codec::{JobRequest, JobResponse, Message};
use corerunner_worker::handler::BoxFuture;
use corerunner_worker::rpc::DEFAULT_RPC_ADDR;
use corerunner_worker::{Dispatcher, Handler, HandlerResult, RpcClient};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Forwards every job to the supervisor's `RPCHandler.RunJob`.
struct Relay {
    rpc: RpcClient,
}

impl Relay {
    async fn relay(&mut self, payload: Bytes) -> HandlerResult {
        let job = JobRequest::from_bytes(payload)?;
        let data = String::from_utf8_lossy(&job.payload).into_owned();

        let result: Option<String> = self
            .rpc
            .call("RPCHandler.RunJob", &json!([job.name, data, job.timeout]))
            .await?;

        Ok(JobResponse::new(result.unwrap_or_default()).to_bytes())
    }
}

impl Handler for Relay {
    fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult> {
        Box::pin(self.relay(payload))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let addr = std::env::var("CORERUNNER_RPC_ADDR").unwrap_or_else(|_| DEFAULT_RPC_ADDR.to_string());
    let mut relay = Relay {
        rpc: RpcClient::new(addr),
    };

    let mut dispatcher = Dispatcher::stdio();
    let exit = dispatcher.run_with(&mut relay).await;

    if let Err(e) = relay.rpc.close().await {
        tracing::warn!("Closing RPC connection failed: {}", e);
    }
    std::process::exit(exit.exit_code());
}
