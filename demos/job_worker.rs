//! Job Worker - typed JobRequest/JobResponse example.
//!
//! This example demonstrates:
//! - Wrapping an async function with `typed` so it sees decoded messages
//! - Logging to stderr while stdout carries frames
//! - Exiting with the code the supervisor expects
//!
//! # Running
//!
//! ```sh
//! cargo build --example job_worker
//! RUST_LOG=debug ./target/debug/examples/job_worker
//! ```
//!
//! The binary prints `ok` and then waits for `<len>\n<payload>` frames
//! holding encoded `JobRequest`s.

use corerunner_worker::codec::{JobRequest, JobResponse};
use corerunner_worker::handler::typed;
use corerunner_worker::{Dispatcher, Result};
use tracing_subscriber::EnvFilter;

/// Reverse the job payload and tag it with the job name.
async fn run_job(job: JobRequest) -> Result<JobResponse> {
    tracing::info!(name = %job.name, timeout = job.timeout, "Running job");

    let mut payload = job.payload.to_vec();
    payload.reverse();

    let mut out = format!("{}:", job.name).into_bytes();
    out.extend_from_slice(&payload);
    Ok(JobResponse::new(out))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let exit = Dispatcher::stdio().run(typed(run_job)).await;
    std::process::exit(exit.exit_code());
}
