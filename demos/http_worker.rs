//! HTTP Worker - answering HTTPRequest frames.
//!
//! This example demonstrates:
//! - Reading method, URL, headers, form fields and uploads from a request
//! - Building a response with the `HttpResponse` builder
//! - Continuing after a failed request with [`ErrorPolicy::Skip`]
//!
//! # Running
//!
//! ```sh
//! cargo build --example http_worker
//! ./target/debug/examples/http_worker
//! ```

use corerunner_worker::codec::{HttpRequest, HttpResponse};
use corerunner_worker::handler::typed;
use corerunner_worker::{Dispatcher, ErrorPolicy, Result, WorkerError};
use serde_json::json;
use tracing_subscriber::EnvFilter;

async fn handle(req: HttpRequest) -> Result<HttpResponse> {
    tracing::debug!(method = %req.method, url = %req.url, "Request");

    match (req.method.as_str(), req.url.as_str()) {
        ("GET", "/health") => Ok(HttpResponse::new(200).body("healthy")),
        ("POST", "/upload") => {
            let files: Vec<_> = req
                .files
                .iter()
                .map(|(field, f)| json!({ "field": field, "name": f.filename, "size": f.size }))
                .collect();
            let body = serde_json::to_vec(&json!({ "files": files, "form": req.form }))?;
            Ok(HttpResponse::new(201)
                .header("Content-Type", "application/json")
                .body(body))
        }
        ("GET", "/panic") => Err(WorkerError::handler("refusing to serve /panic")),
        _ => Ok(HttpResponse::new(404).body("not found")),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut dispatcher = Dispatcher::builder()
        .error_policy(ErrorPolicy::Skip)
        .stdio();

    let exit = dispatcher.run(typed(handle)).await;
    tracing::info!(frames = dispatcher.frames_handled(), "Worker stopped");
    std::process::exit(exit.exit_code());
}
