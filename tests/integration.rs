//! Integration tests for corerunner-worker.
//!
//! These drive a dispatcher the way a supervisor would: over in-memory
//! pipes, with frames built and parsed by the public protocol API.

use bytes::Bytes;
use corerunner_worker::codec::{File, HttpRequest, HttpResponse, JobRequest, JobResponse, Message};
use corerunner_worker::handler::{typed, BoxFuture, Handler, HandlerResult};
use corerunner_worker::protocol::{build_frame, FrameBuffer, READY_SIGNAL};
use corerunner_worker::{Dispatcher, ExitReason, Result, RpcClient, RpcResponse, WorkerError};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

async fn echo_http(req: HttpRequest) -> Result<HttpResponse> {
    let files: Vec<Value> = req
        .files
        .values()
        .map(|f| json!({"filename": f.filename, "size": f.size, "tmpPath": f.tmp_path}))
        .collect();
    let body = json!({
        "body": String::from_utf8_lossy(&req.body),
        "files": files,
        "form": req.form,
    });

    let mut resp = HttpResponse::new(200).body(serde_json::to_vec(&body)?);
    resp.headers = req.headers;
    Ok(resp)
}

/// Test a full HTTP exchange over pipes delivered in small pieces.
#[tokio::test]
async fn test_http_worker_over_pipes() {
    let (mut supervisor_in, worker_in) = duplex(7);
    let (worker_out, mut supervisor_out) = duplex(5);

    let worker = tokio::spawn(async move {
        let mut dispatcher = Dispatcher::new(worker_in, worker_out, tokio::io::sink());
        dispatcher.run(typed(echo_http)).await
    });

    let mut ready = [0u8; 3];
    supervisor_out.read_exact(&mut ready).await.unwrap();
    assert_eq!(&ready, READY_SIGNAL);

    let mut headers = IndexMap::new();
    headers.insert("X-Trace".to_string(), "abc".to_string());
    let mut files = IndexMap::new();
    files.insert(
        "upload".to_string(),
        File {
            filename: "a.txt".to_string(),
            tmp_path: "/tmp/a".to_string(),
            size: 3,
        },
    );
    let mut form = IndexMap::new();
    form.insert("k".to_string(), "v".to_string());

    let request = HttpRequest {
        method: "POST".to_string(),
        url: "/submit".to_string(),
        headers,
        body: Bytes::from_static(b"hello"),
        files,
        form,
    };
    supervisor_in
        .write_all(&build_frame(&request.to_bytes()))
        .await
        .unwrap();
    drop(supervisor_in);

    let mut out = Vec::new();
    supervisor_out.read_to_end(&mut out).await.unwrap();

    let exit = worker.await.unwrap();
    assert!(matches!(exit, ExitReason::InputClosed));

    let frames = FrameBuffer::new().push(&out).unwrap();
    assert_eq!(frames.len(), 1);

    let response = HttpResponse::from_bytes(frames[0].clone()).unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["X-Trace"], "abc");

    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["body"], "hello");
    assert_eq!(body["files"][0]["tmpPath"], "/tmp/a");
    assert_eq!(body["form"]["k"], "v");
}

/// Test that a job request gets exactly the encoded job response back.
#[tokio::test]
async fn test_job_worker_frames_encoded_response() {
    async fn run_job(job: JobRequest) -> Result<JobResponse> {
        Ok(JobResponse::new(format!("{} done", job.name)))
    }

    let input = build_frame(&JobRequest::new("resize", "img.png", 1000).to_bytes());
    let mut dispatcher = Dispatcher::new(&input[..], Vec::new(), Vec::new());
    let exit = dispatcher.run(typed(run_job)).await;
    let (_, out, err) = dispatcher.into_parts();

    assert!(exit.is_clean());
    assert!(err.is_empty());

    let encoded = JobResponse::new("resize done").to_bytes();
    let mut expected = b"ok\n".to_vec();
    expected.extend_from_slice(format!("{}\n", encoded.len()).as_bytes());
    expected.extend_from_slice(&encoded);
    assert_eq!(out, expected);
}

/// Handler that calls back into a sibling process for every job.
struct Forwarder {
    rpc: RpcClient,
}

impl Forwarder {
    async fn forward(&mut self, payload: Bytes) -> HandlerResult {
        let job = JobRequest::from_bytes(payload)?;
        let reply: RpcResponse<String> = self
            .rpc
            .send("RPCHandler.RunJob", &json!([job.name, job.timeout]))
            .await?;
        let result = reply.into_result()?.unwrap_or_default();
        Ok(JobResponse::new(result).to_bytes())
    }
}

impl Handler for Forwarder {
    fn call(&mut self, payload: Bytes) -> BoxFuture<'_, HandlerResult> {
        Box::pin(self.forward(payload))
    }
}

/// Test an RPC call made from inside a handler, sharing one connection.
#[tokio::test]
async fn test_rpc_from_handler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let peer = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut socket = BufReader::new(socket);
        let mut served = 0;
        loop {
            let mut line = String::new();
            if socket.read_line(&mut line).await.unwrap() == 0 {
                return served;
            }
            let req: Value = serde_json::from_str(&line).unwrap();
            let result = format!("ran {}", req["params"][0][0].as_str().unwrap());
            let reply = json!({"id": req["id"], "result": result, "error": null});
            let mut out = serde_json::to_vec(&reply).unwrap();
            out.push(b'\n');
            socket.get_mut().write_all(&out).await.unwrap();
            served += 1;
        }
    });

    let input = [
        build_frame(&JobRequest::new("a", "", 10).to_bytes()),
        build_frame(&JobRequest::new("b", "", 20).to_bytes()),
    ]
    .concat();

    let mut forwarder = Forwarder {
        rpc: RpcClient::new(addr),
    };
    let mut dispatcher = Dispatcher::new(&input[..], Vec::new(), Vec::new());
    let exit = dispatcher.run_with(&mut forwarder).await;
    assert!(exit.is_clean());

    forwarder.rpc.close().await.unwrap();
    assert_eq!(peer.await.unwrap(), 2);

    let (_, out, _) = dispatcher.into_parts();
    let frames = FrameBuffer::new().push(&out[3..]).unwrap();
    let payloads: Vec<Bytes> = frames
        .iter()
        .map(|f| JobResponse::from_bytes(f.clone()).unwrap().payload)
        .collect();
    assert_eq!(payloads, ["ran a", "ran b"]);
}

/// Test that an unreachable RPC peer fails the handler and stops the worker.
#[tokio::test]
async fn test_rpc_failure_inside_handler_aborts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let input = [
        build_frame(&JobRequest::new("a", "", 10).to_bytes()),
        build_frame(&JobRequest::new("b", "", 20).to_bytes()),
    ]
    .concat();

    let mut forwarder = Forwarder {
        rpc: RpcClient::new(addr.clone()),
    };
    let mut dispatcher = Dispatcher::new(&input[..], Vec::new(), Vec::new());
    let exit = dispatcher.run_with(&mut forwarder).await;

    assert!(matches!(exit, ExitReason::Failed(WorkerError::Connect { .. })));
    assert_eq!(dispatcher.frames_handled(), 0);

    let (_, out, err) = dispatcher.into_parts();
    assert_eq!(out, b"ok\n");
    let err = String::from_utf8(err).unwrap();
    assert!(err.contains("Error from worker: Could not open socket"));
    assert!(err.contains(&addr));
}
