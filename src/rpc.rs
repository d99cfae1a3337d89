//! RPC client for out-of-band calls to a sibling process.
//!
//! Independent of the stdio framing: one TCP socket, one JSON document per
//! line in each direction, one call in flight at a time.
//!
//! ```text
//! -> {"id":1,"method":"Jobs.Run","params":[<arg>]}
//! <- {"id":1,"result":<any>,"error":null}
//! ```
//!
//! The socket is opened lazily on the first call and reused afterwards.
//! Any transport or protocol failure during a call drops the socket; the
//! next call reconnects. Nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! use corerunner_worker::RpcClient;
//! use serde_json::json;
//!
//! let mut rpc = RpcClient::new("127.0.0.1:6000");
//! let reply = rpc
//!     .send::<_, serde_json::Value>("RPCHandler.RunJob", &json!(["jobName", "data", 1000]))
//!     .await?;
//! if let Some(err) = reply.error {
//!     eprintln!("peer failed: {err}");
//! }
//! rpc.close().await?;
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{Result, WorkerError};

/// Address of the supervisor's RPC listener in the stock setup.
pub const DEFAULT_RPC_ADDR: &str = "127.0.0.1:6000";

/// Request line sent to the peer.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    /// Correlation id, unique per connection.
    pub id: u64,
    /// Remote method, e.g. `RPCHandler.RunJob`.
    pub method: &'a str,
    /// Positional parameters. Always a single argument.
    pub params: [&'a P; 1],
}

/// Reply line received from the peer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcResponse<R = Value> {
    /// Correlation id echoed by the peer.
    pub id: u64,
    /// Call result. Always `None` when `error` is set.
    pub result: Option<R>,
    /// Application-level failure reported by the peer.
    pub error: Option<String>,
}

/// Reply as read off the wire, before `result` is given its type.
///
/// The peer may put anything in `result` next to an `error`, so it is only
/// converted once the reply is known to be a success.
#[derive(Debug, Deserialize)]
struct RawReply {
    id: u64,
    result: Option<Value>,
    error: Option<String>,
}

impl RawReply {
    fn into_response<R: DeserializeOwned>(self) -> Result<RpcResponse<R>> {
        let result = match (&self.error, self.result) {
            (None, Some(value)) => Some(serde_json::from_value(value)?),
            _ => None,
        };
        Ok(RpcResponse {
            id: self.id,
            result,
            error: self.error,
        })
    }
}

impl<R> RpcResponse<R> {
    /// Turn the reply into a plain result.
    ///
    /// `error` becomes [`WorkerError::Remote`]; a missing or null result
    /// without an error is `Ok(None)`.
    pub fn into_result(self) -> Result<Option<R>> {
        match self.error {
            Some(err) => Err(WorkerError::Remote(err)),
            None => Ok(self.result),
        }
    }
}

/// Line-delimited JSON RPC client over a lazily opened TCP socket.
///
/// Not meant to be shared between concurrent callers: each call writes a
/// request and then reads the next line as its reply.
#[derive(Debug)]
pub struct RpcClient {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    last_id: u64,
}

impl RpcClient {
    /// Create a client for `addr` (`host:port`). Does not connect.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            last_id: 0,
        }
    }

    /// Peer address.
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// Check if the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<&mut BufReader<TcpStream>> {
        if self.stream.is_none() {
            let socket = TcpStream::connect(&self.addr)
                .await
                .map_err(|source| WorkerError::Connect {
                    addr: self.addr.clone(),
                    source,
                })?;
            tracing::debug!("Connected to RPC peer {}", self.addr);
            self.stream = Some(BufReader::new(socket));
        }

        self.stream.as_mut().ok_or(WorkerError::NotConnected)
    }

    fn next_id(&mut self) -> u64 {
        self.last_id = self.last_id.wrapping_add(1);
        self.last_id
    }

    /// Call `method` with a single argument and wait for the reply.
    ///
    /// An `error` in the reply is returned inside the response, not as `Err`.
    ///
    /// # Errors
    ///
    /// Connection, write and read failures, a peer that closes without
    /// replying, an unparseable reply, and a reply whose id does not match
    /// the request. All of these close the socket.
    pub async fn send<P, R>(&mut self, method: &str, arg: &P) -> Result<RpcResponse<R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id();
        let mut request = serde_json::to_vec(&RpcRequest {
            id,
            method,
            params: [arg],
        })?;
        request.push(b'\n');

        let stream = self.connect().await?;
        let result = exchange::<R>(stream, &request, id).await;

        if let Err(e) = &result {
            tracing::warn!("RPC call {} (id {}) failed, closing socket: {}", method, id, e);
            self.stream = None;
        }
        result
    }

    /// Call `method` and return its result, mapping a peer error to
    /// [`WorkerError::Remote`].
    pub async fn call<P, R>(&mut self, method: &str, arg: &P) -> Result<Option<R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.send::<P, R>(method, arg).await?.into_result()
    }

    /// Close the socket if it is open.
    ///
    /// # Errors
    ///
    /// Returns the error if the socket cannot be shut down cleanly. The
    /// socket is released either way.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.get_mut().shutdown().await?;
            tracing::debug!("Closed RPC connection to {}", self.addr);
        }
        Ok(())
    }
}

/// Write one request line and read one reply line.
async fn exchange<R: DeserializeOwned>(
    stream: &mut BufReader<TcpStream>,
    request: &[u8],
    id: u64,
) -> Result<RpcResponse<R>> {
    let socket = stream.get_mut();
    socket.write_all(request).await?;
    socket.flush().await?;

    let mut line = String::new();
    if stream.read_line(&mut line).await? == 0 {
        return Err(WorkerError::ConnectionClosed);
    }

    let reply: RawReply = serde_json::from_str(&line)?;
    if reply.id != id {
        return Err(WorkerError::IdMismatch {
            expected: id,
            actual: reply.id,
        });
    }
    reply.into_response()
}
