//! Message dispatcher - the worker's main loop.
//!
//! The [`Dispatcher`] owns the worker's input, output and error handles and
//! drives one [`Handler`] over them:
//! 1. Write the `ok\n` readiness handshake
//! 2. Read a frame
//! 3. Call the handler and wait for it
//! 4. Frame the handler's payload back
//! 5. Repeat until end of input or failure
//!
//! Exactly one frame is in flight at a time. No frame is read while the
//! handler runs.
//!
//! # Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use corerunner_worker::Dispatcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut dispatcher = Dispatcher::stdio();
//!     let exit = dispatcher
//!         .run(|payload: Bytes| async move { Ok(payload) })
//!         .await;
//!     std::process::exit(exit.exit_code());
//! }
//! ```

use std::error::Error as StdError;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, Stderr, Stdin, Stdout};

use crate::error::WorkerError;
use crate::handler::Handler;
use crate::protocol::{FrameReader, FrameWriter, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FRAME_SIZE};

/// Indentation for continuation lines of the diagnostic context block.
const CONTEXT_INDENT: &str = "\n         ";

/// What the dispatcher does when the handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Report the error and stop reading frames.
    #[default]
    Abort,
    /// Report the error, answer the frame with an empty payload, keep going.
    Skip,
}

/// Why [`Dispatcher::run`] returned.
#[derive(Debug)]
pub enum ExitReason {
    /// The supervisor closed the input. Normal shutdown.
    InputClosed,
    /// The loop was aborted by an unrecoverable error.
    Failed(WorkerError),
}

impl ExitReason {
    /// Process exit code to report to the supervisor.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::InputClosed => 0,
            ExitReason::Failed(_) => 1,
        }
    }

    /// Check if the loop ended by a clean end of input.
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitReason::InputClosed)
    }
}

/// Builder for configuring a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    chunk_size: usize,
    max_frame_size: usize,
    error_policy: ErrorPolicy,
}

impl DispatcherBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Set the bound on a single underlying read or write.
    ///
    /// Default: 2048
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the largest frame the worker accepts.
    ///
    /// Default: 1 GiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set what happens when the handler fails.
    ///
    /// Default: [`ErrorPolicy::Abort`]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Build a dispatcher over the given handles.
    pub fn build<R, W, E>(self, input: R, output: W, error: E) -> Dispatcher<R, W, E>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        Dispatcher {
            reader: FrameReader::with_limits(input, self.chunk_size, self.max_frame_size),
            writer: FrameWriter::with_chunk_size(output, self.chunk_size),
            error,
            error_policy: self.error_policy,
            frames_handled: 0,
        }
    }

    /// Build a dispatcher over the process's stdin, stdout and stderr.
    pub fn stdio(self) -> Dispatcher<Stdin, Stdout, Stderr> {
        self.build(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side message loop over an input, an output and an error handle.
pub struct Dispatcher<R, W, E> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    error: E,
    error_policy: ErrorPolicy,
    frames_handled: u64,
}

impl Dispatcher<Stdin, Stdout, Stderr> {
    /// Create a new dispatcher builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatcher over the process's stdio with default settings.
    pub fn stdio() -> Self {
        DispatcherBuilder::new().stdio()
    }
}

impl<R, W, E> Dispatcher<R, W, E>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    /// Dispatcher over arbitrary handles with default settings.
    pub fn new(input: R, output: W, error: E) -> Self {
        DispatcherBuilder::new().build(input, output, error)
    }

    /// Number of frames answered so far.
    pub fn frames_handled(&self) -> u64 {
        self.frames_handled
    }

    /// Run the message loop until end of input or an unrecoverable error.
    ///
    /// Writes the readiness handshake first. Every failure that ends the loop
    /// has already been reported on the error handle when this returns.
    pub async fn run<H: Handler>(&mut self, mut handler: H) -> ExitReason {
        self.run_with(&mut handler).await
    }

    /// Same as [`run`](Self::run), but borrows the handler so its state
    /// (an open RPC connection, for instance) is still available afterwards.
    pub async fn run_with<H: Handler + ?Sized>(&mut self, handler: &mut H) -> ExitReason {
        if let Err(e) = self.writer.write_ready().await {
            return self.fail(e).await;
        }
        tracing::debug!("Worker ready");

        loop {
            let payload = match self.reader.next_frame().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tracing::info!(frames = self.frames_handled, "Input closed, shutting down");
                    return ExitReason::InputClosed;
                }
                Err(e) => return self.fail(e).await,
            };

            let frame = self.frames_handled + 1;
            tracing::debug!(frame, len = payload.len(), "Frame received");

            let response = match handler.call(payload).await {
                Ok(response) => response,
                Err(e) => match self.error_policy {
                    ErrorPolicy::Abort => {
                        tracing::error!(frame, "Handler error: {}", e);
                        return self.fail(e).await;
                    }
                    ErrorPolicy::Skip => {
                        tracing::warn!(frame, "Handler error, skipping frame: {}", e);
                        self.report_error(&e).await;
                        Bytes::new()
                    }
                },
            };

            if let Err(e) = self.writer.write_frame(&response).await {
                return self.fail(e).await;
            }
            self.frames_handled = frame;
            tracing::debug!(frame, len = response.len(), "Frame answered");
        }
    }

    async fn fail(&mut self, err: WorkerError) -> ExitReason {
        self.report_error(&err).await;
        ExitReason::Failed(err)
    }

    /// Write a diagnostic for `err` to the error handle.
    ///
    /// One highlighted line with the error, then a `Context:` block with the
    /// error's source chain when it has one.
    pub async fn report_error(&mut self, err: &WorkerError) {
        let report = format_report(err);
        let written = async {
            self.error.write_all(report.as_bytes()).await?;
            self.error.flush().await
        }
        .await;

        if let Err(e) = written {
            tracing::warn!("Could not write diagnostic to error stream: {}", e);
        }
    }

    /// Consume the dispatcher and return its input, output and error handles.
    pub fn into_parts(self) -> (R, W, E) {
        (self.reader.into_inner(), self.writer.into_inner(), self.error)
    }
}

/// Render the diagnostic written to the error stream.
fn format_report(err: &WorkerError) -> String {
    let mut report = format!("\x1b[1;31mError from worker: {}\x1b[0m\n", err);
    if let Some(context) = error_context(err) {
        report.push_str("\x1b[1mContext:\x1b[0m ");
        report.push_str(&context.replace('\n', CONTEXT_INDENT));
        report.push('\n');
    }
    report
}

/// The source chain of `err`, one cause per line.
///
/// A cause already spelled out at the end of the line above it (the usual
/// `"...: {0}"` wrapping) is not repeated.
fn error_context(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut previous = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let line = cause.to_string();
        if !previous.ends_with(&line) {
            lines.push(line.clone());
        }
        previous = line;
        source = cause.source();
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
