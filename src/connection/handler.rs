//! Connection Handler Module
//!
//! This module drives the read path of a single accepted socket.
//! A [`Connection`] repeatedly reads a fixed-size [`Header`], then the body
//! the header announces, and hands the framed message to the read callback.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Acceptor builds the Connection        (Idle)
//!        │
//!        │ start()
//!        ▼
//! 2. ┌───────────────────────────────────────────┐
//!    │  Arm idle timer, read 16-byte header      │ (AwaitingHeader)
//!    └───────────────┬───────────────────────────┘
//!                    │
//!        len == 0 ───┼──> keep-alive, back to 2
//!                    │
//!        len > max ──┼──> close + on_error(FrameTooLarge)
//!                    │
//!                    ▼
//!    ┌───────────────────────────────────────────┐
//!    │  Grow buffer if needed, read `len` bytes  │ (AwaitingBody)
//!    └───────────────┬───────────────────────────┘
//!                    │ timer cancelled
//!                    ▼
//!    ┌───────────────────────────────────────────┐
//!    │  on_read(conn, frame), back to 2          │
//!    └───────────────────────────────────────────┘
//!
//! Any read/write failure or timer expiry:
//!    close + on_error(cause), exactly once      (Closed)
//! ```
//!
//! ## Ownership
//!
//! A connection lives in an `Arc`. `start` spawns a read task and a write
//! task, each holding its own clone, so the connection cannot be dropped while
//! either has an operation in flight. Both tasks watch the shutdown signal
//! raised by `close` and drop their half of the socket when it fires.
//!
//! ## Completion Guard
//!
//! A single `closed` flag is flipped with a compare-and-swap. Whichever
//! completion flips it reports the failure; every later completion sees the
//! flag already set and stays silent.

use crate::connection::config::ConnectionConfig;
use crate::connection::stats::ConnectionStats;
use crate::protocol::{Header, ResponseContext, HEADER_LEN};
use std::fmt;
use std::future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Callback invoked for every framed message.
pub type OnRead = Arc<dyn Fn(&Arc<Connection>, &Frame<'_>) + Send + Sync>;

/// Callback invoked once when the connection fails.
pub type OnError = Arc<dyn Fn(&Arc<Connection>, &ConnectionError) + Send + Sync>;

/// The callbacks registered on one connection.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_read: Option<OnRead>,
    on_error: Option<OnError>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback that receives each framed message.
    pub fn on_read<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arc<Connection>, &Frame<'_>) + Send + Sync + 'static,
    {
        self.on_read = Some(Arc::new(f));
        self
    }

    /// Sets the callback that is told why the connection closed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arc<Connection>, &ConnectionError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_read", &self.on_read.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Where a connection is in its read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, `start` not yet called
    Idle,
    /// Waiting for the next header
    AwaitingHeader,
    /// Header read, waiting for its body
    AwaitingBody,
    /// Terminal
    Closed,
}

/// A framed message, borrowed from the connection's receive buffer.
///
/// The view only lives for the duration of the read callback; the buffer
/// is reused for the next frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    header: Header,
    body: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The body, exactly `header().len` bytes.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (read/write failure, reset, EOF)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No complete frame arrived within the idle timeout
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// Header declared a body larger than the configured ceiling
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The connection was already closed
    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout(_))
    }

    /// Returns true if the peer went away (EOF, reset, broken pipe).
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result of a read raced against the timer and the shutdown signal.
enum ReadOutcome {
    Complete,
    Closed,
    Failed(ConnectionError),
}

/// One accepted socket and its read loop.
pub struct Connection {
    /// Process-unique identifier
    id: u64,

    /// Client's address (for logging)
    peer: SocketAddr,

    config: ConnectionConfig,

    callbacks: Callbacks,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// The socket until `start` splits it between the two tasks
    stream: Mutex<Option<TcpStream>>,

    /// Queue feeding the write task
    responses: mpsc::UnboundedSender<ResponseContext>,

    /// Receiving end of `responses`, handed to the write task by `start`
    pending_responses: Mutex<Option<mpsc::UnboundedReceiver<ResponseContext>>>,

    state: Mutex<ConnectionState>,

    /// Most recently decoded header
    header: Mutex<Header>,

    /// Current receive buffer length
    buffer_len: AtomicUsize,

    closed: AtomicBool,

    shutdown_tx: watch::Sender<bool>,
}

impl Connection {
    /// Creates a connection around a freshly accepted socket.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `peer` - The client's socket address
    /// * `config` - Timeout and buffer bounds for this connection
    /// * `callbacks` - Read and error callbacks for this connection only
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        config: ConnectionConfig,
        callbacks: Callbacks,
        stats: Arc<ConnectionStats>,
    ) -> Arc<Self> {
        stats.connection_opened();

        let (responses, pending_responses) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            buffer_len: AtomicUsize::new(config.page_size),
            config,
            callbacks,
            stats,
            stream: Mutex::new(Some(stream)),
            responses,
            pending_responses: Mutex::new(Some(pending_responses)),
            state: Mutex::new(ConnectionState::Idle),
            header: Mutex::new(Header::default()),
            closed: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Starts the read loop.
    ///
    /// Disables Nagle's algorithm, then spawns the read and write tasks.
    /// Calling `start` again, or after `close`, does nothing.
    pub fn start(self: &Arc<Self>) {
        let stream = self.stream.lock().unwrap().take();
        let Some(stream) = stream else {
            warn!(conn = self.id, "Connection already started or closed");
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(conn = self.id, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let responses = self.pending_responses.lock().unwrap().take();

        self.set_state(ConnectionState::AwaitingHeader);
        info!(conn = self.id, peer = %self.peer, "Connection started");

        tokio::spawn(Arc::clone(self).read_loop(reader, self.shutdown_tx.subscribe()));
        if let Some(responses) = responses {
            tokio::spawn(Arc::clone(self).write_loop(
                writer,
                responses,
                self.shutdown_tx.subscribe(),
            ));
        }
    }

    /// Submits a pre-serialized response for writing.
    ///
    /// Responses are written in submission order. Responses submitted before
    /// `start` are held until the write task runs. Responses still queued when
    /// the connection closes are discarded.
    pub fn respond(&self, response: ResponseContext) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.responses
            .send(response)
            .map_err(|_| ConnectionError::Closed)
    }

    /// Closes the socket. Safe to call more than once; never reports an error.
    pub fn close(&self) {
        self.shut_down();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The most recently decoded header.
    pub fn header(&self) -> Header {
        *self.header.lock().unwrap()
    }

    /// Length of the receive buffer. Grows to fit the largest body seen.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len.load(Ordering::Relaxed)
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The header → body loop. Owns the read half and the receive buffer.
    async fn read_loop(
        self: Arc<Self>,
        mut reader: OwnedReadHalf,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut head = [0u8; HEADER_LEN];
        let mut buffer = vec![0u8; self.config.page_size];

        while !self.is_closed() {
            self.set_state(ConnectionState::AwaitingHeader);
            let deadline = self.arm_timer();

            match self
                .read_with_deadline(&mut reader, &mut head, deadline, &mut shutdown)
                .await
            {
                ReadOutcome::Complete => {}
                ReadOutcome::Closed => break,
                ReadOutcome::Failed(err) => {
                    self.fail(err);
                    break;
                }
            }

            let header = Header::decode(&head);
            *self.header.lock().unwrap() = header;
            self.stats.bytes_read(HEADER_LEN);
            trace!(conn = self.id, %header, "Read header");

            if header.is_keep_alive() {
                self.stats.keep_alive();
                continue;
            }

            let len = header.body_len();
            if len > self.config.max_frame_len {
                warn!(
                    conn = self.id,
                    peer = %self.peer,
                    size = len,
                    max = self.config.max_frame_len,
                    "Frame size limit exceeded"
                );
                self.fail(ConnectionError::FrameTooLarge {
                    size: len,
                    max: self.config.max_frame_len,
                });
                break;
            }

            if len > buffer.len() {
                buffer.resize(len, 0);
                self.buffer_len.store(len, Ordering::Relaxed);
                trace!(conn = self.id, size = len, "Grew receive buffer");
            }

            self.set_state(ConnectionState::AwaitingBody);

            // The timer is dropped with this read, before any callback runs.
            let outcome = self
                .read_with_deadline(&mut reader, &mut buffer[..len], deadline, &mut shutdown)
                .await;
            match outcome {
                ReadOutcome::Complete => {}
                ReadOutcome::Closed => break,
                ReadOutcome::Failed(err) => {
                    self.fail(err);
                    break;
                }
            }

            if self.is_closed() {
                break;
            }

            self.stats.bytes_read(len);
            self.stats.frame_read();
            trace!(conn = self.id, len = len, "Read body");

            if let Some(on_read) = &self.callbacks.on_read {
                let frame = Frame {
                    header,
                    body: &buffer[..len],
                };
                on_read(&self, &frame);
            }
        }

        trace!(conn = self.id, "Read loop finished");
    }

    /// Fills `buf` unless the deadline passes or the connection closes first.
    async fn read_with_deadline(
        &self,
        reader: &mut OwnedReadHalf,
        buf: &mut [u8],
        deadline: Option<Instant>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReadOutcome {
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.changed() => ReadOutcome::Closed,
            result = reader.read_exact(buf) => match result {
                Ok(_) => ReadOutcome::Complete,
                Err(e) => ReadOutcome::Failed(ConnectionError::Io(e)),
            },
            _ = expired => ReadOutcome::Failed(ConnectionError::Timeout(self.config.timeout)),
        }
    }

    /// Drains the response queue into the write half.
    async fn write_loop(
        self: Arc<Self>,
        writer: OwnedWriteHalf,
        mut responses: mpsc::UnboundedReceiver<ResponseContext>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut writer = BufWriter::new(writer);

        while !self.is_closed() {
            let response = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                response = responses.recv() => match response {
                    Some(response) => response,
                    None => break,
                },
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.write_batch(&mut writer, response, &mut responses) => result,
            };

            if let Err(e) = result {
                self.fail(ConnectionError::Io(e));
                break;
            }
        }

        let discarded = discard_pending(&mut responses);
        if discarded > 0 {
            trace!(conn = self.id, discarded, "Discarded queued responses on close");
        }
        trace!(conn = self.id, "Write loop finished");
    }

    /// Writes `first` and whatever else is already queued, then flushes.
    async fn write_batch(
        &self,
        writer: &mut BufWriter<OwnedWriteHalf>,
        first: ResponseContext,
        responses: &mut mpsc::UnboundedReceiver<ResponseContext>,
    ) -> io::Result<()> {
        let mut written = 0;
        let mut next = Some(first);

        while let Some(response) = next {
            writer.write_all(response.as_bytes()).await?;
            written += response.len();
            next = responses.try_recv().ok();
        }

        writer.flush().await?;
        self.stats.bytes_written(written);
        trace!(conn = self.id, bytes = written, "Sent responses");
        Ok(())
    }

    /// Deadline for the next read. A timeout too large to represent as an
    /// `Instant` never expires.
    fn arm_timer(&self) -> Option<Instant> {
        if self.config.timeout_enabled() {
            Instant::now().checked_add(self.config.timeout)
        } else {
            None
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap();
        if *state != ConnectionState::Closed {
            *state = next;
        }
    }

    /// Closes the connection and reports `err`, unless it is already closed.
    fn fail(self: &Arc<Self>, err: ConnectionError) {
        if !self.shut_down() {
            trace!(conn = self.id, error = %err, "Suppressed error on closed connection");
            return;
        }

        match &err {
            ConnectionError::Timeout(_) => {
                self.stats.timeout();
                debug!(conn = self.id, peer = %self.peer, "Read timed out");
            }
            ConnectionError::FrameTooLarge { .. } => self.stats.oversized_frame(),
            e if e.is_disconnect() => {
                self.stats.transport_error();
                debug!(conn = self.id, peer = %self.peer, "Client disconnected");
            }
            e => {
                self.stats.transport_error();
                warn!(conn = self.id, peer = %self.peer, error = %e, "Connection error");
            }
        }

        if let Some(on_error) = &self.callbacks.on_error {
            on_error(self, &err);
        }
    }

    /// Flips the closed flag and signals both tasks.
    ///
    /// Returns true for the single caller that actually closed the connection.
    fn shut_down(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        *self.state.lock().unwrap() = ConnectionState::Closed;
        self.shutdown_tx.send_replace(true);

        // Not started yet: nobody else owns the socket.
        drop(self.stream.lock().unwrap().take());

        self.stats.connection_closed();
        info!(conn = self.id, peer = %self.peer, "Connection closed");
        true
    }
}

/// Closes the queue and drops whatever is still in it.
fn discard_pending(responses: &mut mpsc::UnboundedReceiver<ResponseContext>) -> usize {
    responses.close();
    let mut discarded = 0;
    while responses.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.stats.connection_closed();
        }
        trace!(conn = self.id, "Connection dropped");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("buffer_len", &self.buffer_len())
            .finish()
    }
}
