//! # FlashWire - Connection Read Path for Framed Request/Response Servers
//!
//! FlashWire owns one accepted TCP socket at a time and turns its byte stream
//! into framed messages: a fixed 16-byte header followed by the body the
//! header announces. Each framed message is handed to a per-connection read
//! callback; every terminal condition is reported once through an error
//! callback.
//!
//! ## Features
//!
//! - **Header/Body Framing**: Big-endian 16-byte header, keep-alive frames
//! - **Idle Timeout**: Every outstanding read races a configurable deadline
//! - **Bounded Buffers**: Receive buffer grows to fit, capped by a frame ceiling
//! - **Safe Lifetimes**: In-flight reads and writes keep the connection alive
//! - **Async I/O**: Built on Tokio for handling thousands of concurrent connections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashWire                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  on_read    │                  │
//! │  │ (Listener)  │    │ (read task) │    │  callback   │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │ respond()               │
//! │                            │ on_error         ▼                         │
//! │                            ▼           ┌─────────────┐                  │
//! │                     ┌─────────────┐    │ write task  │                  │
//! │                     │  Registry   │    └─────────────┘                  │
//! │                     └─────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashwire::connection::{Callbacks, Connection, ConnectionConfig, ConnectionStats};
//! use flashwire::protocol::ResponseContext;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = Arc::new(ConnectionStats::new());
//!     let config = ConnectionConfig::default().with_timeout(Duration::from_secs(30));
//!     let listener = TcpListener::bind("127.0.0.1:9000").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let callbacks = Callbacks::new().on_read(|conn, frame| {
//!             let h = frame.header();
//!             if let Some(echo) = ResponseContext::framed(h.request_id, h.method, frame.body()) {
//!                 let _ = conn.respond(echo);
//!             }
//!         });
//!
//!         let conn = Connection::new(stream, addr, config.clone(), callbacks, Arc::clone(&stats));
//!         conn.start();
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Frame header layout and outgoing payloads
//! - [`connection`]: The connection state machine, registry and statistics
//!
//! ## Design Highlights
//!
//! ### One Outstanding Read
//!
//! The read task issues the header read, then the body read, then invokes the
//! callback, strictly in that order. Frames on one connection can never be
//! reordered or interleaved.
//!
//! ### Exactly-Once Failure
//!
//! Timer expiry, read errors, write errors and oversized frames all funnel into
//! one compare-and-swap on the connection's `closed` flag. Only the winner
//! invokes `on_error`.

pub mod connection;
pub mod protocol;

// Re-export commonly used types for convenience
pub use connection::{
    Callbacks, Connection, ConnectionConfig, ConnectionError, ConnectionRegistry,
    ConnectionState, ConnectionStats, Frame,
};
pub use protocol::{Header, ResponseContext, HEADER_LEN, MAX_BUF_LEN, PAGE_SIZE};

/// The default port FlashWire listens on
pub const DEFAULT_PORT: u16 = 9000;

/// The default host FlashWire binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of FlashWire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
