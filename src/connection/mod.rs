//! Connection Module
//!
//! This module manages the read path of individual client connections.
//! Each accepted socket is wrapped in a [`Connection`] that frames incoming
//! bytes into messages and reports them through per-connection callbacks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │ Connection::new + start│──> ConnectionRegistry
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn read + write tasks
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Connection                              │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read header │───>│ Read body   │───>│  on_read    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │         ▲                                     │             │
//! │         └─────────────────────────────────────┘             │
//! │                                                             │
//! │  respond() ──> response queue ──> write task ──> socket     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Idle Timeout**: A deadline races every outstanding read
//! - **Buffer Management**: The receive buffer grows to fit the largest body
//! - **Single Close**: Errors are reported through `on_error` exactly once
//! - **Statistics**: Tracks connection and frame metrics
//!
//! ## Example
//!
//! ```ignore
//! use flashwire::connection::{Callbacks, Connection, ConnectionConfig, ConnectionStats};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//! let callbacks = Callbacks::new()
//!     .on_read(|conn, frame| println!("{}: {} bytes", conn.id(), frame.len()))
//!     .on_error(|conn, err| println!("{} closed: {}", conn.id(), err));
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let conn = Connection::new(stream, addr, ConnectionConfig::default(), callbacks, stats);
//! conn.start();
//! ```

pub mod config;
pub mod handler;
pub mod registry;
pub mod stats;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use handler::{
    Callbacks, Connection, ConnectionError, ConnectionState, Frame, OnError, OnRead,
};
pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
