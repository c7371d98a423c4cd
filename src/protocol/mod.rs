//! Wire Protocol
//!
//! This module defines the framing used between clients and the server.
//!
//! ## Overview
//!
//! Every message is a fixed-size [`Header`] followed by a body whose length
//! the header declares. Headers announcing an empty body are keep-alives.
//!
//! ## Modules
//!
//! - `header`: The 16-byte frame header and the buffer bounds
//! - `response`: Pre-serialized outgoing payloads
//!
//! ## Example
//!
//! ```
//! use flashwire::protocol::{Header, ResponseContext, HEADER_LEN};
//!
//! // Decoding an incoming header
//! let raw = Header::new(5, 1, 42).to_bytes();
//! let header = Header::decode(&raw);
//! assert_eq!(header.len, 5);
//!
//! // Building a response for the write path
//! let response = ResponseContext::framed(header.request_id, header.method, b"hello").unwrap();
//! assert_eq!(response.len(), HEADER_LEN + 5);
//! ```

pub mod header;
pub mod response;

// Re-export commonly used types for convenience
pub use header::{Header, HEADER_LEN, MAX_BUF_LEN, PAGE_SIZE};
pub use response::ResponseContext;
