//! Frame Header
//!
//! Every message on the wire is a fixed 16-byte header followed by exactly
//! `len` body bytes. All integers are big-endian (network byte order).
//!
//! ## Layout
//!
//! ```text
//!  0               4               8                              16
//!  ┌───────────────┬───────────────┬───────────────────────────────┐
//!  │   len (u32)   │ request_id    │         method (u64)          │
//!  │               │    (u32)      │                               │
//!  └───────────────┴───────────────┴───────────────────────────────┘
//!  followed by `len` body bytes
//! ```
//!
//! A header with `len == 0` is a keep-alive frame: it carries no body and is
//! consumed by the connection without reaching the read callback.

use bytes::{Buf, BufMut};
use std::fmt;

/// Size of an encoded header in bytes.
pub const HEADER_LEN: usize = 16;

/// Initial length of a connection's receive buffer.
pub const PAGE_SIZE: usize = 4096;

/// Largest body length a header may declare (10 MB).
pub const MAX_BUF_LEN: usize = 10 * 1024 * 1024;

/// The fixed-size prefix of every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Header {
    /// Number of body bytes that follow the header
    pub len: u32,

    /// Correlation id chosen by the client, echoed back in responses
    pub request_id: u32,

    /// Method identifier, interpreted by the dispatcher
    pub method: u64,
}

impl Header {
    /// Creates a header for a body of `len` bytes.
    pub fn new(len: u32, request_id: u32, method: u64) -> Self {
        Self {
            len,
            request_id,
            method,
        }
    }

    /// Creates a keep-alive header (zero-length body).
    pub fn keep_alive() -> Self {
        Self::default()
    }

    /// Returns true if this header announces no body.
    pub fn is_keep_alive(&self) -> bool {
        self.len == 0
    }

    /// Body length as a `usize`.
    pub fn body_len(&self) -> usize {
        self.len as usize
    }

    /// Decodes a header from exactly [`HEADER_LEN`] bytes.
    ///
    /// Every bit pattern is a valid header, so decoding cannot fail;
    /// bounds on `len` are enforced by the connection.
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Self {
        let mut buf = &raw[..];
        let len = buf.get_u32();
        let request_id = buf.get_u32();
        let method = buf.get_u64();
        Self {
            len,
            request_id,
            method,
        }
    }

    /// Appends the encoded header to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.len);
        buf.put_u32(self.request_id);
        buf.put_u64(self.method);
    }

    /// Encodes the header into a fixed-size array.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        self.encode(&mut &mut raw[..]);
        raw
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} request_id={} method={:#x}",
            self.len, self.request_id, self.method
        )
    }
}
