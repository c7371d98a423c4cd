//! Outgoing Payloads
//!
//! A [`ResponseContext`] is what the write path hands to
//! [`Connection::respond`](crate::connection::Connection::respond).
//! It is already serialized: the connection writes the bytes verbatim and
//! never looks inside.

use crate::protocol::header::{Header, HEADER_LEN};
use bytes::{BufMut, Bytes, BytesMut};

/// A pre-serialized response, ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    payload: Bytes,
}

impl ResponseContext {
    /// Wraps bytes that were serialized elsewhere.
    pub fn from_bytes(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Serializes `body` behind a header that echoes `request_id` and `method`.
    ///
    /// Returns `None` if `body` cannot be described by a `u32` length.
    pub fn framed(request_id: u32, method: u64, body: &[u8]) -> Option<Self> {
        let len = u32::try_from(body.len()).ok()?;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
        Header::new(len, request_id, method).encode(&mut buf);
        buf.put_slice(body);
        Some(Self {
            payload: buf.freeze(),
        })
    }

    /// The bytes to write.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Bytes> for ResponseContext {
    fn from(payload: Bytes) -> Self {
        Self::from_bytes(payload)
    }
}
