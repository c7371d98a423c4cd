//! Per-connection settings.

use crate::protocol::{MAX_BUF_LEN, PAGE_SIZE};
use std::time::Duration;

/// Configuration for a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Idle timeout for an outstanding read (zero disables it)
    pub timeout: Duration,

    /// Initial length of the receive buffer (default: 4 KB)
    pub page_size: usize,

    /// Largest body length a header may declare (default: 10 MB)
    pub max_frame_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            page_size: PAGE_SIZE,
            max_frame_len: MAX_BUF_LEN,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Returns true if reads are subject to the idle timeout.
    pub fn timeout_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }
}
