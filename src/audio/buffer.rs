//! # Session Buffer Store
//!
//! Accumulates raw PCM audio per session for later bulk retrieval via
//! `GET /audio/buffer`. Each session gets a growable byte buffer with a hard
//! size cap; once the cap is exceeded the oldest bytes are dropped so the
//! buffer always holds exactly the most recent `cap` bytes.
//!
//! ## Concurrency:
//! Guarded by one `std::sync::Mutex`, independent of the relay hub. Producer
//! request handlers append synchronously on their own execution context
//! rather than going through the hub mailbox; append and cap-trim happen in
//! a single critical section so interleaved producers cannot corrupt a
//! buffer.
//!
//! ## Lifetime:
//! Buffers are created lazily on first append and live for the process
//! lifetime. There is no per-session eviction; the cap bounds each session,
//! not the number of sessions.

use std::collections::HashMap;
use std::sync::Mutex;

/// Default per-session cap: 10 MiB of recent audio.
pub const DEFAULT_BUFFER_CAP_BYTES: usize = 10 * 1024 * 1024;

/// Per-session sliding-window byte buffers.
pub struct SessionBufferStore {
    buffers: Mutex<HashMap<String, Vec<u8>>>,
    cap: usize,
}

impl SessionBufferStore {
    /// Create a store whose per-session buffers are capped at `cap` bytes.
    pub fn new(cap: usize) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            cap,
        }
    }

    /// Append `bytes` to the session's buffer, creating it on first use,
    /// and trim from the front if the cap is exceeded. Returns the buffer
    /// length after the append.
    pub fn append(&self, session_id: &str, bytes: &[u8]) -> usize {
        let mut buffers = self.buffers.lock().unwrap();
        let buffer = buffers.entry(session_id.to_string()).or_default();

        buffer.extend_from_slice(bytes);
        if buffer.len() > self.cap {
            let excess = buffer.len() - self.cap;
            buffer.drain(..excess);
        }

        buffer.len()
    }

    /// Full current buffer for a session, or `None` if the session has never
    /// appended data. A missing session is a normal state, not an error.
    pub fn read(&self, session_id: &str) -> Option<Vec<u8>> {
        self.buffers.lock().unwrap().get(session_id).cloned()
    }

    /// Number of sessions holding a buffer.
    pub fn session_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    /// Total bytes held across all sessions.
    pub fn total_bytes(&self) -> usize {
        self.buffers.lock().unwrap().values().map(Vec::len).sum()
    }

    /// The configured per-session cap.
    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for SessionBufferStore {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAP_BYTES)
    }
}
