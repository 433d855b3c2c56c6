//! WAL configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default size of the segment write buffer in bytes.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 16 * 1024;

/// Default segment size in bytes at which segment files are rotated.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 10 * 1024 * 1024;

/// Default initial size of pooled entry payload buffers.
pub const DEFAULT_ENTRY_PAYLOAD_SIZE: usize = 128;

/// Runtime options of a write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Size of the segment write buffer in bytes. Zero selects the default.
    pub write_buffer_size: usize,

    /// File size in bytes at which the segment files will be rotated.
    pub max_segment_size: usize,

    /// Initial size for pooled entry payload buffers. Can be tuned to reduce
    /// allocations when the typical payload size is known.
    pub entry_payload_size: usize,

    /// How long to wait before syncing writes to disk. The default of zero
    /// causes every write to be synced immediately; a small delay lets the
    /// WAL batch up fsyncs for multiple writes.
    pub sync_delay: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            entry_payload_size: DEFAULT_ENTRY_PAYLOAD_SIZE,
            sync_delay: Duration::ZERO,
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    pub fn with_max_segment_size(mut self, size: usize) -> Self {
        self.max_segment_size = size;
        self
    }

    pub fn with_entry_payload_size(mut self, size: usize) -> Self {
        self.entry_payload_size = size;
        self
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }
}
