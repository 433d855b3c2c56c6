//! # segwal
//!
//! A durable, append-only write-ahead log that persists entries as framed
//! records in segment files inside a single directory:
//!
//! - Strictly increasing 32-bit offsets assigned at append time
//! - Per-record payload checksums for corruption detection
//! - Group commit: concurrent writers share a single fsync, optionally
//!   batched over a configurable delay
//! - Segment rotation once the active file grows past a size threshold
//! - Recovery of the offset counter from the newest segment on startup
//!
//! Callers define their own record types by implementing the [`Entry`] trait
//! and registering a constructor per type tag in an [`EntryRegistry`], which
//! lets the WAL instantiate the right type when loading segments from disk.
//!
//! ```
//! use segwal::waltest::{example_registry, ExampleEntry1};
//! use segwal::{Configuration, Wal};
//!
//! # fn main() -> Result<(), segwal::WalError> {
//! let dir = tempfile::tempdir()?;
//!
//! // By default the WAL prefers strong durability and fsyncs every write
//! // immediately. Configure a sync delay to batch up fsyncs under high
//! // throughput.
//! let wal = Wal::new(dir.path(), Configuration::default(), example_registry())?;
//!
//! // When write returns without an error, the entry is fully on disk.
//! let offset = wal.write(&ExampleEntry1::new(42, vec![1.0, 2.0, 3.0]))?;
//! assert_eq!(offset, 1);
//!
//! wal.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod reader;
pub mod registry;
pub mod segment;
pub mod wal;
pub mod waltest;
pub mod writer;

pub use config::{
    Configuration, DEFAULT_ENTRY_PAYLOAD_SIZE, DEFAULT_MAX_SEGMENT_SIZE, DEFAULT_WRITE_BUFFER_SIZE,
};
pub use entry::{Entry, EntryType};
pub use error::WalError;
pub use reader::SegmentReader;
pub use registry::{EntryConstructor, EntryRegistry};
pub use segment::SegmentId;
pub use wal::Wal;
pub use writer::{SegmentSink, SegmentWriter};

/// Size of the fixed record header in bytes: 4B offset + 1B type + 4B CRC.
pub const RECORD_HEADER_SIZE: usize = 9;
