//! WAL error types.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during WAL operations.
///
/// The type is `Clone` because a single fsync outcome is delivered to every
/// writer that joined the batch, and because the [`SegmentReader`] keeps the
/// first error it observed across subsequent calls.
///
/// [`SegmentReader`]: crate::SegmentReader
#[derive(Debug, Clone, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    #[error("detected WAL entry corruption at WAL offset {offset}")]
    Corruption { offset: u32 },

    #[error("unknown WAL entry type {0:x}")]
    UnknownEntryType(u8),

    #[error("entry type {0:x} was already registered")]
    DuplicateEntryType(u8),

    #[error("WAL is already closed")]
    Closed,

    #[error("invalid WAL entry payload: {0}")]
    InvalidPayload(String),

    #[error("no WAL entry has been read yet")]
    NoEntry,
}

impl From<io::Error> for WalError {
    fn from(err: io::Error) -> Self {
        WalError::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            WalError::Corruption { offset: 1 }.to_string(),
            "detected WAL entry corruption at WAL offset 1"
        );
        assert_eq!(
            WalError::UnknownEntryType(0xab).to_string(),
            "unknown WAL entry type ab"
        );
        assert_eq!(WalError::Closed.to_string(), "WAL is already closed");
    }

    #[test]
    fn io_errors_are_cloneable() {
        let err = WalError::from(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
