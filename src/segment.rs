//! Segment file naming and directory scanning.
//!
//! A WAL consists of a sequence of append-only segment files in a single
//! directory. Segment IDs are decimal without zero padding (`1.wal`,
//! `2.wal`, …), so files must be ordered by parsed ID rather than by name:
//! lexicographic order goes wrong as soon as IDs reach two digits.

use crate::error::WalError;
use std::path::{Path, PathBuf};

/// Segment identifier (monotonically increasing, starts at 1).
pub type SegmentId = u64;

/// Returns the file name of the segment with the given ID.
pub fn segment_file_name(id: SegmentId) -> String {
    format!("{id}.wal")
}

/// Parses a segment ID from a file name such as `42.wal`.
pub fn parse_segment_file_name(name: &str) -> Option<SegmentId> {
    let stem = name.strip_suffix(".wal")?;
    stem.parse().ok()
}

/// Lists all WAL segment files in the directory, sorted by numeric ID
/// ascending. The WAL resumes appending to the last element.
pub fn list_segment_files(dir: &Path) -> Result<Vec<(SegmentId, PathBuf)>, WalError> {
    let mut segments = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(parse_segment_file_name) {
            segments.push((id, entry.path()));
        }
    }

    segments.sort_by_key(|(id, _)| *id);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn file_name_roundtrip() {
        assert_eq!(segment_file_name(1), "1.wal");
        assert_eq!(segment_file_name(42), "42.wal");
        assert_eq!(parse_segment_file_name("1.wal"), Some(1));
        assert_eq!(parse_segment_file_name("42.wal"), Some(42));
        assert_eq!(parse_segment_file_name("segment.wal"), None);
        assert_eq!(parse_segment_file_name("1.log"), None);
        assert_eq!(parse_segment_file_name("1"), None);
    }

    #[test]
    fn list_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        for id in [10, 2, 1, 9, 11] {
            File::create(dir.path().join(segment_file_name(id))).unwrap();
        }
        File::create(dir.path().join("notasegment.txt")).unwrap();

        let segments = list_segment_files(dir.path()).unwrap();
        let ids: Vec<SegmentId> = segments.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 9, 10, 11]);
    }

    #[test]
    fn list_empty_directory() {
        let dir = TempDir::new().unwrap();
        let segments = list_segment_files(dir.path()).unwrap();
        assert!(segments.is_empty());
    }
}
