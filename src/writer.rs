//! Writing WAL entry records to disk.

use crate::config::DEFAULT_WRITE_BUFFER_SIZE;
use crate::entry::EntryType;
use crate::error::WalError;
use crate::RECORD_HEADER_SIZE;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// A sink the [`SegmentWriter`] can write records into. Files additionally
/// support syncing the filesystem's in-memory copy of recently written data
/// to disk; for any other sink that step is a no-op.
pub trait SegmentSink: Write {
    fn sync_data(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SegmentSink for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }
}

impl SegmentSink for Vec<u8> {}

impl<S: SegmentSink + ?Sized> SegmentSink for &mut S {
    fn sync_data(&mut self) -> io::Result<()> {
        (**self).sync_data()
    }
}

/// The SegmentWriter writes WAL entry records to a single segment, handling
/// the necessary buffered I/O and file system syncing.
///
/// Every entry is written using the following binary layout (big endian):
///
/// ```text
/// ┌─────────────┬───────────┬──────────┬─────────┐
/// │ Offset (4B) │ Type (1B) │ CRC (4B) │ Payload │
/// └─────────────┴───────────┴──────────┴─────────┘
/// ```
///
/// - Offset: 32-bit WAL entry number of the record
/// - Type: type tag of the WAL entry
/// - CRC: 32-bit IEEE checksum computed over the payload
/// - Payload: the entry payload data
pub struct SegmentWriter<W: SegmentSink> {
    w: BufWriter<W>,
    // Bytes appended since this writer was opened. The WAL uses this to
    // decide segment rollover.
    size: usize,
}

impl<W: SegmentSink> SegmentWriter<W> {
    /// Creates a SegmentWriter writing to `w`, using the default write
    /// buffer size.
    pub fn new(w: W) -> Self {
        Self::with_buffer_size(w, DEFAULT_WRITE_BUFFER_SIZE)
    }

    /// Creates a SegmentWriter writing to `w` whose buffer has at least the
    /// specified size. A zero size selects the default.
    pub fn with_buffer_size(w: W, buffer_size: usize) -> Self {
        let buffer_size = if buffer_size == 0 {
            DEFAULT_WRITE_BUFFER_SIZE
        } else {
            buffer_size
        };

        Self {
            w: BufWriter::with_capacity(buffer_size, w),
            size: 0,
        }
    }

    /// Writes a single WAL entry record into the write buffer. No I/O is
    /// forced; call [`sync`](SegmentWriter::sync) to make the record durable.
    ///
    /// The payload is passed in already encoded because encoding happens at
    /// an earlier stage than writing data to the WAL segment.
    pub fn write(
        &mut self,
        offset: u32,
        entry_type: EntryType,
        checksum: u32,
        payload: &[u8],
    ) -> Result<(), WalError> {
        self.w.write_all(&offset.to_be_bytes())?;
        self.w.write_all(&[entry_type.as_u8()])?;
        self.w.write_all(&checksum.to_be_bytes())?;
        self.w.write_all(payload)?;

        self.size += RECORD_HEADER_SIZE + payload.len();
        Ok(())
    }

    /// The number of bytes appended since this writer was opened.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Flushes any buffered data to the underlying sink and syncs the file
    /// system's in-memory copy of recently written data to disk when writing
    /// to a [`File`].
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.w.flush()?;
        self.w.get_mut().sync_data()?;
        Ok(())
    }

    /// Ensures that all buffered data is flushed and synced before closing
    /// the underlying sink.
    pub fn close(mut self) -> Result<(), WalError> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::tempfile;

    #[test]
    fn write_record_layout() {
        let mut buf = Vec::new();
        let mut writer = SegmentWriter::new(&mut buf);

        let offset = 1234_u32;
        let entry_type = EntryType(0);
        let payload = [1, 2, 3, 4, 5];
        let checksum = 0x470b99f4_u32;

        writer.write(offset, entry_type, checksum, &payload).unwrap();

        // The segment writer uses buffered I/O, so the record only becomes
        // visible in the sink after a sync.
        writer.sync().unwrap();
        drop(writer);

        let mut expected = Vec::new();
        expected.extend_from_slice(&offset.to_be_bytes()); // Offset (4B)
        expected.push(0); // Type (1B)
        expected.extend_from_slice(&[0x47, 0x0b, 0x99, 0xf4]); // CRC (4B)
        expected.extend_from_slice(&payload); // Payload

        assert_eq!(buf, expected);
    }

    #[test]
    fn write_updates_size() {
        let mut buf = Vec::new();
        let mut writer = SegmentWriter::new(&mut buf);
        assert_eq!(writer.size(), 0);

        writer
            .write(42, EntryType(0), 0x470b99f4, &[1, 2, 3, 4, 5])
            .unwrap();
        assert_eq!(writer.size(), 4 + 1 + 4 + 5);

        writer
            .write(43, EntryType(0), 0x470b99f4, b"abc")
            .unwrap();
        assert_eq!(writer.size(), 14 + 4 + 1 + 4 + 3);
    }

    #[test]
    fn close_flushes_buffer() {
        let mut buf = Vec::new();
        let mut writer = SegmentWriter::new(&mut buf);

        writer
            .write(1, EntryType(0), 0x470b99f4, &[1, 2, 3, 4, 5])
            .unwrap();
        writer.close().unwrap();

        assert_eq!(buf.len(), 14);
        assert_eq!(&buf[9..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn close_syncs_file() {
        let file = tempfile().unwrap();
        let mut read_handle = file.try_clone().unwrap();

        let mut writer = SegmentWriter::new(file);
        writer
            .write(0, EntryType(0), 0x470b99f4, &[1, 2, 3, 4, 5])
            .unwrap();
        writer.close().unwrap();

        // The cloned handle shares the file offset, so rewind before reading.
        read_handle.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        read_handle.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 14);
        assert_eq!(&contents[9..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_buffer_size_selects_default() {
        let mut buf = Vec::new();
        let mut writer = SegmentWriter::with_buffer_size(&mut buf, 0);
        writer.write(1, EntryType(7), 0, b"x").unwrap();
        writer.sync().unwrap();
        drop(writer);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf[4], 7);
    }
}
