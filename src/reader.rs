//! Reading WAL entry records from their binary representation.

use crate::entry::{Entry, EntryType};
use crate::error::WalError;
use crate::registry::EntryRegistry;
use crate::RECORD_HEADER_SIZE;
use std::io::{self, BufReader, Read};

/// The SegmentReader iterates over the WAL entries of a single segment,
/// typically read from disk. The WAL uses it to resume the last open segment
/// on startup, but it can also be used to manually iterate through segments.
///
/// The complete usage pattern looks like this:
///
/// ```no_run
/// # use segwal::{EntryRegistry, SegmentReader, WalError};
/// # fn example(file: std::fs::File, registry: &EntryRegistry) -> Result<(), WalError> {
/// let mut r = SegmentReader::new(file, registry);
/// while r.advance() {
///     let offset = r.offset();
///     let entry = r.decode()?;
///     // …
/// }
///
/// if let Some(err) = r.err() {
///     return Err(err.clone());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SegmentReader<'a, R: Read> {
    r: BufReader<R>,
    registry: &'a EntryRegistry,
    offset: u32,
    checksum: u32,
    entry: Option<Box<dyn Entry>>,
    payload: Vec<u8>,
    err: Option<WalError>,
}

impl<'a, R: Read> SegmentReader<'a, R> {
    /// Creates a SegmentReader that reads encoded WAL entries from `r`. The
    /// registry maps the type tags that have been read to the [`Entry`]
    /// implementations which contain the decoding logic.
    pub fn new(r: R, registry: &'a EntryRegistry) -> Self {
        Self {
            r: BufReader::new(r),
            registry,
            offset: 0,
            checksum: 0,
            entry: None,
            payload: Vec::new(),
            err: None,
        }
    }

    /// Loads the data of the next entry from the underlying reader.
    ///
    /// For efficiency reasons, this function neither checks the entry
    /// checksum nor decodes the entry bytes, so a caller can quickly seek
    /// through a WAL up to a specific offset without paying for every record
    /// on the way. Use [`offset`](SegmentReader::offset) for the current
    /// entry's offset and [`decode`](SegmentReader::decode) to actually
    /// decode it.
    ///
    /// Returns `false` on a clean end of the segment, or when an error was
    /// encountered; in the latter case the error is available via
    /// [`err`](SegmentReader::err).
    pub fn advance(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        let header = match self.read_header() {
            Ok(Some(header)) => header,
            Ok(None) => return false, // clean EOF at a record boundary
            Err(err) => {
                self.err = Some(err);
                return false;
            }
        };

        self.offset = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let entry_type = EntryType(header[4]);
        self.checksum = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);

        let entry = match self.registry.new_entry(entry_type) {
            Ok(entry) => entry,
            Err(err) => {
                self.err = Some(err);
                return false;
            }
        };

        match entry.read_payload(&mut self.r) {
            Ok(payload) => self.payload = payload,
            Err(err) => {
                self.err = Some(err.into());
                return false;
            }
        }

        self.entry = Some(entry);
        true
    }

    // Reads the next 9-byte record header. EOF before the first header byte
    // is the regular end of a segment; EOF in the middle of a header means
    // the record was torn.
    fn read_header(&mut self) -> Result<Option<[u8; RECORD_HEADER_SIZE]>, WalError> {
        let mut header = [0; RECORD_HEADER_SIZE];
        let mut filled = 0;

        while filled < header.len() {
            match self.r.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Some(header))
    }

    /// Returns the offset of the last entry that was read by
    /// [`advance`](SegmentReader::advance).
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Decodes the last entry that was read by
    /// [`advance`](SegmentReader::advance). The payload checksum is verified
    /// here, not during `advance`.
    pub fn decode(&mut self) -> Result<Box<dyn Entry>, WalError> {
        let mut entry = self.entry.take().ok_or(WalError::NoEntry)?;

        if self.checksum != crc32fast::hash(&self.payload) {
            return Err(WalError::Corruption {
                offset: self.offset,
            });
        }

        entry.decode_payload(&self.payload)?;
        Ok(entry)
    }

    /// Reads through the entire segment and returns the last offset, or 0 if
    /// the segment holds no records. Any error encountered on the way is
    /// propagated.
    pub fn seek_end(&mut self) -> Result<u32, WalError> {
        let mut last_offset = 0;
        while self.advance() {
            last_offset = self.offset();
        }

        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(last_offset),
        }
    }

    /// Returns the sticky error observed by any previous operation, if any.
    /// This must be checked after an iteration loop, even if
    /// [`advance`](SegmentReader::advance) never returned `true`.
    pub fn err(&self) -> Option<&WalError> {
        self.err.as_ref()
    }
}
