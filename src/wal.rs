//! Main WAL implementation.

use crate::config::Configuration;
use crate::entry::{Entry, EntryType};
use crate::error::WalError;
use crate::reader::SegmentReader;
use crate::registry::EntryRegistry;
use crate::segment::{self, SegmentId};
use crate::writer::SegmentWriter;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A durable write-ahead log.
///
/// The WAL persists entries as framed records in append-only segment files
/// inside a single directory. [`write`](Wal::write) is safe to call from many
/// threads concurrently; each call returns only once its record has been
/// fsynced to disk. Writers that arrive while an fsync is already pending are
/// batched into the next one (group commit).
///
/// The handle is cheap to clone; all clones operate on the same log.
#[derive(Clone)]
pub struct Wal {
    inner: Arc<Inner>,
}

struct Inner {
    conf: Configuration,
    path: PathBuf,
    registry: EntryRegistry,

    // Byte buffers reused for encoding new WAL entries.
    buffers: BufferPool,

    state: Mutex<State>,
    sync_scheduled: AtomicBool,

    // Disconnects when the WAL is closed, waking a delayed sync task.
    closing: Receiver<()>,
}

struct State {
    // The last offset that has been written, or zero if no writes occurred yet.
    last_offset: u32,
    // ID of the current WAL segment, used to create segment file names.
    segment_id: SegmentId,
    segment: Option<SegmentWriter<File>>,
    // Writers waiting for the next fsync.
    sync_waiters: Vec<Sender<Result<(), WalError>>>,
    // Dropping the sender signals the closed WAL to everybody holding the
    // receiver side.
    closing_tx: Option<Sender<()>>,
}

impl State {
    fn is_closed(&self) -> bool {
        self.closing_tx.is_none()
    }
}

impl Wal {
    /// Opens a WAL that writes and reads segment files in a directory at the
    /// provided path, creating the directory if necessary.
    ///
    /// If the directory already contains segment files, the newest segment is
    /// read to its end to restore the offset counter, decoding every record
    /// on the way so that corruption surfaces here rather than during later
    /// appends.
    pub fn new(
        path: impl AsRef<Path>,
        conf: Configuration,
        registry: EntryRegistry,
    ) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), ?conf, "creating write-ahead log");

        fs::create_dir_all(&path)?;

        let (closing_tx, closing) = bounded(0);
        let inner = Arc::new(Inner {
            buffers: BufferPool::new(conf.entry_payload_size),
            conf,
            path,
            registry,
            state: Mutex::new(State {
                last_offset: 0,
                segment_id: 0,
                segment: None,
                sync_waiters: Vec::new(),
                closing_tx: Some(closing_tx),
            }),
            sync_scheduled: AtomicBool::new(false),
            closing,
        });

        inner.load()?;

        Ok(Self { inner })
    }

    /// Appends the entry to the log and returns its assigned offset. The call
    /// blocks until the record has been fsynced to disk, possibly sharing a
    /// single fsync with other writers that arrived in the same window.
    pub fn write(&self, entry: &dyn Entry) -> Result<u32, WalError> {
        // Serialize the entry into a pooled buffer before taking the log
        // lock, and checksum the payload to enable detecting corruption.
        let mut payload = self.inner.buffers.get();
        entry.encode_payload(&mut payload);
        let checksum = crc32fast::hash(&payload);

        // The result channel is buffered so the sync task never blocks on
        // delivery, even towards a writer that has already given up.
        let (sync_result_tx, sync_result) = bounded(1);

        let result = Inner::append(
            &self.inner,
            entry.entry_type(),
            checksum,
            &payload,
            sync_result_tx,
        );

        // Return the buffer first; it is cleared before its next use.
        self.inner.buffers.put(payload);

        let offset = result?;

        // Lastly, wait for the fsync that covers this record.
        match sync_result.recv() {
            Ok(sync_outcome) => sync_outcome.map(|()| offset),
            Err(_) => Err(WalError::Closed),
        }
    }

    /// Returns the last offset the WAL has written to disk.
    ///
    /// Calling this forces a sync of any pending writes as a side effect.
    /// Callers that only want a cheap read should remember the offset
    /// returned by their last [`write`](Wal::write) instead.
    pub fn offset(&self) -> u32 {
        let mut state = self.inner.state.lock();
        if !state.is_closed() {
            self.inner.sync_segment(&mut state);
        }

        state.last_offset
    }

    /// Gracefully shuts the WAL down, making sure that all pending writes
    /// are completed and synced to disk before closing the segment file.
    /// Writes after the WAL has been closed fail.
    pub fn close(&self) -> Result<(), WalError> {
        // Holding the lock, no writes happen right now and no new syncs can
        // be scheduled.
        let mut state = self.inner.state.lock();

        tracing::info!("closing WAL");

        if state.segment.is_none() {
            // Never received a single write.
            return Ok(());
        }

        // Wake a delayed sync task and flush all waiting writes.
        state.closing_tx = None;
        self.inner.sync_segment(&mut state);

        match state.segment.take() {
            Some(segment) => segment.close(),
            None => Ok(()),
        }
    }
}

impl Inner {
    fn load(&self) -> Result<(), WalError> {
        tracing::debug!(path = %self.path.display(), "checking for existing WAL segment files");

        let segments = segment::list_segment_files(&self.path)?;
        let Some((last_id, last_path)) = segments.last() else {
            tracing::debug!("did not find any existing WAL segment files, proceeding with empty WAL");
            return Ok(());
        };

        tracing::info!(
            segments = segments.len(),
            last_segment = %last_path.display(),
            "loading existing WAL segments"
        );

        let mut file = OpenOptions::new().read(true).write(true).open(last_path)?;
        let last_offset = self.read_segment(&mut file)?;

        // The segment writer continues where the recovered records end.
        file.seek(SeekFrom::End(0))?;
        let writer = SegmentWriter::with_buffer_size(file, self.conf.write_buffer_size);

        tracing::info!(
            last_offset,
            last_segment = %last_path.display(),
            "finished reading last WAL segment"
        );

        let mut state = self.state.lock();
        state.segment = Some(writer);
        state.segment_id = *last_id;
        state.last_offset = last_offset;

        Ok(())
    }

    fn read_segment(&self, file: &mut File) -> Result<u32, WalError> {
        let mut reader = SegmentReader::new(file, &self.registry);

        let mut last_offset = 0;
        while reader.advance() {
            reader.decode()?;
            last_offset = reader.offset();
        }

        match reader.err() {
            Some(err) => Err(err.clone()),
            None => Ok(last_offset),
        }
    }

    fn append(
        this: &Arc<Self>,
        entry_type: EntryType,
        checksum: u32,
        payload: &[u8],
        sync_result: Sender<Result<(), WalError>>,
    ) -> Result<u32, WalError> {
        let mut state = this.state.lock();

        // While holding the lock, make sure the log has not been closed.
        if state.is_closed() {
            return Err(WalError::Closed);
        }

        // Roll over to a new segment if the current one is full. It might
        // also be that we do not have a segment file at all because this is
        // the very first write to the WAL; then this sets up the writer too.
        this.roll_segment(&mut state)?;

        let offset = state.last_offset + 1;

        tracing::debug!(
            segment_id = state.segment_id,
            offset,
            crc32 = checksum,
            "writing WAL entry"
        );

        state
            .segment
            .as_mut()
            .unwrap()
            .write(offset, entry_type, checksum, payload)?;
        state.last_offset = offset;

        state.sync_waiters.push(sync_result);
        Inner::schedule_sync(this);

        Ok(offset)
    }

    // The caller must hold the log lock.
    fn roll_segment(&self, state: &mut State) -> Result<(), WalError> {
        if let Some(segment) = &state.segment {
            if segment.size() < self.conf.max_segment_size {
                return Ok(());
            }
        }

        self.new_segment_file(state)
    }

    // The caller must hold the log lock.
    fn new_segment_file(&self, state: &mut State) -> Result<(), WalError> {
        state.segment_id += 1;

        if state.segment.is_some() {
            // Sync all waiting writes to the old segment and then close it.
            self.sync_segment(state);
            if let Some(old_segment) = state.segment.take() {
                old_segment.close()?;
            }
        }

        let path = self.path.join(segment::segment_file_name(state.segment_id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        tracing::debug!(
            segment_id = state.segment_id,
            path = %path.display(),
            "starting new WAL segment"
        );

        state.segment = Some(SegmentWriter::with_buffer_size(
            file,
            self.conf.write_buffer_size,
        ));

        Ok(())
    }

    // Sync the segment writer and then notify all writers that currently
    // wait for a WAL sync. The caller must hold the log lock.
    fn sync_segment(&self, state: &mut State) {
        let Some(segment) = state.segment.as_mut() else {
            return;
        };

        let start = Instant::now();
        let result = segment.sync();
        let took = start.elapsed();

        if state.sync_waiters.is_empty() {
            return;
        }

        tracing::debug!(
            result = ?result.as_ref().err(),
            ?took,
            waiting_writes = state.sync_waiters.len(),
            "finished syncing WAL to disk"
        );

        for waiter in state.sync_waiters.drain(..) {
            // Each channel is buffered and has this single producer, so the
            // send cannot block; a writer that already gave up is skipped.
            let _ = waiter.try_send(result.clone());
        }
    }

    // Ensures an asynchronous WAL sync is in flight. If one is already
    // scheduled it will flush the just-registered waiter as well. The caller
    // must hold the log lock.
    fn schedule_sync(this: &Arc<Self>) {
        if this.sync_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(this);
        thread::spawn(move || inner.run_sync_task());
    }

    fn run_sync_task(&self) {
        if self.conf.sync_delay > Duration::ZERO {
            match self.closing.recv_timeout(self.conf.sync_delay) {
                Err(RecvTimeoutError::Timeout) => {} // time is up
                _ => {
                    // We are going down; Wal::close handles the final sync.
                    self.sync_scheduled.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }

        let mut state = self.state.lock();
        if !state.is_closed() {
            self.sync_segment(&mut state);
        }

        // Reset the flag before releasing the lock so no append can slip its
        // waiter in between the drain above and this reset.
        self.sync_scheduled.store(false, Ordering::SeqCst);
    }
}

// Reusable byte buffers shared across writers for payload encoding.
struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    initial_size: usize,
}

impl BufferPool {
    fn new(initial_size: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            initial_size,
        }
    }

    // Returns an empty buffer, reusing a pooled allocation when available.
    fn get(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_size))
    }

    fn put(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        self.buffers.lock().push(buffer);
    }
}
