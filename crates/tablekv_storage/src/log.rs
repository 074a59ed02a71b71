//! Log-structured single-file driver.
//!
//! Every mutation is appended to one file as a checksummed frame:
//!
//! ```text
//! frame   = len:u32 LE | crc32(payload):u32 LE | payload
//! payload = count:u32 LE | op*
//! op      = kind:u8 | key_len:u32 LE | key | value_len:u32 LE | value
//! ```
//!
//! A frame holds a whole `WriteBatch`, so a batch is recovered entirely or
//! not at all. An in-memory ordered index maps each live key to the position
//! of its latest value in the file.

use crate::batch::{BatchOp, WriteBatch};
use crate::driver::{Driver, KvEntry, KvIter, RangeOptions, Snapshot};
use crate::error::{StorageError, StorageResult};
use crate::range::{is_empty_range, BatchedRangeIter, RangeSource, DEFAULT_BATCH_SIZE};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Frame header: payload length + CRC.
const FRAME_HEADER_SIZE: u64 = 8;

/// Op kind for a put.
const OP_PUT: u8 = 1;

/// Op kind for a delete.
const OP_DELETE: u8 = 2;

/// Number of ops per frame written by compaction.
const COMPACT_FRAME_OPS: usize = 1024;

/// Configuration for [`LogDriver`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Create missing parent directories on open.
    pub create_dirs: bool,
    /// Sync every write regardless of the caller's `sync` flag.
    pub sync_on_write: bool,
    /// Entries fetched per range iterator refill.
    pub batch_size: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            create_dirs: true,
            sync_on_write: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl LogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether parent directories are created.
    #[must_use]
    pub const fn create_dirs(mut self, value: bool) -> Self {
        self.create_dirs = value;
        self
    }

    /// Sets whether every write is synced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the range iterator batch size.
    #[must_use]
    pub const fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = value;
        self
    }
}

/// Space usage of a [`LogDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Current log file size in bytes.
    pub file_size: u64,
    /// Number of live keys.
    pub live_keys: usize,
    /// Bytes of live keys and values.
    pub live_bytes: u64,
}

impl LogStats {
    /// Bytes held by overwritten or deleted data and framing.
    #[must_use]
    pub fn dead_bytes(&self) -> u64 {
        self.file_size.saturating_sub(self.live_bytes)
    }
}

#[derive(Debug, Clone, Copy)]
struct ValuePos {
    offset: u64,
    len: u32,
}

type Index = BTreeMap<Vec<u8>, ValuePos>;

#[derive(Debug)]
struct LogFile {
    file: Mutex<File>,
}

impl LogFile {
    fn read_at(&self, pos: ValuePos) -> StorageResult<Vec<u8>> {
        let mut buffer = vec![0u8; pos.len as usize];
        if pos.len == 0 {
            return Ok(buffer);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos.offset))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

#[derive(Debug)]
struct LogState {
    file: Arc<LogFile>,
    index: Arc<Index>,
    size: u64,
}

/// A log-structured, single-file, append-only driver.
///
/// # Durability
///
/// - Writes go straight to the OS; `sync = true` (or
///   [`LogConfig::sync_on_write`]) calls `File::sync_data()` before returning
/// - On open the log is replayed; a torn or corrupt tail frame left by a
///   crash is truncated away
///
/// # Locking
///
/// An advisory lock on `<path>.lock` keeps a second process from opening the
/// same log. Within the process the driver is shared behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use tablekv_storage::{Driver, LogDriver};
/// use std::path::Path;
///
/// let driver = LogDriver::open(Path::new("data/store.log")).unwrap();
/// driver.put(b"note:1", b"{}", true).unwrap();
/// ```
#[derive(Debug)]
pub struct LogDriver {
    path: PathBuf,
    config: LogConfig,
    state: RwLock<LogState>,
    _lock_file: File,
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl LogDriver {
    /// Opens or creates a log at `path` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked by another
    /// process, or cannot be replayed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_config(path, LogConfig::default())
    }

    /// Opens or creates a log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked by another
    /// process, or cannot be replayed.
    pub fn open_with_config(path: &Path, config: LogConfig) -> StorageResult<Self> {
        if config.create_dirs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling_path(path, ".lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let (index, size) = replay(&file)?;
        let file_len = file.metadata()?.len();
        if file_len > size {
            tracing::warn!(
                path = %path.display(),
                dropped = file_len - size,
                "truncating torn tail of log"
            );
            file.set_len(size)?;
            file.sync_all()?;
        }

        tracing::debug!(path = %path.display(), keys = index.len(), size, "opened log");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: RwLock::new(LogState {
                file: Arc::new(LogFile {
                    file: Mutex::new(file),
                }),
                index: Arc::new(index),
                size,
            }),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns space usage figures.
    #[must_use]
    pub fn stats(&self) -> LogStats {
        let state = self.state.read();
        let live_bytes = state
            .index
            .iter()
            .map(|(k, pos)| k.len() as u64 + u64::from(pos.len))
            .sum();
        LogStats {
            file_size: state.size,
            live_keys: state.index.len(),
            live_bytes,
        }
    }

    /// Rewrites the log so it only holds live entries.
    ///
    /// The new log is written to `<path>.compact`, synced, then renamed over
    /// the old one. Open snapshots keep reading the previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails; the current log stays in use.
    pub fn compact(&self) -> StorageResult<LogStats> {
        let mut state = self.state.write();
        let before = state.size;
        let tmp_path = sibling_path(&self.path, ".compact");

        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut index = Index::new();
        let mut size = 0u64;
        let entries: Vec<(&Vec<u8>, &ValuePos)> = state.index.iter().collect();
        for chunk in entries.chunks(COMPACT_FRAME_OPS) {
            let mut ops = Vec::with_capacity(chunk.len());
            for (key, pos) in chunk {
                ops.push(BatchOp::Put {
                    key: (*key).clone(),
                    value: state.file.read_at(**pos)?,
                });
            }
            let (frame, positions) = encode_frame(&ops, size)?;
            tmp.write_all(&frame)?;
            for (op, pos) in ops.iter().zip(positions) {
                if let Some(pos) = pos {
                    index.insert(op.key().to_vec(), pos);
                }
            }
            size += frame.len() as u64;
        }
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        state.file = Arc::new(LogFile {
            file: Mutex::new(tmp),
        });
        state.index = Arc::new(index);
        state.size = size;

        tracing::info!(
            path = %self.path.display(),
            before,
            after = size,
            "compacted log"
        );
        drop(state);
        Ok(self.stats())
    }

    fn append(&self, ops: Vec<BatchOp>, sync: bool) -> StorageResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write();
        let (frame, positions) = encode_frame(&ops, state.size)?;

        {
            let mut file = state.file.file.lock();
            file.seek(SeekFrom::Start(state.size))?;
            file.write_all(&frame)?;
            if sync || self.config.sync_on_write {
                file.sync_data()?;
            }
        }

        state.size += frame.len() as u64;
        let index = Arc::make_mut(&mut state.index);
        for (op, pos) in ops.into_iter().zip(positions) {
            match (op, pos) {
                (BatchOp::Put { key, .. }, Some(pos)) => {
                    index.insert(key, pos);
                }
                (op, _) => {
                    index.remove(op.key());
                }
            }
        }
        Ok(())
    }

    fn locate(&self, key: &[u8]) -> Option<(Arc<LogFile>, ValuePos)> {
        let state = self.state.read();
        state
            .index
            .get(key)
            .map(|pos| (Arc::clone(&state.file), *pos))
    }
}

/// Encodes `ops` as one frame starting at file offset `base`.
///
/// Returns the frame bytes and, per op, the position of its value.
fn encode_frame(ops: &[BatchOp], base: u64) -> StorageResult<(Vec<u8>, Vec<Option<ValuePos>>)> {
    let too_large = || StorageError::corrupted("log frame exceeds 4 GiB");

    let count = u32::try_from(ops.len()).map_err(|_| too_large())?;
    let mut payload = Vec::new();
    payload.extend_from_slice(&count.to_le_bytes());

    let mut positions = Vec::with_capacity(ops.len());
    for op in ops {
        let (kind, key, value): (u8, &[u8], &[u8]) = match op {
            BatchOp::Put { key, value } => (OP_PUT, key, value),
            BatchOp::Delete { key } => (OP_DELETE, key, &[]),
        };
        let key_len = u32::try_from(key.len()).map_err(|_| too_large())?;
        let value_len = u32::try_from(value.len()).map_err(|_| too_large())?;

        payload.push(kind);
        payload.extend_from_slice(&key_len.to_le_bytes());
        payload.extend_from_slice(key);
        payload.extend_from_slice(&value_len.to_le_bytes());

        let offset = base + FRAME_HEADER_SIZE + payload.len() as u64;
        positions.push((kind == OP_PUT).then_some(ValuePos {
            offset,
            len: value_len,
        }));
        payload.extend_from_slice(value);
    }

    let len = u32::try_from(payload.len()).map_err(|_| too_large())?;
    let mut frame = Vec::with_capacity(payload.len() + FRAME_HEADER_SIZE as usize);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok((frame, positions))
}

/// One decoded op with the file offset of its value.
struct DecodedOp {
    kind: u8,
    key: Vec<u8>,
    value: ValuePos,
}

fn decode_payload(payload: &[u8], payload_offset: u64) -> Option<Vec<DecodedOp>> {
    fn read_u32(buf: &[u8], at: &mut usize) -> Option<u32> {
        let bytes = buf.get(*at..*at + 4)?;
        *at += 4;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    let mut at = 0usize;
    let count = read_u32(payload, &mut at)?;
    let mut ops = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        let kind = *payload.get(at)?;
        at += 1;
        if kind != OP_PUT && kind != OP_DELETE {
            return None;
        }
        let key_len = read_u32(payload, &mut at)? as usize;
        let key = payload.get(at..at + key_len)?.to_vec();
        at += key_len;
        let value_len = read_u32(payload, &mut at)?;
        let value = ValuePos {
            offset: payload_offset + at as u64,
            len: value_len,
        };
        payload.get(at..at + value_len as usize)?;
        at += value_len as usize;
        ops.push(DecodedOp { kind, key, value });
    }
    (at == payload.len()).then_some(ops)
}

/// Replays the log, returning the index and the length of the valid prefix.
fn replay(file: &File) -> StorageResult<(Index, u64)> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;

    let mut index = Index::new();
    let mut offset = 0u64;
    loop {
        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let mut payload = vec![0u8; len as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if compute_crc32(&payload) != crc {
            tracing::warn!(offset, "log frame checksum mismatch, stopping replay");
            break;
        }
        let Some(ops) = decode_payload(&payload, offset + FRAME_HEADER_SIZE) else {
            tracing::warn!(offset, "malformed log frame, stopping replay");
            break;
        };
        for op in ops {
            if op.kind == OP_PUT {
                index.insert(op.key, op.value);
            } else {
                index.remove(&op.key);
            }
        }
        offset += FRAME_HEADER_SIZE + u64::from(len);
    }
    Ok((index, offset))
}

/// CRC32 over `data` (IEEE polynomial).
fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

fn fetch_from(
    file: &LogFile,
    index: &Index,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    reverse: bool,
    include_value: bool,
    limit: usize,
) -> StorageResult<Vec<KvEntry>> {
    if is_empty_range(lower, upper) {
        return Ok(Vec::new());
    }
    let range = index.range::<[u8], _>((lower, upper));
    let picked: Vec<(&Vec<u8>, &ValuePos)> = if reverse {
        range.rev().take(limit).collect()
    } else {
        range.take(limit).collect()
    };
    picked
        .into_iter()
        .map(|(key, pos)| {
            let value = if include_value {
                Some(file.read_at(*pos)?)
            } else {
                None
            };
            Ok(KvEntry::new(key.clone(), value))
        })
        .collect()
}

impl RangeSource for LogDriver {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        let (file, index) = {
            let state = self.state.read();
            (Arc::clone(&state.file), Arc::clone(&state.index))
        };
        fetch_from(&file, &index, lower, upper, reverse, include_value, limit)
    }
}

impl Driver for LogDriver {
    fn name(&self) -> &'static str {
        "log"
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.locate(key) {
            Some((file, pos)) => Ok(Some(file.read_at(pos)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> StorageResult<()> {
        self.append(
            vec![BatchOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
            sync,
        )
    }

    fn delete(&self, key: &[u8], sync: bool) -> StorageResult<()> {
        if self.locate(key).is_none() {
            return Ok(());
        }
        self.append(vec![BatchOp::Delete { key: key.to_vec() }], sync)
    }

    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>> {
        options.validate()?;
        Ok(Box::new(BatchedRangeIter::new(
            self,
            options,
            self.config.batch_size,
        )))
    }

    fn write(&self, batch: WriteBatch, sync: bool) -> StorageResult<()> {
        self.append(batch.into_ops(), sync)
    }

    fn create_snapshot(&self) -> StorageResult<Box<dyn Snapshot + '_>> {
        let state = self.state.read();
        Ok(Box::new(LogSnapshot {
            file: Arc::clone(&state.file),
            index: Arc::clone(&state.index),
            batch_size: self.config.batch_size,
        }))
    }
}

/// Point-in-time view of a [`LogDriver`].
///
/// Holds the index as of creation and the file it points into, so it stays
/// readable across later writes and compactions.
#[derive(Debug)]
pub struct LogSnapshot {
    file: Arc<LogFile>,
    index: Arc<Index>,
    batch_size: usize,
}

impl RangeSource for LogSnapshot {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        fetch_from(
            &self.file,
            &self.index,
            lower,
            upper,
            reverse,
            include_value,
            limit,
        )
    }
}

impl Snapshot for LogSnapshot {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(pos) => Ok(Some(self.file.read_at(*pos)?)),
            None => Ok(None),
        }
    }

    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>> {
        options.validate()?;
        Ok(Box::new(BatchedRangeIter::new(
            self,
            options,
            self.batch_size,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");

        let driver = LogDriver::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(driver.stats().file_size, 0);
        assert_eq!(driver.get(b"a").unwrap(), None);
    }

    #[test]
    fn log_put_and_get() {
        let dir = tempdir().unwrap();
        let driver = LogDriver::open(&dir.path().join("store.log")).unwrap();

        driver.put(b"a", b"hello", false).unwrap();
        driver.put(b"b", b"", false).unwrap();
        assert_eq!(driver.get(b"a").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(driver.get(b"b").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn log_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");

        {
            let driver = LogDriver::open(&path).unwrap();
            driver.put(b"a", b"1", false).unwrap();
            driver.put(b"b", b"2", false).unwrap();
            driver.put(b"a", b"3", false).unwrap();
            driver.delete(b"b", true).unwrap();
        }

        {
            let driver = LogDriver::open(&path).unwrap();
            assert_eq!(driver.get(b"a").unwrap(), Some(b"3".to_vec()));
            assert_eq!(driver.get(b"b").unwrap(), None);
            assert_eq!(driver.stats().live_keys, 1);
        }
    }

    #[test]
    fn log_torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");

        let good_size = {
            let driver = LogDriver::open(&path).unwrap();
            driver.put(b"a", b"1", true).unwrap();
            driver.stats().file_size
        };

        // half-written frame
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[42, 0, 0, 0, 1, 2]).unwrap();
        }

        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(driver.stats().file_size, good_size);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_size);

        driver.put(b"b", b"2", false).unwrap();
        drop(driver);
        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn log_corrupt_frame_stops_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");

        {
            let driver = LogDriver::open(&path).unwrap();
            driver.put(b"a", b"1", true).unwrap();
            driver.put(b"b", b"2", true).unwrap();
        }

        // flip the last byte (value of "b")
        {
            let mut bytes = fs::read(&path).unwrap();
            let last = bytes.len() - 1;
            bytes[last] ^= 0xFF;
            fs::write(&path, bytes).unwrap();
        }

        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(driver.get(b"b").unwrap(), None);
    }

    #[test]
    fn log_batch_is_one_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        let driver = LogDriver::open(&path).unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"a".to_vec());
        driver.write(batch, true).unwrap();

        assert_eq!(driver.get(b"a").unwrap(), None);
        assert_eq!(driver.get(b"b").unwrap(), Some(b"2".to_vec()));

        // dropping any byte of the single frame loses the whole batch
        drop(driver);
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 1).unwrap();
        drop(file);

        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"b").unwrap(), None);
        assert_eq!(driver.stats().file_size, 0);
    }

    #[test]
    fn log_range_forward_and_reverse() {
        let dir = tempdir().unwrap();
        let driver = LogDriver::open_with_config(
            &dir.path().join("store.log"),
            LogConfig::new().batch_size(2),
        )
        .unwrap();
        for key in [&b"t:3"[..], b"t:1", b"t:2", b"u:1"] {
            driver.put(key, key, false).unwrap();
        }

        let forward: Vec<Vec<u8>> = driver
            .range_iter(RangeOptions::new().key_from(b"t:".to_vec()).key_to(b"t:\xff".to_vec()))
            .unwrap()
            .map(|e| e.unwrap().key)
            .collect();
        assert_eq!(forward, vec![b"t:1".to_vec(), b"t:2".to_vec(), b"t:3".to_vec()]);

        let reverse: Vec<KvEntry> = driver
            .range_iter(RangeOptions::new().reverse(true))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(reverse[0].key, b"u:1".to_vec());
        assert_eq!(reverse[0].value, Some(b"u:1".to_vec()));
        assert_eq!(reverse.len(), 4);
    }

    #[test]
    fn log_compaction_drops_dead_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        let driver = LogDriver::open(&path).unwrap();

        for i in 0..50u32 {
            driver.put(b"hot", &i.to_le_bytes(), false).unwrap();
        }
        driver.put(b"cold", b"x", false).unwrap();
        driver.delete(b"cold", false).unwrap();

        let before = driver.stats();
        let snapshot = driver.create_snapshot().unwrap();
        let after = driver.compact().unwrap();

        assert!(after.file_size < before.file_size);
        assert_eq!(after.live_keys, 1);
        assert_eq!(driver.get(b"hot").unwrap(), Some(49u32.to_le_bytes().to_vec()));
        assert_eq!(snapshot.get(b"hot").unwrap(), Some(49u32.to_le_bytes().to_vec()));

        driver.put(b"new", b"1", true).unwrap();
        drop(snapshot);
        drop(driver);

        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"hot").unwrap(), Some(49u32.to_le_bytes().to_vec()));
        assert_eq!(driver.get(b"new").unwrap(), Some(b"1".to_vec()));
        assert_eq!(driver.get(b"cold").unwrap(), None);
    }

    #[test]
    fn log_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");

        let _first = LogDriver::open(&path).unwrap();
        let second = LogDriver::open(&path);
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[test]
    fn log_snapshot_ignores_later_writes() {
        let dir = tempdir().unwrap();
        let driver = LogDriver::open(&dir.path().join("store.log")).unwrap();
        driver.put(b"a", b"1", false).unwrap();

        let snapshot = driver.create_snapshot().unwrap();
        driver.put(b"a", b"2", false).unwrap();
        driver.delete(b"a", false).unwrap();

        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(driver.get(b"a").unwrap(), None);
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }
}
