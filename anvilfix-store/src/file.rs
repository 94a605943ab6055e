/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! File-based message store.
//!
//! Four files per session, named from the session's file stem
//! `BeginString-SenderCompID-TargetCompID[-Qualifier]`:
//!
//! - `.body` - raw stream of outgoing messages
//! - `.header` - CSV index lines `seqnum,offset,len`
//! - `.seqnums` - `SENDER : TARGET`, both zero-padded to ten digits
//! - `.session` - session creation time, `YYYYMMDD-HH:MM:SS` UTC
//!
//! Every mutation is flushed before the call returns. On open, the index
//! and counters are rebuilt from disk so a restarted engine resumes with
//! the sequence numbers it last persisted.

use crate::traits::{MessageStore, MessageStoreFactory};
use anvilfix_core::error::StoreError;
use anvilfix_core::session_id::SessionId;
use anvilfix_core::types::Timestamp;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Durable file-backed message store.
#[derive(Debug)]
pub struct FileStore {
    /// Next sender sequence number (mirrors the `.seqnums` file).
    next_sender_seq: AtomicU64,
    /// Next expected target sequence number (mirrors the `.seqnums` file).
    next_target_seq: AtomicU64,
    /// Creation time, milliseconds since epoch (mirrors the `.session` file).
    creation_time_millis: AtomicI64,
    /// File handles and the seqnum -> (offset, len) index.
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    body_path: PathBuf,
    header_path: PathBuf,
    seqnums_path: PathBuf,
    session_path: PathBuf,
    body: File,
    header: File,
    offsets: BTreeMap<u64, (u64, usize)>,
}

impl FileStore {
    /// Opens (or creates) the store for a session under the given directory.
    ///
    /// # Errors
    /// Returns `StoreError` if the directory cannot be created, a file
    /// cannot be opened, or the persisted state is unreadable.
    pub fn open(path: &Path, session_id: &SessionId) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let stem = path.join(session_id.file_stem());

        let body_path = stem.with_extension("body");
        let header_path = stem.with_extension("header");
        let seqnums_path = stem.with_extension("seqnums");
        let session_path = stem.with_extension("session");

        let body = open_rw(&body_path)?;
        let header = open_rw(&header_path)?;

        let store = Self {
            next_sender_seq: AtomicU64::new(1),
            next_target_seq: AtomicU64::new(1),
            creation_time_millis: AtomicI64::new(0),
            inner: Mutex::new(Inner {
                body_path,
                header_path,
                seqnums_path,
                session_path,
                body,
                header,
                offsets: BTreeMap::new(),
            }),
        };
        store.populate_cache()?;
        Ok(store)
    }

    /// Rebuilds the in-memory index and counters from disk.
    fn populate_cache(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        inner.offsets.clear();
        let mut index = String::new();
        let mut header = open_rw(&inner.header_path)?;
        header.seek(SeekFrom::Start(0))?;
        header.read_to_string(&mut index)?;
        for line in index.lines() {
            let mut parts = line.splitn(3, ',');
            let (Some(seq), Some(offset), Some(len)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(StoreError::Corrupted {
                    reason: format!("bad header index line: {line}"),
                });
            };
            let parse = |s: &str| {
                s.trim().parse::<u64>().map_err(|_| StoreError::Corrupted {
                    reason: format!("bad header index line: {line}"),
                })
            };
            inner
                .offsets
                .insert(parse(seq)?, (parse(offset)?, parse(len)? as usize));
        }

        let seqnums_text = std::fs::read_to_string(&inner.seqnums_path).unwrap_or_default();
        if seqnums_text.trim().is_empty() {
            drop(inner);
            self.write_seqnums()?;
            inner = self.inner.lock();
        } else {
            let (sender, target) = parse_seqnums(&seqnums_text)?;
            self.next_sender_seq.store(sender, Ordering::SeqCst);
            self.next_target_seq.store(target, Ordering::SeqCst);
        }

        let session_text = std::fs::read_to_string(&inner.session_path).unwrap_or_default();
        if session_text.trim().is_empty() {
            let now = Timestamp::now();
            self.creation_time_millis
                .store(now.as_millis(), Ordering::SeqCst);
            write_all(&inner.session_path, now.format_seconds().as_bytes())?;
        } else {
            let ts = parse_session_time(session_text.trim())?;
            self.creation_time_millis
                .store(ts.as_millis(), Ordering::SeqCst);
        }

        Ok(())
    }

    /// Rewrites the `.seqnums` file from the counters.
    fn write_seqnums(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        let text = format!(
            "{:010} : {:010}",
            self.next_sender_seq.load(Ordering::SeqCst),
            self.next_target_seq.load(Ordering::SeqCst)
        );
        write_all(&inner.seqnums_path, text.as_bytes())
    }
}

fn open_rw(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(StoreError::from)
}

fn write_all(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_data()?;
    Ok(())
}

fn parse_seqnums(text: &str) -> Result<(u64, u64), StoreError> {
    let corrupted = || StoreError::Corrupted {
        reason: format!("bad seqnums content: {text:?}"),
    };
    let mut parts = text.split(':');
    let sender = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(corrupted)?;
    let target = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(corrupted)?;
    Ok((sender, target))
}

fn parse_session_time(text: &str) -> Result<Timestamp, StoreError> {
    NaiveDateTime::parse_from_str(text, "%Y%m%d-%H:%M:%S")
        .map(|dt| Timestamp::from_millis(dt.and_utc().timestamp_millis()))
        .map_err(|_| StoreError::Corrupted {
            reason: format!("bad session time: {text}"),
        })
}

#[async_trait]
impl MessageStore for FileStore {
    async fn set(&self, seq_num: u64, message: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.offsets.contains_key(&seq_num) {
            return Err(StoreError::DuplicateSeqNum { seq_num });
        }

        let offset = inner.body.seek(SeekFrom::End(0))?;
        inner.body.write_all(message)?;
        inner.body.sync_data()?;

        inner.header.seek(SeekFrom::End(0))?;
        let line = format!("{},{},{}\n", seq_num, offset, message.len());
        inner.header.write_all(line.as_bytes())?;
        inner.header.sync_data()?;

        inner.offsets.insert(seq_num, (offset, message.len()));
        Ok(())
    }

    async fn get(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let mut inner = self.inner.lock();
        let end = if end == 0 { u64::MAX } else { end };

        let entries: Vec<(u64, u64, usize)> = inner
            .offsets
            .range(begin..=end)
            .map(|(seq, (offset, len))| (*seq, *offset, *len))
            .collect();

        let mut result = Vec::with_capacity(entries.len());
        for (seq, offset, len) in entries {
            let mut buf = vec![0u8; len];
            inner.body.seek(SeekFrom::Start(offset))?;
            inner.body.read_exact(&mut buf)?;
            result.push((seq, Bytes::from(buf)));
        }
        Ok(result)
    }

    fn next_sender_seq_num(&self) -> u64 {
        self.next_sender_seq.load(Ordering::SeqCst)
    }

    fn next_target_seq_num(&self) -> u64 {
        self.next_target_seq.load(Ordering::SeqCst)
    }

    async fn set_next_sender_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_sender_seq.store(seq, Ordering::SeqCst);
        self.write_seqnums()
    }

    async fn set_next_target_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_target_seq.store(seq, Ordering::SeqCst);
        self.write_seqnums()
    }

    fn creation_time(&self) -> Timestamp {
        Timestamp::from_millis(self.creation_time_millis.load(Ordering::SeqCst))
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.offsets.clear();
        inner.body.set_len(0)?;
        inner.header.set_len(0)?;
        inner.body.sync_data()?;
        inner.header.sync_data()?;

        self.next_sender_seq.store(1, Ordering::SeqCst);
        self.next_target_seq.store(1, Ordering::SeqCst);
        let text = format!("{:010} : {:010}", 1, 1);
        write_all(&inner.seqnums_path, text.as_bytes())?;

        let now = Timestamp::now();
        self.creation_time_millis
            .store(now.as_millis(), Ordering::SeqCst);
        write_all(&inner.session_path, now.format_seconds().as_bytes())?;

        // Reopen so subsequent appends start at offset zero.
        let body_path = inner.body_path.clone();
        let header_path = inner.header_path.clone();
        inner.body = open_rw(&body_path)?;
        inner.header = open_rw(&header_path)?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        self.populate_cache()
    }
}

/// Factory producing a [`FileStore`] per session under a base directory.
#[derive(Debug, Clone)]
pub struct FileStoreFactory {
    path: PathBuf,
}

impl FileStoreFactory {
    /// Creates a factory rooted at the given directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MessageStoreFactory for FileStoreFactory {
    fn create(&self, session_id: &SessionId) -> Result<Arc<dyn MessageStore>, StoreError> {
        Ok(Arc::new(FileStore::open(&self.path, session_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::types::CompId;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("anvilfix-filestore").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn session_id() -> SessionId {
        SessionId::new(
            "FIX.4.4",
            CompId::new("SERVER").unwrap(),
            CompId::new("CLIENT").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_file_store_layout() {
        let dir = temp_dir("layout");
        let _store = FileStore::open(&dir, &session_id()).unwrap();

        for ext in ["body", "header", "seqnums", "session"] {
            let path = dir.join(format!("FIX.4.4-SERVER-CLIENT.{ext}"));
            assert!(path.exists(), "missing {path:?}");
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let dir = temp_dir("roundtrip");
        let store = FileStore::open(&dir, &session_id()).unwrap();

        store.set(1, b"8=FIX.4.4|msg1").await.unwrap();
        store.set(2, b"8=FIX.4.4|msg2").await.unwrap();
        store.set(4, b"8=FIX.4.4|msg4").await.unwrap();

        let range = store.get(1, 4).await.unwrap();
        let seqs: Vec<u64> = range.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![1, 2, 4]);
        assert_eq!(&range[1].1[..], b"8=FIX.4.4|msg2");
    }

    #[tokio::test]
    async fn test_set_rejects_duplicate() {
        let dir = temp_dir("dup");
        let store = FileStore::open(&dir, &session_id()).unwrap();

        store.set(1, b"one").await.unwrap();
        assert!(matches!(
            store.set(1, b"again").await,
            Err(StoreError::DuplicateSeqNum { seq_num: 1 })
        ));
    }

    #[tokio::test]
    async fn test_seqnums_survive_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = FileStore::open(&dir, &session_id()).unwrap();
            store.set(1, b"msg1").await.unwrap();
            store.set_next_sender_seq_num(17).await.unwrap();
            store.set_next_target_seq_num(9).await.unwrap();
        }

        let store = FileStore::open(&dir, &session_id()).unwrap();
        assert_eq!(store.next_sender_seq_num(), 17);
        assert_eq!(store.next_target_seq_num(), 9);
        assert_eq!(store.get(1, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seqnums_file_format() {
        let dir = temp_dir("format");
        let store = FileStore::open(&dir, &session_id()).unwrap();
        store.set_next_sender_seq_num(5).await.unwrap();

        let text =
            std::fs::read_to_string(dir.join("FIX.4.4-SERVER-CLIENT.seqnums")).unwrap();
        assert_eq!(text, "0000000005 : 0000000001");
    }

    #[tokio::test]
    async fn test_reset_truncates() {
        let dir = temp_dir("reset");
        let store = FileStore::open(&dir, &session_id()).unwrap();

        store.set(1, b"msg1").await.unwrap();
        store.set_next_sender_seq_num(10).await.unwrap();
        store.reset().await.unwrap();

        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(store.next_target_seq_num(), 1);
        assert!(store.get(1, 0).await.unwrap().is_empty());
        assert_eq!(
            std::fs::metadata(dir.join("FIX.4.4-SERVER-CLIENT.body"))
                .unwrap()
                .len(),
            0
        );

        // The store accepts new messages after reset.
        store.set(1, b"fresh").await.unwrap();
        assert_eq!(store.get(1, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_creation_time_persisted() {
        let dir = temp_dir("ctime");
        let first = {
            let store = FileStore::open(&dir, &session_id()).unwrap();
            store.creation_time()
        };

        let store = FileStore::open(&dir, &session_id()).unwrap();
        // Seconds precision: the persisted stamp drops milliseconds.
        assert_eq!(
            store.creation_time().as_millis() / 1000,
            first.as_millis() / 1000
        );
    }
}
