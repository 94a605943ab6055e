/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store.
//!
//! Suitable for tests and sessions configured without durable persistence.
//! All state is lost when the process exits.

use crate::traits::{MessageStore, MessageStoreFactory};
use anvilfix_core::error::StoreError;
use anvilfix_core::session_id::SessionId;
use anvilfix_core::types::Timestamp;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// In-memory message store.
///
/// Messages live in a `BTreeMap` for efficient range queries.
#[derive(Debug)]
pub struct MemoryStore {
    /// Stored messages indexed by sequence number.
    messages: RwLock<BTreeMap<u64, Bytes>>,
    /// Next sender sequence number.
    next_sender_seq: AtomicU64,
    /// Next expected target sequence number.
    next_target_seq: AtomicU64,
    /// Store creation time, milliseconds since epoch.
    creation_time_millis: AtomicI64,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(BTreeMap::new()),
            next_sender_seq: AtomicU64::new(1),
            next_target_seq: AtomicU64::new(1),
            creation_time_millis: AtomicI64::new(Timestamp::now().as_millis()),
        }
    }

    /// Returns the number of stored messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    /// Checks if a message with the given sequence number exists.
    #[must_use]
    pub fn contains(&self, seq_num: u64) -> bool {
        self.messages.read().contains_key(&seq_num)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn set(&self, seq_num: u64, message: &[u8]) -> Result<(), StoreError> {
        let mut messages = self.messages.write();
        if messages.contains_key(&seq_num) {
            return Err(StoreError::DuplicateSeqNum { seq_num });
        }
        messages.insert(seq_num, Bytes::copy_from_slice(message));
        Ok(())
    }

    async fn get(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let messages = self.messages.read();
        let end = if end == 0 { u64::MAX } else { end };

        Ok(messages
            .range(begin..=end)
            .map(|(seq, bytes)| (*seq, bytes.clone()))
            .collect())
    }

    fn next_sender_seq_num(&self) -> u64 {
        self.next_sender_seq.load(Ordering::SeqCst)
    }

    fn next_target_seq_num(&self) -> u64 {
        self.next_target_seq.load(Ordering::SeqCst)
    }

    async fn set_next_sender_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_sender_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    async fn set_next_target_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_target_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    fn creation_time(&self) -> Timestamp {
        Timestamp::from_millis(self.creation_time_millis.load(Ordering::SeqCst))
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.messages.write().clear();
        self.next_sender_seq.store(1, Ordering::SeqCst);
        self.next_target_seq.store(1, Ordering::SeqCst);
        self.creation_time_millis
            .store(Timestamp::now().as_millis(), Ordering::SeqCst);
        Ok(())
    }
}

/// Factory producing a fresh [`MemoryStore`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStoreFactory;

impl MemoryStoreFactory {
    /// Creates a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageStoreFactory for MemoryStoreFactory {
    fn create(&self, _session_id: &SessionId) -> Result<Arc<dyn MessageStore>, StoreError> {
        Ok(Arc::new(MemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(store.next_target_seq_num(), 1);
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_set_rejects_duplicate() {
        let store = MemoryStore::new();
        store.set(1, b"first").await.unwrap();

        let result = store.set(1, b"second").await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateSeqNum { seq_num: 1 })
        ));
    }

    #[tokio::test]
    async fn test_get_range_with_gaps() {
        let store = MemoryStore::new();
        store.set(1, b"msg1").await.unwrap();
        store.set(2, b"msg2").await.unwrap();
        store.set(5, b"msg5").await.unwrap();

        let range = store.get(1, 5).await.unwrap();
        let seqs: Vec<u64> = range.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![1, 2, 5]);
    }

    #[tokio::test]
    async fn test_get_open_ended_range() {
        let store = MemoryStore::new();
        store.set(3, b"msg3").await.unwrap();
        store.set(4, b"msg4").await.unwrap();

        let range = store.get(3, 0).await.unwrap();
        assert_eq!(range.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = MemoryStore::new();
        store.set(1, b"msg1").await.unwrap();
        store.set_next_sender_seq_num(10).await.unwrap();
        store.set_next_target_seq_num(20).await.unwrap();

        store.reset().await.unwrap();

        assert_eq!(store.message_count(), 0);
        assert_eq!(store.next_sender_seq_num(), 1);
        assert_eq!(store.next_target_seq_num(), 1);
    }

    #[tokio::test]
    async fn test_factory_creates_independent_stores() {
        let factory = MemoryStoreFactory::new();
        let id = SessionId::new(
            "FIX.4.4",
            anvilfix_core::CompId::new("A").unwrap(),
            anvilfix_core::CompId::new("B").unwrap(),
        );

        let a = factory.create(&id).unwrap();
        let b = factory.create(&id).unwrap();
        a.set_next_sender_seq_num(5).await.unwrap();
        assert_eq!(b.next_sender_seq_num(), 1);
    }
}
