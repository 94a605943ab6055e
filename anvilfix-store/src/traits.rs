/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store contracts.
//!
//! A session durably persists every outbound message (subject to its
//! persistence policy) before the bytes reach the responder, and replays
//! stored ranges to satisfy resend requests. Sequence numbers live with the
//! store so that a restart resumes where the session left off.

use anvilfix_core::error::StoreError;
use anvilfix_core::session_id::SessionId;
use async_trait::async_trait;
use bytes::Bytes;

/// Abstract interface for FIX message storage.
///
/// Implementations persist outgoing messages keyed by sequence number and
/// track the per-direction sequence counters. All mutations are flushed
/// before returning.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Stores an outgoing message under its sequence number.
    ///
    /// # Errors
    /// Returns `StoreError::DuplicateSeqNum` if the sequence number is
    /// already occupied, or an I/O error from the backend.
    async fn set(&self, seq_num: u64, message: &[u8]) -> Result<(), StoreError>;

    /// Retrieves stored messages with sequence numbers in `[begin, end]`.
    ///
    /// `end == 0` means "through the highest stored number". Sequence
    /// numbers with nothing stored are simply absent from the result; the
    /// caller fills such gaps with SequenceReset-GapFill.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be read.
    async fn get(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError>;

    /// Returns the next sender sequence number.
    fn next_sender_seq_num(&self) -> u64;

    /// Returns the next expected target sequence number.
    fn next_target_seq_num(&self) -> u64;

    /// Sets the next sender sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be written.
    async fn set_next_sender_seq_num(&self, seq: u64) -> Result<(), StoreError>;

    /// Sets the next expected target sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be written.
    async fn set_next_target_seq_num(&self, seq: u64) -> Result<(), StoreError>;

    /// Increments the next sender sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be written.
    async fn incr_next_sender_seq_num(&self) -> Result<(), StoreError> {
        self.set_next_sender_seq_num(self.next_sender_seq_num() + 1)
            .await
    }

    /// Increments the next expected target sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be written.
    async fn incr_next_target_seq_num(&self) -> Result<(), StoreError> {
        self.set_next_target_seq_num(self.next_target_seq_num() + 1)
            .await
    }

    /// Returns the session creation time.
    ///
    /// The first call after store creation fixes and persists the value;
    /// later calls return the persisted time.
    fn creation_time(&self) -> anvilfix_core::types::Timestamp;

    /// Truncates all persisted state: both sequence numbers return to 1,
    /// stored messages are discarded, and the creation time becomes now.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be truncated.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Reloads volatile state from the backend (used after external
    /// recovery).
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be read.
    async fn refresh(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Factory creating one store per session.
pub trait MessageStoreFactory: Send + Sync {
    /// Creates the store for the given session.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be opened.
    fn create(&self, session_id: &SessionId) -> Result<std::sync::Arc<dyn MessageStore>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::types::Timestamp;
    use parking_lot::Mutex;

    struct SeqOnlyStore {
        sender: Mutex<u64>,
        target: Mutex<u64>,
    }

    #[async_trait]
    impl MessageStore for SeqOnlyStore {
        async fn set(&self, _seq_num: u64, _message: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get(&self, _begin: u64, _end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
            Ok(vec![])
        }

        fn next_sender_seq_num(&self) -> u64 {
            *self.sender.lock()
        }

        fn next_target_seq_num(&self) -> u64 {
            *self.target.lock()
        }

        async fn set_next_sender_seq_num(&self, seq: u64) -> Result<(), StoreError> {
            *self.sender.lock() = seq;
            Ok(())
        }

        async fn set_next_target_seq_num(&self, seq: u64) -> Result<(), StoreError> {
            *self.target.lock() = seq;
            Ok(())
        }

        fn creation_time(&self) -> Timestamp {
            Timestamp::from_millis(0)
        }

        async fn reset(&self) -> Result<(), StoreError> {
            *self.sender.lock() = 1;
            *self.target.lock() = 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_increment_impls() {
        let store = SeqOnlyStore {
            sender: Mutex::new(1),
            target: Mutex::new(1),
        };

        store.incr_next_sender_seq_num().await.unwrap();
        store.incr_next_sender_seq_num().await.unwrap();
        store.incr_next_target_seq_num().await.unwrap();

        assert_eq!(store.next_sender_seq_num(), 3);
        assert_eq!(store.next_target_seq_num(), 2);

        store.reset().await.unwrap();
        assert_eq!(store.next_sender_seq_num(), 1);
    }
}
