/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence number bookkeeping.
//!
//! Sequence counters live with the message store so a restarted engine
//! resumes where it left off; this module wraps the store with the
//! classification logic for inbound numbers.

use anvilfix_core::error::StoreError;
use anvilfix_store::MessageStore;
use std::sync::Arc;

/// Result of classifying an inbound sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Sequence number equals the expected value.
    InOrder,
    /// Sequence number is higher than expected: messages were missed.
    Gap {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number is lower than expected.
    TooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

/// Store-backed sequence counters for one session.
#[derive(Clone)]
pub struct SequenceNumbers {
    store: Arc<dyn MessageStore>,
}

impl std::fmt::Debug for SequenceNumbers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceNumbers")
            .field("next_sender", &self.next_sender())
            .field("next_target", &self.next_target())
            .finish()
    }
}

impl SequenceNumbers {
    /// Wraps the session's store.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Returns the next outbound sequence number.
    #[must_use]
    pub fn next_sender(&self) -> u64 {
        self.store.next_sender_seq_num()
    }

    /// Returns the next expected inbound sequence number.
    #[must_use]
    pub fn next_target(&self) -> u64 {
        self.store.next_target_seq_num()
    }

    /// Advances the outbound counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    pub async fn incr_sender(&self) -> Result<(), StoreError> {
        self.store.incr_next_sender_seq_num().await
    }

    /// Advances the inbound counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    pub async fn incr_target(&self) -> Result<(), StoreError> {
        self.store.incr_next_target_seq_num().await
    }

    /// Sets the inbound counter (SequenceReset handling).
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    pub async fn set_target(&self, seq: u64) -> Result<(), StoreError> {
        self.store.set_next_target_seq_num(seq).await
    }

    /// Sets the outbound counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    pub async fn set_sender(&self, seq: u64) -> Result<(), StoreError> {
        self.store.set_next_sender_seq_num(seq).await
    }

    /// Classifies an inbound sequence number against the expected value.
    #[must_use]
    pub fn classify(&self, received: u64) -> SequenceCheck {
        let expected = self.next_target();
        if received == expected {
            SequenceCheck::InOrder
        } else if received > expected {
            SequenceCheck::Gap { expected, received }
        } else {
            SequenceCheck::TooLow { expected, received }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_store::MemoryStore;

    fn seqs() -> SequenceNumbers {
        SequenceNumbers::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_counters_start_at_one() {
        let seq = seqs();
        assert_eq!(seq.next_sender(), 1);
        assert_eq!(seq.next_target(), 1);
    }

    #[tokio::test]
    async fn test_increment_persists_to_store() {
        let store = Arc::new(MemoryStore::new());
        let seq = SequenceNumbers::new(Arc::clone(&store) as Arc<dyn MessageStore>);

        seq.incr_sender().await.unwrap();
        seq.incr_target().await.unwrap();
        seq.incr_target().await.unwrap();

        assert_eq!(store.next_sender_seq_num(), 2);
        assert_eq!(store.next_target_seq_num(), 3);
    }

    #[tokio::test]
    async fn test_classify() {
        let seq = seqs();
        seq.set_target(5).await.unwrap();

        assert_eq!(seq.classify(5), SequenceCheck::InOrder);
        assert_eq!(
            seq.classify(8),
            SequenceCheck::Gap {
                expected: 5,
                received: 8
            }
        );
        assert_eq!(
            seq.classify(3),
            SequenceCheck::TooLow {
                expected: 5,
                received: 3
            }
        );
    }
}
