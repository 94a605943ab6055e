/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session identity.
//!
//! A FIX session is identified by the triple `(BeginString, SenderCompID,
//! TargetCompID)` plus an optional qualifier used when several sessions
//! share the same triple. The identity is immutable and globally unique
//! within an engine.

use crate::types::CompId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable FIX session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// BeginString (FIX version, e.g. "FIX.4.4" or "FIXT.1.1").
    begin_string: String,
    /// Our CompID (tag 49 on outbound messages).
    sender_comp_id: CompId,
    /// Counterparty CompID (tag 56 on outbound messages).
    target_comp_id: CompId,
    /// Optional qualifier distinguishing sessions with equal triples.
    qualifier: Option<String>,
}

impl SessionId {
    /// Creates a new session identifier.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version string
    /// * `sender_comp_id` - Our CompID
    /// * `target_comp_id` - Counterparty CompID
    #[must_use]
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id,
            target_comp_id,
            qualifier: None,
        }
    }

    /// Sets the session qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Returns the BeginString.
    #[inline]
    #[must_use]
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Returns our CompID.
    #[inline]
    #[must_use]
    pub fn sender_comp_id(&self) -> &CompId {
        &self.sender_comp_id
    }

    /// Returns the counterparty CompID.
    #[inline]
    #[must_use]
    pub fn target_comp_id(&self) -> &CompId {
        &self.target_comp_id
    }

    /// Returns the session qualifier, if any.
    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Returns true if this session runs over FIXT transport.
    #[must_use]
    pub fn is_fixt(&self) -> bool {
        self.begin_string.starts_with("FIXT")
    }

    /// Returns the identity with sender and target swapped.
    ///
    /// An acceptor resolves the session for an inbound Logon by reversing
    /// the CompIDs found on the wire.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
            qualifier: self.qualifier.clone(),
        }
    }

    /// Returns the file-stem form `BeginString-Sender-Target[-Qualifier]`
    /// used by persistent stores.
    #[must_use]
    pub fn file_stem(&self) -> String {
        match &self.qualifier {
            Some(q) => format!(
                "{}-{}-{}-{}",
                self.begin_string, self.sender_comp_id, self.target_comp_id, q
            ),
            None => format!(
                "{}-{}-{}",
                self.begin_string, self.sender_comp_id, self.target_comp_id
            ),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )?;
        if let Some(q) = &self.qualifier {
            write!(f, ":{}", q)?;
        }
        Ok(())
    }
}
