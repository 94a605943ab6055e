/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX
//!
//! A FIX session engine for Rust: everything between raw bytes on a TCP
//! socket and a validated application message.
//!
//! AnvilFIX implements the FIX session layer for versions 4.0 through 4.4
//! and FIXT 1.1 carrying FIX 5.0+: the logon/logout handshake, sequence
//! number tracking with gap recovery, heartbeats and test requests,
//! dictionary-driven structural validation, durable message stores, and
//! both connection roles.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use anvilfix::prelude::*;
//! use std::sync::Arc;
//!
//! let settings = SessionSettings::load("sessions.cfg".as_ref())?;
//! let engine = Arc::new(Engine::new());
//! let mut acceptor = SocketAcceptor::new(
//!     Arc::clone(&engine),
//!     Arc::new(MyApplication),
//!     Arc::new(FileStoreFactory::new("store")),
//!     &settings,
//! ).await?;
//! acceptor.start()?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, errors, and the session identity
//! - [`dictionary`]: Data dictionary schema, loading, and validation
//! - [`tagvalue`]: Zero-copy tag=value encoding and decoding
//! - [`session`]: The session-layer state machine
//! - [`store`]: Message persistence backends
//! - [`transport`]: TCP framing and socket plumbing
//! - [`engine`]: Settings, session factory, and the connection drivers

pub mod core {
    //! Fundamental types, errors, and the session identity.
    pub use anvilfix_core::*;
}

pub mod dictionary {
    //! Data dictionary schema, loading, and validation.
    pub use anvilfix_dictionary::*;
}

pub mod tagvalue {
    //! Zero-copy tag=value encoding and decoding.
    pub use anvilfix_tagvalue::*;
}

pub mod session {
    //! The session-layer state machine.
    pub use anvilfix_session::*;
}

pub mod store {
    //! Message persistence backends.
    pub use anvilfix_store::*;
}

pub mod transport {
    //! TCP framing and socket plumbing.
    pub use anvilfix_transport::*;
}

pub mod engine {
    //! Settings, session factory, and the connection drivers.
    pub use anvilfix_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use anvilfix_core::{
        CompId, ConfigError, DecodeError, EncodeError, Field, FieldRef, FieldTag, FixError,
        Message, MsgType, RawMessage, Result, SeqNum, SessionError, SessionId,
        SessionRejectReason, StoreError, Timestamp,
    };

    // Dictionary
    pub use anvilfix_dictionary::{
        Dictionary, DictionaryCache, FieldDef, FieldType, GroupDef, MessageDef, MsgField,
        ValidationOptions, Validator, Version, session_dictionary,
    };

    // Tag-value codec
    pub use anvilfix_tagvalue::{Decoder, Encoder, checksum, encode_message};

    // Session layer
    pub use anvilfix_session::{
        Application, DoNotSend, HeartbeatMonitor, NullApplication, Rejection, ResendRange,
        Responder, Session, SessionConfig, SessionRole, SessionState, TimeRange,
    };

    // Stores
    pub use anvilfix_store::{
        FileStore, FileStoreFactory, MemoryStore, MemoryStoreFactory, MessageStore,
        MessageStoreFactory,
    };

    // Transport
    pub use anvilfix_transport::{CodecError, FixCodec, SocketOptions, TcpResponder};

    // Engine
    pub use anvilfix_engine::{
        Engine, SessionFactory, SessionHandle, SessionSettings, SocketAcceptor, SocketInitiator,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _seq = SeqNum::new(1);
        let _ts = Timestamp::now();
        let _state = SessionState::Disconnected;
    }

    #[test]
    fn test_version() {
        assert_eq!(Version::Fix44.begin_string(), "FIX.4.4");
    }

    #[tokio::test]
    async fn test_engine_construction() {
        let engine = Engine::new();
        assert_eq!(engine.session_count(), 0);
        assert!(!engine.is_logged_on().await);
    }
}
