/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Core
//!
//! Core types, traits, and error definitions for the AnvilFIX session engine.
//!
//! This crate provides the fundamental building blocks used across all AnvilFIX crates:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Field types**: `FieldTag`, `Field`, `FieldRef`
//! - **Message types**: `RawMessage`, `Message`, and the `MsgType` classification
//! - **Session identity**: `SessionId` and the `CompId`/`SeqNum`/`Timestamp` primitives
//! - **Wire constants**: session-layer tag numbers and the standard reject reason codes
//!
//! ## Zero-Copy Design
//!
//! Inbound parsing works on borrowed views (`RawMessage`, `FieldRef`) that reference
//! the framed buffer; outbound construction uses the owned three-section `Message`.

pub mod error;
pub mod field;
pub mod message;
pub mod session_id;
pub mod tags;
pub mod types;

pub use error::{
    ConfigError, DecodeError, EncodeError, FixError, Result, SessionError, SessionRejectReason,
    StoreError,
};
pub use field::{Field, FieldRef, FieldTag};
pub use message::{Message, MsgType, RawMessage};
pub use session_id::SessionId;
pub use types::{CompId, SeqNum, Timestamp};
