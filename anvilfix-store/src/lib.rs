/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Store
//!
//! Message persistence and storage for the AnvilFIX session engine.
//!
//! This crate provides:
//! - **MessageStore trait**: the abstract persistence contract sessions use
//! - **MessageStoreFactory trait**: pluggable store creation per session
//! - **MemoryStore**: in-memory store for tests and non-durable sessions
//! - **FileStore**: durable four-file store (body, header index, sequence
//!   numbers, session creation time)

pub mod file;
pub mod memory;
pub mod traits;

pub use file::{FileStore, FileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};
pub use traits::{MessageStore, MessageStoreFactory};
