/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Dictionary
//!
//! FIX data dictionary loading and message validation for the AnvilFIX engine.
//!
//! This crate provides:
//! - **Schema definitions**: field, message, and repeating-group definitions
//! - **Dictionary loading**: JSON dictionary files plus built-in session-layer
//!   dictionaries for every supported version
//! - **Caching**: a path-keyed cache owned by the engine (no globals)
//! - **Validation**: structural message validation mapping each failure to a
//!   standard session reject reason
//!
//! Sessions share one `Arc<Dictionary>` per path; per-session differences are
//! confined to [`ValidationOptions`], so the shared copy is never touched.

pub mod load;
pub mod schema;
pub mod validate;

pub use load::{DictionaryCache, load_dictionary, session_dictionary};
pub use schema::{
    Dictionary, FieldDef, FieldType, GroupDef, MessageCategory, MessageDef, MsgField, Version,
};
pub use validate::{ValidationError, ValidationOptions, Validator};
