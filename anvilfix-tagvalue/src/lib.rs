/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX TagValue
//!
//! Zero-copy FIX tag=value encoding and decoding for the AnvilFIX engine.
//!
//! This crate provides:
//! - **Checksum**: mod-256 CheckSum computation, formatting, and parsing
//! - **Decoder**: zero-copy parsing of framed messages into `RawMessage`
//! - **Encoder**: message serialization with automatic BodyLength/CheckSum
//! - **Field codecs**: typed decode/encode for timestamps, booleans, and
//!   day-of-week values

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod fields;

pub use checksum::{checksum, decode_checksum, encode_checksum};
pub use decoder::{Decoder, EQUALS, SOH};
pub use encoder::{Encoder, encode_message};
pub use fields::{
    format_day_of_week, format_utc_timestamp, parse_bool, parse_day_of_week, parse_float,
    parse_int, parse_utc_timestamp,
};
