/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codec for FIX message framing.
//!
//! Frames the inbound byte stream by scanning for `8=`, reading the
//! BodyLength field, and consuming exactly that many bytes plus the
//! `10=NNN<SOH>` trailer. Content verification (CheckSum, dictionary) is
//! the session's job; the codec only cuts the stream into messages.

use bytes::{BufMut, BytesMut};
use memchr::memchr;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// SOH delimiter.
const SOH: u8 = 0x01;

/// Length of the `10=NNN<SOH>` trailer.
const TRAILER_LEN: usize = 7;

/// Errors that can occur during framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The stream does not start with a BeginString field.
    #[error("invalid begin string: message must start with 8=")]
    InvalidBeginString,

    /// BeginString is not followed by BodyLength.
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// BodyLength value is not a number.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Message exceeds the configured maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Computed frame size.
        size: usize,
        /// Maximum allowed size.
        max_size: usize,
    },

    /// I/O error from the underlying stream.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Tokio codec for FIX message framing.
#[derive(Debug, Clone)]
pub struct FixCodec {
    /// Maximum frame size in bytes.
    max_message_size: usize,
}

impl FixCodec {
    /// Creates a codec with the default 1 MiB frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: 1024 * 1024,
        }
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

impl Default for FixCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Smallest conceivable frame: 8=FIX.4.0|9=5|35=0|10=NNN|
        if src.len() < 2 {
            return Ok(None);
        }
        if &src[0..2] != b"8=" {
            return Err(CodecError::InvalidBeginString);
        }

        let Some(first_soh) = memchr(SOH, src) else {
            return Ok(None);
        };

        let body_len_start = first_soh + 1;
        if src.len() < body_len_start + 2 {
            return Ok(None);
        }
        if &src[body_len_start..body_len_start + 2] != b"9=" {
            return Err(CodecError::MissingBodyLength);
        }

        let Some(rel_soh) = memchr(SOH, &src[body_len_start..]) else {
            return Ok(None);
        };
        let body_len_soh = body_len_start + rel_soh;

        let body_length: usize = std::str::from_utf8(&src[body_len_start + 2..body_len_soh])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CodecError::InvalidBodyLength)?;

        // BodyLength covers from after the BodyLength SOH up to the trailer.
        let total_length = body_len_soh + 1 + body_length + TRAILER_LEN;
        if total_length > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: total_length,
                max_size: self.max_message_size,
            });
        }

        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(total_length)))
    }
}

impl Encoder<&[u8]> for FixCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &str) -> Vec<u8> {
        // Trailer value is irrelevant to framing.
        format!("8=FIX.4.4\x019={}\x01{}10=123\x01", body.len(), body).into_bytes()
    }

    #[test]
    fn test_decode_complete_message() {
        let mut codec = FixCodec::new();
        let msg = frame("35=0\x0134=2\x01");
        let mut buf = BytesMut::from(&msg[..]);

        let result = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&result[..], &msg[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_returns_none() {
        let mut codec = FixCodec::new();
        let msg = frame("35=0\x0134=2\x01");
        let mut buf = BytesMut::from(&msg[..msg.len() - 5]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), msg.len() - 5);
    }

    #[test]
    fn test_decode_two_pipelined_messages() {
        let mut codec = FixCodec::new();
        let first = frame("35=0\x0134=2\x01");
        let second = frame("35=1\x0134=3\x01112=T\x01");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second);

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &first[..]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &second[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_bad_begin_string() {
        let mut codec = FixCodec::new();
        let mut buf = BytesMut::from(&b"9=FIX.4.4\x019=5\x0135=0\x0110=000\x01"[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::InvalidBeginString)
        ));
    }

    #[test]
    fn test_decode_rejects_non_numeric_body_length() {
        let mut codec = FixCodec::new();
        let mut buf = BytesMut::from(&b"8=FIX.4.4\x019=xx\x0135=0\x0110=000\x01"[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::InvalidBodyLength)
        ));
    }

    #[test]
    fn test_decode_enforces_max_size() {
        let mut codec = FixCodec::new().with_max_message_size(32);
        let msg = frame("35=0\x0158=AAAAAAAAAAAAAAAAAAAAAAAAAAAAA\x01");
        let mut buf = BytesMut::from(&msg[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_passthrough() {
        let mut codec = FixCodec::new();
        let msg = b"8=FIX.4.4\x019=5\x0135=0\x0110=123\x01";
        let mut dst = BytesMut::new();

        codec.encode(&msg[..], &mut dst).unwrap();
        assert_eq!(&dst[..], msg);
    }
}
