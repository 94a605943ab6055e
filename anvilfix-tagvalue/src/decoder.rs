/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Zero-copy FIX message decoder.
//!
//! The decoder parses an already-framed FIX message buffer into a
//! [`RawMessage`] without copying field values. It enforces the wire
//! prologue (`8=`, `9=`, `35=` in that order) and optionally verifies
//! BodyLength extent and CheckSum; both verifications can be disabled per
//! session policy.

use crate::checksum::{checksum, decode_checksum};
use anvilfix_core::error::DecodeError;
use anvilfix_core::field::FieldRef;
use anvilfix_core::message::{MsgType, RawMessage};
use anvilfix_core::tags;
use memchr::memchr;
use smallvec::SmallVec;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// Zero-copy FIX message decoder.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Input buffer holding exactly one framed message.
    input: &'a [u8],
    /// Current position in the buffer.
    offset: usize,
    /// Whether to verify BodyLength extent and CheckSum.
    verify_length_and_checksum: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a new decoder for the given input buffer.
    #[inline]
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            verify_length_and_checksum: true,
        }
    }

    /// Sets whether BodyLength and CheckSum are verified during decoding.
    #[inline]
    #[must_use]
    pub const fn with_length_and_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_length_and_checksum = verify;
        self
    }

    /// Decodes the complete FIX message from the buffer.
    ///
    /// # Errors
    /// Returns `DecodeError` if the prologue is malformed, the buffer is
    /// truncated, or (when verification is on) BodyLength or CheckSum do
    /// not match the framed bytes.
    pub fn decode(&mut self) -> Result<RawMessage<'a>, DecodeError> {
        let begin_string_field = self.next_field().ok_or(DecodeError::Incomplete)?;
        if begin_string_field.tag != tags::BEGIN_STRING {
            return Err(DecodeError::InvalidBeginString);
        }

        let body_length_field = self.next_field().ok_or(DecodeError::MissingBodyLength)?;
        if body_length_field.tag != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        let body_length: usize = body_length_field
            .as_str()?
            .parse()
            .map_err(|_| DecodeError::InvalidBodyLength)?;
        let body_start = self.offset;

        let msg_type_field = self.next_field().ok_or(DecodeError::MissingMsgType)?;
        if msg_type_field.tag != tags::MSG_TYPE {
            return Err(DecodeError::MissingMsgType);
        }
        let msg_type: MsgType = msg_type_field.as_str()?.parse().unwrap_or_default();

        let mut fields: SmallVec<[FieldRef<'a>; 32]> = SmallVec::new();
        fields.push(begin_string_field);
        fields.push(body_length_field);
        fields.push(msg_type_field);

        let mut checksum_field: Option<FieldRef<'a>> = None;
        let mut checksum_start = 0;
        while let Some(field) = self.next_field() {
            if field.tag == tags::CHECK_SUM {
                // Position of the '1' in "10=": tag(2) + '='(1) before the value.
                checksum_start =
                    field.value.as_ptr() as usize - self.input.as_ptr() as usize - 3;
                checksum_field = Some(field);
                break;
            }
            fields.push(field);
        }
        let checksum_field = checksum_field.ok_or(DecodeError::Incomplete)?;

        if self.verify_length_and_checksum {
            if checksum_start != body_start + body_length {
                return Err(DecodeError::InvalidBodyLength);
            }

            let declared = decode_checksum(checksum_field.value).ok_or_else(|| {
                DecodeError::InvalidFieldValue {
                    tag: tags::CHECK_SUM,
                    reason: "invalid checksum format".to_string(),
                }
            })?;
            let calculated = checksum(&self.input[..checksum_start]);
            if calculated != declared {
                return Err(DecodeError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        fields.push(checksum_field);

        Ok(RawMessage::new(
            &self.input[..self.offset],
            msg_type,
            fields,
        ))
    }

    /// Parses the next `tag=value<SOH>` field from the buffer.
    ///
    /// # Returns
    /// The next field, or `None` when the buffer is exhausted or the next
    /// bytes do not form a complete field.
    #[inline]
    pub fn next_field(&mut self) -> Option<FieldRef<'a>> {
        if self.offset >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.offset..];
        let eq_pos = memchr(EQUALS, remaining)?;
        let tag = parse_tag(&remaining[..eq_pos])?;

        let value_start = eq_pos + 1;
        let soh_pos = memchr(SOH, &remaining[value_start..])?;
        let value = &remaining[value_start..value_start + soh_pos];

        self.offset += value_start + soh_pos + 1;

        Some(FieldRef::new(tag, value))
    }

    /// Returns the current offset in the buffer.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if the buffer has been fully consumed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.input.len()
    }
}

/// Parses an ASCII tag number.
#[inline]
fn parse_tag(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }

    let mut result: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((b - b'0') as u32)?;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::encode_checksum;

    fn frame(body: &str) -> Vec<u8> {
        let mut msg = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body).into_bytes();
        let cs = checksum(&msg);
        msg.extend_from_slice(b"10=");
        msg.extend_from_slice(&encode_checksum(cs));
        msg.push(SOH);
        msg
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag(b"8"), Some(8));
        assert_eq!(parse_tag(b"35"), Some(35));
        assert_eq!(parse_tag(b"12345"), Some(12345));
        assert_eq!(parse_tag(b""), None);
        assert_eq!(parse_tag(b"abc"), None);
        assert_eq!(parse_tag(b"12a"), None);
    }

    #[test]
    fn test_next_field() {
        let input = b"8=FIX.4.4\x019=5\x0135=0\x01";
        let mut decoder = Decoder::new(input);

        let field1 = decoder.next_field().unwrap();
        assert_eq!(field1.tag, 8);
        assert_eq!(field1.as_str().unwrap(), "FIX.4.4");

        let field2 = decoder.next_field().unwrap();
        assert_eq!(field2.tag, 9);

        let field3 = decoder.next_field().unwrap();
        assert_eq!(field3.tag, 35);

        assert!(decoder.next_field().is_none());
    }

    #[test]
    fn test_decode_heartbeat() {
        let msg = frame("35=0\x0134=2\x0149=A\x0156=B\x01");
        let raw = Decoder::new(&msg).decode().unwrap();

        assert_eq!(raw.msg_type(), &MsgType::Heartbeat);
        assert_eq!(raw.begin_string(), "FIX.4.4");
        assert_eq!(raw.msg_seq_num().unwrap(), 2);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut msg = frame("35=0\x0134=2\x01");
        let len = msg.len();
        msg[len - 4..len - 1].copy_from_slice(b"000");

        let result = Decoder::new(&msg).decode();
        assert!(matches!(result, Err(DecodeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_bad_body_length() {
        let mut msg = b"8=FIX.4.4\x019=99\x0135=0\x0134=2\x01".to_vec();
        let cs = checksum(&msg);
        msg.extend_from_slice(b"10=");
        msg.extend_from_slice(&encode_checksum(cs));
        msg.push(SOH);

        let result = Decoder::new(&msg).decode();
        assert!(matches!(result, Err(DecodeError::InvalidBodyLength)));
    }

    #[test]
    fn test_decode_without_verification() {
        let mut msg = frame("35=0\x0134=2\x01");
        let len = msg.len();
        msg[len - 4..len - 1].copy_from_slice(b"000");

        let raw = Decoder::new(&msg)
            .with_length_and_checksum_verification(false)
            .decode()
            .unwrap();
        assert_eq!(raw.msg_type(), &MsgType::Heartbeat);
    }

    #[test]
    fn test_decode_rejects_missing_begin_string() {
        let input = b"9=5\x0135=0\x0110=000\x01";
        let result = Decoder::new(input).decode();
        assert!(matches!(result, Err(DecodeError::InvalidBeginString)));
    }

    #[test]
    fn test_decode_app_msg_type() {
        let msg = frame("35=D\x0134=3\x0111=ORDER1\x01");
        let raw = Decoder::new(&msg).decode().unwrap();
        assert_eq!(raw.msg_type(), &MsgType::Application("D".to_string()));
        assert_eq!(raw.get_field_str(11), Some("ORDER1"));
    }
}
