/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message encoder.
//!
//! Two levels of API:
//! - [`Encoder`]: appends raw `tag=value` pairs and finishes by wrapping
//!   them in `8=`/`9=` and `10=`
//! - [`encode_message`]: serializes an owned [`Message`], emitting the
//!   fixed `8,9,35` prefix, then the remaining header in insertion order,
//!   then body and trailer, computing BodyLength and CheckSum on the way

use crate::checksum::{checksum, encode_checksum};
use anvilfix_core::error::EncodeError;
use anvilfix_core::message::Message;
use bytes::{BufMut, BytesMut};
use memchr::memchr;

/// SOH (Start of Header) delimiter used in FIX messages.
const SOH: u8 = 0x01;

/// Low-level FIX message encoder.
///
/// Fields are appended to an internal body buffer in call order; `finish`
/// prepends BeginString and BodyLength and appends CheckSum.
#[derive(Debug)]
pub struct Encoder {
    /// Buffer for the message body (between BodyLength and CheckSum).
    body: BytesMut,
    /// The BeginString value (e.g., "FIX.4.4").
    begin_string: String,
}

impl Encoder {
    /// Creates a new encoder with the specified BeginString.
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            body: BytesMut::with_capacity(256),
            begin_string: begin_string.into(),
        }
    }

    /// Appends a field with a string value.
    #[inline]
    pub fn put_str(&mut self, tag: u32, value: &str) {
        self.put_raw(tag, value.as_bytes());
    }

    /// Appends a field with an unsigned integer value.
    #[inline]
    pub fn put_uint(&mut self, tag: u32, value: u64) {
        let mut buf = itoa::Buffer::new();
        self.put_raw(tag, buf.format(value).as_bytes());
    }

    /// Appends a field with a boolean value (Y/N).
    #[inline]
    pub fn put_bool(&mut self, tag: u32, value: bool) {
        self.put_raw(tag, if value { b"Y" } else { b"N" });
    }

    /// Appends a field with raw bytes.
    #[inline]
    pub fn put_raw(&mut self, tag: u32, value: &[u8]) {
        let mut tag_buf = itoa::Buffer::new();
        self.body.put_slice(tag_buf.format(tag).as_bytes());
        self.body.put_u8(b'=');
        self.body.put_slice(value);
        self.body.put_u8(SOH);
    }

    /// Finalizes the message and returns the complete encoded bytes.
    ///
    /// Prepends `8=BeginString` and `9=BodyLength`, then appends
    /// `10=CheckSum` computed over everything before it.
    #[must_use]
    pub fn finish(self) -> BytesMut {
        let body_len = self.body.len();

        let mut message = BytesMut::with_capacity(body_len + 32);
        message.put_slice(b"8=");
        message.put_slice(self.begin_string.as_bytes());
        message.put_u8(SOH);
        message.put_slice(b"9=");
        let mut len_buf = itoa::Buffer::new();
        message.put_slice(len_buf.format(body_len).as_bytes());
        message.put_u8(SOH);
        message.put_slice(&self.body);

        let cs = checksum(&message);
        message.put_slice(b"10=");
        message.put_slice(&encode_checksum(cs));
        message.put_u8(SOH);

        message
    }

    /// Returns the current body length.
    #[inline]
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Serializes an owned [`Message`] into a complete wire frame.
///
/// Emission order is the fixed `8,9,35` prefix, the remaining header fields
/// in insertion order, the body, then the trailer, with CheckSum last.
///
/// # Arguments
/// * `begin_string` - The session's FIX version string
/// * `message` - The message to serialize
///
/// # Errors
/// Returns `EncodeError::ValueContainsSoh` if any field value embeds the
/// SOH delimiter.
pub fn encode_message(begin_string: &str, message: &Message) -> Result<BytesMut, EncodeError> {
    let mut encoder = Encoder::new(begin_string);
    encoder.put_str(anvilfix_core::tags::MSG_TYPE, message.msg_type().as_str());

    for field in message
        .header
        .iter()
        .chain(message.body.iter())
        .chain(message.trailer.iter())
    {
        if memchr(SOH, &field.value).is_some() {
            return Err(EncodeError::ValueContainsSoh { tag: field.tag });
        }
        encoder.put_raw(field.tag, &field.value);
    }

    Ok(encoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use anvilfix_core::message::MsgType;

    #[test]
    fn test_encoder_basic() {
        let mut encoder = Encoder::new("FIX.4.4");
        encoder.put_str(35, "0");

        let message = encoder.finish();
        let msg_str = String::from_utf8_lossy(&message);

        assert!(msg_str.starts_with("8=FIX.4.4\x019=5\x01"));
        assert!(msg_str.contains("35=0\x01"));
        assert!(msg_str.contains("10="));
    }

    #[test]
    fn test_encoder_body_length_is_exact() {
        let mut encoder = Encoder::new("FIX.4.2");
        encoder.put_str(35, "A");
        encoder.put_uint(34, 1);
        encoder.put_uint(98, 0);
        encoder.put_uint(108, 30);

        let message = encoder.finish();
        let raw = Decoder::new(&message).decode().unwrap();
        assert_eq!(raw.msg_type(), &MsgType::Logon);
    }

    #[test]
    fn test_encoder_bool() {
        let mut encoder = Encoder::new("FIX.4.4");
        encoder.put_str(35, "4");
        encoder.put_bool(123, true);

        let message = encoder.finish();
        assert!(String::from_utf8_lossy(&message).contains("123=Y\x01"));
    }

    #[test]
    fn test_encode_message_prefix_order() {
        let mut msg = Message::new(MsgType::Logon);
        msg.header.set(anvilfix_core::Field::from_str_value(49, "SENDER"));
        msg.header.set(anvilfix_core::Field::from_str_value(56, "TARGET"));
        msg.header.set(anvilfix_core::Field::from_uint(34, 1));
        msg.set_uint(98, 0);
        msg.set_uint(108, 30);

        let bytes = encode_message("FIX.4.4", &msg).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("8=FIX.4.4\x019="));
        let after_len = text.find("\x0135=A\x01").expect("35 follows 9");
        let header_pos = text.find("49=SENDER").unwrap();
        assert!(after_len < header_pos);
        assert!(text.ends_with("\x01") && text.contains("10="));
    }

    #[test]
    fn test_encode_message_roundtrip() {
        let mut msg = Message::new(MsgType::TestRequest);
        msg.header.set(anvilfix_core::Field::from_uint(34, 7));
        msg.set(112, "PING");

        let bytes = encode_message("FIX.4.4", &msg).unwrap();
        let raw = Decoder::new(&bytes).decode().unwrap();

        assert_eq!(raw.msg_type(), &MsgType::TestRequest);
        assert_eq!(raw.msg_seq_num().unwrap(), 7);
        assert_eq!(raw.get_field_str(112), Some("PING"));

        let rebuilt = raw.to_message();
        let bytes2 = encode_message("FIX.4.4", &rebuilt).unwrap();
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn test_encode_message_rejects_soh_in_value() {
        let mut msg = Message::new(MsgType::Heartbeat);
        msg.body.set(anvilfix_core::Field::new(
            58,
            bytes::Bytes::from_static(b"bad\x01value"),
        ));

        let result = encode_message("FIX.4.4", &msg);
        assert!(matches!(
            result,
            Err(EncodeError::ValueContainsSoh { tag: 58 })
        ));
    }
}
