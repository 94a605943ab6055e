/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message types for the FIX session layer.
//!
//! This module provides:
//! - [`MsgType`]: Administrative message classification (tag 35)
//! - [`RawMessage`]: Zero-copy view into a framed FIX message buffer
//! - [`Message`]: Owned, mutable message with header/body/trailer sections
//!
//! The session engine distinguishes only the seven administrative message
//! types; every other MsgType value is application payload and is carried
//! through opaquely.

use crate::error::DecodeError;
use crate::field::{Field, FieldRef};
use crate::tags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// FIX message type (tag 35), split into the administrative types the
/// session layer interprets and opaque application types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0).
    #[default]
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Logon (A).
    Logon,
    /// Any application-level message type.
    Application(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            other => Self::Application(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::Application(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative (session-level) message.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        !matches!(self, Self::Application(_))
    }

    /// Returns true if this is an application message.
    #[must_use]
    pub const fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-copy view into a framed FIX message buffer.
///
/// Fields are retained in wire order; header/body/trailer membership is
/// derived from the static tag sets in [`crate::tags`]. Repeating groups
/// are not reshaped here; that pass is driven by the data dictionary.
#[derive(Debug, Clone)]
pub struct RawMessage<'a> {
    /// The complete message buffer.
    buffer: &'a [u8],
    /// The parsed message type.
    msg_type: MsgType,
    /// Parsed field references in wire order.
    fields: SmallVec<[FieldRef<'a>; 32]>,
}

impl<'a> RawMessage<'a> {
    /// Creates a new RawMessage from parsed components.
    ///
    /// # Arguments
    /// * `buffer` - The complete message buffer
    /// * `msg_type` - The parsed message type
    /// * `fields` - Parsed field references in wire order
    #[must_use]
    pub fn new(
        buffer: &'a [u8],
        msg_type: MsgType,
        fields: SmallVec<[FieldRef<'a>; 32]>,
    ) -> Self {
        Self {
            buffer,
            msg_type,
            fields,
        }
    }

    /// Returns the complete message buffer.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns an iterator over all fields in wire order.
    #[inline]
    pub fn fields(&self) -> impl Iterator<Item = &FieldRef<'a>> {
        self.fields.iter()
    }

    /// Returns an iterator over the body fields, in wire order.
    pub fn body_fields(&self) -> impl Iterator<Item = &FieldRef<'a>> {
        self.fields
            .iter()
            .filter(|f| !tags::is_header_tag(f.tag) && !tags::is_trailer_tag(f.tag))
    }

    /// Returns the number of fields in the message.
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Gets the first field with the given tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&FieldRef<'a>> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Gets a field value as a string.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&'a str> {
        self.get_field(tag).and_then(|f| f.as_str().ok())
    }

    /// Gets a field value parsed as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError` if the field is not found or cannot be parsed.
    pub fn get_field_as<T: std::str::FromStr>(&self, tag: u32) -> Result<T, DecodeError> {
        self.get_field(tag)
            .ok_or(DecodeError::MissingRequiredField { tag })?
            .parse()
    }

    /// Returns the BeginString value (e.g., "FIX.4.4").
    #[must_use]
    pub fn begin_string(&self) -> &'a str {
        self.get_field_str(tags::BEGIN_STRING).unwrap_or("")
    }

    /// Returns the MsgSeqNum (tag 34).
    ///
    /// # Errors
    /// Returns `DecodeError::MissingMsgSeqNum` if absent or unparseable.
    pub fn msg_seq_num(&self) -> Result<u64, DecodeError> {
        self.get_field(tags::MSG_SEQ_NUM)
            .ok_or(DecodeError::MissingMsgSeqNum)?
            .as_u64()
            .map_err(|_| DecodeError::MissingMsgSeqNum)
    }

    /// Returns the PossDupFlag (tag 43), defaulting to false when absent.
    #[must_use]
    pub fn poss_dup_flag(&self) -> bool {
        self.get_field(tags::POSS_DUP_FLAG)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false)
    }

    /// Returns the SenderCompID (tag 49) value, if present.
    #[must_use]
    pub fn sender_comp_id(&self) -> Option<&'a str> {
        self.get_field_str(tags::SENDER_COMP_ID)
    }

    /// Returns the TargetCompID (tag 56) value, if present.
    #[must_use]
    pub fn target_comp_id(&self) -> Option<&'a str> {
        self.get_field_str(tags::TARGET_COMP_ID)
    }

    /// Returns the message length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the message is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Copies this view into an owned, mutable [`Message`].
    ///
    /// BeginString, BodyLength, and CheckSum are dropped: they are
    /// recomputed when the owned message is serialized.
    #[must_use]
    pub fn to_message(&self) -> Message {
        let mut msg = Message::new(self.msg_type.clone());
        for f in &self.fields {
            match f.tag {
                tags::BEGIN_STRING | tags::BODY_LENGTH | tags::MSG_TYPE | tags::CHECK_SUM => {}
                t if tags::is_header_tag(t) => msg.header.push(f.to_owned()),
                t if tags::is_trailer_tag(t) => msg.trailer.push(f.to_owned()),
                _ => msg.body.push(f.to_owned()),
            }
        }
        msg
    }
}

/// Ordered field sequence forming one section of a [`Message`].
///
/// Fields keep insertion order; setting an existing tag replaces its value
/// in place, mirroring how a header is stamped repeatedly before send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSeq {
    fields: Vec<Field>,
}

impl FieldSeq {
    /// Creates an empty field sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping any existing field with the same tag.
    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Sets a field value, replacing the first existing occurrence in place.
    pub fn set(&mut self, field: Field) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.tag == field.tag) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Removes every field with the given tag.
    pub fn remove(&mut self, tag: u32) {
        self.fields.retain(|f| f.tag != tag);
    }

    /// Gets the first field with the given tag.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Gets a field value as a string.
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.get(tag).and_then(Field::as_str)
    }

    /// Returns true if a field with the given tag is present.
    #[must_use]
    pub fn contains(&self, tag: u32) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
    }

    /// Returns an iterator over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the sequence holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Owned, mutable FIX message with header, body, and trailer sections.
///
/// This is the build-side representation: the session stamps the header,
/// the application may mutate it in `to_admin`/`to_app`, and the encoder
/// serializes it computing BodyLength and CheckSum. On the wire the header
/// starts with `8`, `9`, `35` in that order and the trailer ends with `10`;
/// those four fields are owned by the encoder, not stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// The message type (tag 35).
    msg_type: MsgType,
    /// Header fields (excluding BeginString, BodyLength, MsgType).
    pub header: FieldSeq,
    /// Body fields in insertion order.
    pub body: FieldSeq,
    /// Trailer fields (excluding CheckSum).
    pub trailer: FieldSeq,
}

impl Message {
    /// Creates an empty message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            header: FieldSeq::new(),
            body: FieldSeq::new(),
            trailer: FieldSeq::new(),
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Sets a body field, replacing any existing occurrence.
    pub fn set(&mut self, tag: u32, value: &str) -> &mut Self {
        self.body.set(Field::from_str_value(tag, value));
        self
    }

    /// Sets an unsigned integer body field.
    pub fn set_uint(&mut self, tag: u32, value: u64) -> &mut Self {
        self.body.set(Field::from_uint(tag, value));
        self
    }

    /// Sets a boolean (Y/N) body field.
    pub fn set_bool(&mut self, tag: u32, value: bool) -> &mut Self {
        self.body.set(Field::from_bool(tag, value));
        self
    }

    /// Gets a body field value as a string.
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.body.get_str(tag)
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.msg_type.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_from_str() {
        assert_eq!("0".parse::<MsgType>().unwrap(), MsgType::Heartbeat);
        assert_eq!("A".parse::<MsgType>().unwrap(), MsgType::Logon);
        assert_eq!(
            "D".parse::<MsgType>().unwrap(),
            MsgType::Application("D".to_string())
        );
    }

    #[test]
    fn test_msg_type_is_admin() {
        assert!(MsgType::Heartbeat.is_admin());
        assert!(MsgType::Logon.is_admin());
        assert!(MsgType::SequenceReset.is_admin());
        assert!(!MsgType::Application("8".to_string()).is_admin());
    }

    #[test]
    fn test_field_seq_set_replaces_in_place() {
        let mut seq = FieldSeq::new();
        seq.push(Field::from_str_value(49, "SENDER"));
        seq.push(Field::from_str_value(56, "TARGET"));
        seq.set(Field::from_str_value(49, "OTHER"));

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get_str(49), Some("OTHER"));
        // Order is preserved after replacement.
        assert_eq!(seq.iter().next().unwrap().tag, 49);
    }

    #[test]
    fn test_message_body_access() {
        let mut msg = Message::new(MsgType::TestRequest);
        msg.set(112, "TEST");
        assert_eq!(msg.get_str(112), Some("TEST"));
        assert!(msg.is_admin());
    }

    #[test]
    fn test_raw_message_accessors() {
        let buffer = b"8=FIX.4.4\x019=30\x0135=0\x0134=5\x0149=A\x0156=B\x0143=Y\x0110=000\x01";
        let mut fields: SmallVec<[FieldRef<'_>; 32]> = SmallVec::new();
        fields.push(FieldRef::new(8, b"FIX.4.4"));
        fields.push(FieldRef::new(9, b"30"));
        fields.push(FieldRef::new(35, b"0"));
        fields.push(FieldRef::new(34, b"5"));
        fields.push(FieldRef::new(49, b"A"));
        fields.push(FieldRef::new(56, b"B"));
        fields.push(FieldRef::new(43, b"Y"));
        fields.push(FieldRef::new(10, b"000"));
        let raw = RawMessage::new(buffer, MsgType::Heartbeat, fields);

        assert_eq!(raw.begin_string(), "FIX.4.4");
        assert_eq!(raw.msg_seq_num().unwrap(), 5);
        assert!(raw.poss_dup_flag());
        assert_eq!(raw.sender_comp_id(), Some("A"));
        assert_eq!(raw.target_comp_id(), Some("B"));
    }

    #[test]
    fn test_raw_to_message_drops_framing_fields() {
        let buffer = b"8=FIX.4.4\x019=20\x0135=1\x0134=2\x01112=PING\x0110=111\x01";
        let mut fields: SmallVec<[FieldRef<'_>; 32]> = SmallVec::new();
        fields.push(FieldRef::new(8, b"FIX.4.4"));
        fields.push(FieldRef::new(9, b"20"));
        fields.push(FieldRef::new(35, b"1"));
        fields.push(FieldRef::new(34, b"2"));
        fields.push(FieldRef::new(112, b"PING"));
        fields.push(FieldRef::new(10, b"111"));
        let raw = RawMessage::new(buffer, MsgType::TestRequest, fields);

        let msg = raw.to_message();
        assert!(!msg.header.contains(8));
        assert!(!msg.header.contains(9));
        assert!(!msg.trailer.contains(10));
        assert_eq!(msg.header.get_str(34), Some("2"));
        assert_eq!(msg.get_str(112), Some("PING"));
    }
}
