/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the AnvilFIX session engine.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all AnvilFIX operations, plus the standard
//! FIX session-level reject reason codes (tag 373).

use thiserror::Error;

/// Result type alias using [`FixError`] as the error type.
pub type Result<T> = std::result::Result<T, FixError>;

/// Top-level error type for all AnvilFIX operations.
#[derive(Debug, Error)]
pub enum FixError {
    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during message encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in message store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error from underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that make a single inbound message unusable.
///
/// A decode error is fatal to the individual message only: the session drops
/// the bytes without advancing the inbound sequence number.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Message buffer is incomplete, need more data.
    #[error("incomplete message, need more data")]
    Incomplete,

    /// Message does not start with a BeginString field (tag 8).
    #[error("invalid begin string: expected 8=FIX.x.y")]
    InvalidBeginString,

    /// Missing BodyLength field (tag 9).
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// BodyLength is not a number or does not match the framed extent.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Missing MsgType field (tag 35).
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// Missing MsgSeqNum field (tag 34).
    #[error("missing msg seq num field (tag 34)")]
    MissingMsgSeqNum,

    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in message.
        declared: u8,
    },

    /// Invalid tag format (not a valid integer).
    #[error("invalid tag format: {0}")]
    InvalidTag(String),

    /// Missing required field.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Field value does not match the grammar of its declared type.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Invalid UTF-8 in string field.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Actual message size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max_size: usize,
    },
}

/// Errors that occur during FIX message encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Missing required field during encoding.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Field value contains the SOH delimiter.
    #[error("field value for tag {tag} contains SOH")]
    ValueContainsSoh {
        /// The tag number of the field.
        tag: u32,
    },

    /// Field value exceeds maximum length.
    #[error("field value too long for tag {tag}: {length} exceeds max {max_length}")]
    FieldTooLong {
        /// The tag number of the field.
        tag: u32,
        /// Actual length of the value.
        length: usize,
        /// Maximum allowed length.
        max_length: usize,
    },
}

/// Errors in FIX session layer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session is not in the correct state for the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current session state.
        current: String,
    },

    /// Logon was rejected, either locally or by the counterparty.
    #[error("logon rejected: {reason}")]
    LogonRejected {
        /// Reason for rejection.
        reason: String,
    },

    /// No response to a TestRequest within the timeout window.
    #[error("timed out waiting for heartbeat after {elapsed_ms} ms")]
    HeartbeatTimeout {
        /// Elapsed time in milliseconds since last inbound message.
        elapsed_ms: u64,
    },

    /// Inbound sequence number lower than expected without PossDupFlag.
    #[error("MsgSeqNum too low, expecting {expected} received {received}")]
    SequenceTooLow {
        /// Minimum expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// CompID fields do not match the session identity.
    #[error("CompID problem: expected {expected}, received {received}")]
    CompIdMismatch {
        /// Expected CompID pair.
        expected: String,
        /// Received CompID pair.
        received: String,
    },

    /// SendingTime is outside the accepted latency window.
    #[error("SendingTime accuracy problem")]
    SendingTimeAccuracy,

    /// The transport refused an outbound write.
    #[error("transport write failed")]
    TransportFailed,

    /// No responder is attached to the session.
    #[error("session has no responder")]
    NoResponder,

    /// Session-level configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors in message store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A message is already stored under this sequence number.
    #[error("duplicate sequence number in store: {seq_num}")]
    DuplicateSeqNum {
        /// Sequence number of the colliding message.
        seq_num: u64,
    },

    /// Failed to store message.
    #[error("failed to store message seq={seq_num}: {reason}")]
    StoreFailed {
        /// Sequence number of the message.
        seq_num: u64,
        /// Reason for failure.
        reason: String,
    },

    /// Store is corrupted.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// I/O error in persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors loading or validating engine and session configuration.
///
/// Configuration errors are fatal at startup and prevent the engine from
/// starting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing setting: {key}")]
    MissingSetting {
        /// The setting key.
        key: String,
    },

    /// A setting has an unusable value.
    #[error("invalid setting {key}: {reason}")]
    InvalidSetting {
        /// The setting key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A line in the settings file could not be parsed.
    #[error("malformed settings line {line_no}: {line}")]
    MalformedLine {
        /// One-based line number.
        line_no: usize,
        /// The offending line content.
        line: String,
    },

    /// The settings file declares no usable sessions.
    #[error("no sessions defined{0}")]
    NoSessionsDefined(String),

    /// Failed to read a configuration or dictionary file.
    #[error("config i/o error: {0}")]
    Io(String),
}

/// Standard FIX session-level reject reason codes (tag 373).
///
/// Each failed validation or verification check maps to one of these codes
/// on the outbound Reject (35=3) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionRejectReason {
    /// 0 - Invalid tag number.
    InvalidTagNumber = 0,
    /// 1 - Required tag missing.
    RequiredTagMissing = 1,
    /// 2 - Tag not defined for this message type.
    TagNotDefinedForThisMessageType = 2,
    /// 3 - Undefined tag.
    UndefinedTag = 3,
    /// 4 - Tag specified without a value.
    TagSpecifiedWithoutAValue = 4,
    /// 5 - Value is incorrect (out of range) for this tag.
    ValueIsIncorrect = 5,
    /// 6 - Incorrect data format for value.
    IncorrectDataFormat = 6,
    /// 9 - CompID problem.
    CompIdProblem = 9,
    /// 10 - SendingTime accuracy problem.
    SendingTimeAccuracyProblem = 10,
    /// 11 - Invalid MsgType.
    InvalidMsgType = 11,
    /// 13 - Tag appears more than once.
    TagAppearsMoreThanOnce = 13,
    /// 14 - Tag specified out of required order.
    TagSpecifiedOutOfRequiredOrder = 14,
    /// 15 - Repeating group fields out of order.
    RepeatingGroupFieldsOutOfOrder = 15,
    /// 16 - Incorrect NumInGroup count for repeating group.
    IncorrectNumInGroupCount = 16,
    /// 99 - Other.
    Other = 99,
}

impl SessionRejectReason {
    /// Returns the wire value for tag 373.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns the standard descriptive text for this reason.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::InvalidTagNumber => "Invalid tag number",
            Self::RequiredTagMissing => "Required tag missing",
            Self::TagNotDefinedForThisMessageType => "Tag not defined for this message type",
            Self::UndefinedTag => "Undefined tag",
            Self::TagSpecifiedWithoutAValue => "Tag specified without a value",
            Self::ValueIsIncorrect => "Value is incorrect (out of range) for this tag",
            Self::IncorrectDataFormat => "Incorrect data format for value",
            Self::CompIdProblem => "CompID problem",
            Self::SendingTimeAccuracyProblem => "SendingTime accuracy problem",
            Self::InvalidMsgType => "Invalid MsgType",
            Self::TagAppearsMoreThanOnce => "Tag appears more than once",
            Self::TagSpecifiedOutOfRequiredOrder => "Tag specified out of required order",
            Self::RepeatingGroupFieldsOutOfOrder => "Repeating group fields out of order",
            Self::IncorrectNumInGroupCount => "Incorrect NumInGroup count for repeating group",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for SessionRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}
