/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Dictionary loading and caching.
//!
//! Dictionaries are JSON files deserialized straight into the schema types.
//! The cache is keyed by path and owned by the engine, so a dictionary file
//! is read once per process; sessions receive cheap `Arc` handles.
//!
//! [`session_dictionary`] builds the session-layer (administrative)
//! dictionary for a version programmatically, so a session can validate
//! admin traffic without any external file.

use crate::schema::{
    Dictionary, FieldDef, FieldType, MessageCategory, MessageDef, MsgField, Version,
};
use anvilfix_core::error::ConfigError;
use anvilfix_core::tags;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads a dictionary from a JSON file.
///
/// # Errors
/// Returns `ConfigError::Io` if the file cannot be read and
/// `ConfigError::InvalidSetting` if it does not deserialize.
pub fn load_dictionary(path: &Path) -> Result<Dictionary, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    serde_json::from_str(&data).map_err(|e| ConfigError::InvalidSetting {
        key: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Path-keyed dictionary cache.
///
/// Read-heavy: a path is loaded under the lock on first use and shared as
/// an `Arc` afterwards. Owned by the engine, one per process by convention
/// but nothing enforces or requires that.
#[derive(Debug, Default)]
pub struct DictionaryCache {
    entries: Mutex<HashMap<PathBuf, Arc<Dictionary>>>,
}

impl DictionaryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the dictionary at `path`, reusing a previously loaded copy.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(&self, path: &Path) -> Result<Arc<Dictionary>, ConfigError> {
        let mut entries = self.entries.lock();
        if let Some(dict) = entries.get(path) {
            return Ok(Arc::clone(dict));
        }

        let dict = Arc::new(load_dictionary(path)?);
        entries.insert(path.to_path_buf(), Arc::clone(&dict));
        Ok(dict)
    }

    /// Inserts a pre-built dictionary under a synthetic key.
    pub fn insert(&self, key: impl Into<PathBuf>, dict: Arc<Dictionary>) {
        self.entries.lock().insert(key.into(), dict);
    }

    /// Returns the number of cached dictionaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Builds the session-layer dictionary for a FIX version.
///
/// Covers the standard header and trailer plus the seven administrative
/// message types. Application dictionaries extend this baseline via JSON
/// files.
#[must_use]
pub fn session_dictionary(version: Version) -> Dictionary {
    let mut dict = Dictionary::new(version);
    let fixt = version.uses_fixt();

    for field in session_field_defs(fixt) {
        dict.add_field(field);
    }

    dict.header = vec![
        MsgField::required(tags::BEGIN_STRING),
        MsgField::required(tags::BODY_LENGTH),
        MsgField::required(tags::MSG_TYPE),
        MsgField::required(tags::SENDER_COMP_ID),
        MsgField::required(tags::TARGET_COMP_ID),
        MsgField::required(tags::MSG_SEQ_NUM),
        MsgField::required(tags::SENDING_TIME),
        MsgField::optional(tags::SENDER_SUB_ID),
        MsgField::optional(tags::TARGET_SUB_ID),
        MsgField::optional(tags::ON_BEHALF_OF_COMP_ID),
        MsgField::optional(tags::ON_BEHALF_OF_SUB_ID),
        MsgField::optional(tags::DELIVER_TO_COMP_ID),
        MsgField::optional(tags::DELIVER_TO_SUB_ID),
        MsgField::optional(tags::POSS_DUP_FLAG),
        MsgField::optional(tags::POSS_RESEND),
        MsgField::optional(tags::ORIG_SENDING_TIME),
        MsgField::optional(tags::LAST_MSG_SEQ_NUM_PROCESSED),
    ];
    if fixt {
        dict.header.push(MsgField::optional(tags::APPL_VER_ID));
    }

    dict.trailer = vec![
        MsgField::optional(tags::SIGNATURE_LENGTH),
        MsgField::optional(tags::SIGNATURE),
        MsgField::required(tags::CHECK_SUM),
    ];

    let mut logon_fields = vec![
        MsgField::required(tags::ENCRYPT_METHOD),
        MsgField::required(tags::HEART_BT_INT),
        MsgField::optional(tags::RESET_SEQ_NUM_FLAG),
    ];
    if fixt {
        logon_fields.push(MsgField::required(tags::DEFAULT_APPL_VER_ID));
    }

    for (msg_type, name, fields) in [
        ("0", "Heartbeat", vec![MsgField::optional(tags::TEST_REQ_ID)]),
        ("1", "TestRequest", vec![MsgField::required(tags::TEST_REQ_ID)]),
        (
            "2",
            "ResendRequest",
            vec![
                MsgField::required(tags::BEGIN_SEQ_NO),
                MsgField::required(tags::END_SEQ_NO),
            ],
        ),
        (
            "3",
            "Reject",
            vec![
                MsgField::required(tags::REF_SEQ_NUM),
                MsgField::optional(tags::REF_TAG_ID),
                MsgField::optional(tags::REF_MSG_TYPE),
                MsgField::optional(tags::SESSION_REJECT_REASON),
                MsgField::optional(tags::TEXT),
            ],
        ),
        (
            "4",
            "SequenceReset",
            vec![
                MsgField::required(tags::NEW_SEQ_NO),
                MsgField::optional(tags::GAP_FILL_FLAG),
            ],
        ),
        ("5", "Logout", vec![MsgField::optional(tags::TEXT)]),
        ("A", "Logon", logon_fields),
    ] {
        dict.add_message(MessageDef {
            msg_type: msg_type.to_string(),
            name: name.to_string(),
            category: MessageCategory::Admin,
            fields,
            groups: Vec::new(),
        });
    }

    dict
}

fn session_field_defs(fixt: bool) -> Vec<FieldDef> {
    let mut defs = vec![
        FieldDef::new(tags::BEGIN_STRING, "BeginString", FieldType::String),
        FieldDef::new(tags::BODY_LENGTH, "BodyLength", FieldType::Length),
        FieldDef::new(tags::CHECK_SUM, "CheckSum", FieldType::String),
        FieldDef::new(tags::BEGIN_SEQ_NO, "BeginSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::END_SEQ_NO, "EndSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::MSG_SEQ_NUM, "MsgSeqNum", FieldType::SeqNum),
        FieldDef::new(tags::MSG_TYPE, "MsgType", FieldType::String),
        FieldDef::new(tags::NEW_SEQ_NO, "NewSeqNo", FieldType::SeqNum),
        FieldDef::new(tags::POSS_DUP_FLAG, "PossDupFlag", FieldType::Boolean),
        FieldDef::new(tags::REF_SEQ_NUM, "RefSeqNum", FieldType::SeqNum),
        FieldDef::new(tags::SENDER_COMP_ID, "SenderCompID", FieldType::String),
        FieldDef::new(tags::SENDER_SUB_ID, "SenderSubID", FieldType::String),
        FieldDef::new(tags::SENDING_TIME, "SendingTime", FieldType::UtcTimestamp),
        FieldDef::new(tags::TARGET_COMP_ID, "TargetCompID", FieldType::String),
        FieldDef::new(tags::TARGET_SUB_ID, "TargetSubID", FieldType::String),
        FieldDef::new(tags::TEXT, "Text", FieldType::String),
        FieldDef::new(tags::SIGNATURE, "Signature", FieldType::Data),
        FieldDef::new(tags::SIGNATURE_LENGTH, "SignatureLength", FieldType::Length),
        FieldDef::new(tags::POSS_RESEND, "PossResend", FieldType::Boolean),
        FieldDef::new(tags::ENCRYPT_METHOD, "EncryptMethod", FieldType::Int)
            .with_values([("0", "None")]),
        FieldDef::new(tags::HEART_BT_INT, "HeartBtInt", FieldType::Int),
        FieldDef::new(tags::TEST_REQ_ID, "TestReqID", FieldType::String),
        FieldDef::new(
            tags::ON_BEHALF_OF_COMP_ID,
            "OnBehalfOfCompID",
            FieldType::String,
        ),
        FieldDef::new(
            tags::ON_BEHALF_OF_SUB_ID,
            "OnBehalfOfSubID",
            FieldType::String,
        ),
        FieldDef::new(
            tags::ORIG_SENDING_TIME,
            "OrigSendingTime",
            FieldType::UtcTimestamp,
        ),
        FieldDef::new(tags::GAP_FILL_FLAG, "GapFillFlag", FieldType::Boolean),
        FieldDef::new(
            tags::DELIVER_TO_COMP_ID,
            "DeliverToCompID",
            FieldType::String,
        ),
        FieldDef::new(tags::DELIVER_TO_SUB_ID, "DeliverToSubID", FieldType::String),
        FieldDef::new(
            tags::RESET_SEQ_NUM_FLAG,
            "ResetSeqNumFlag",
            FieldType::Boolean,
        ),
        FieldDef::new(
            tags::LAST_MSG_SEQ_NUM_PROCESSED,
            "LastMsgSeqNumProcessed",
            FieldType::SeqNum,
        ),
        FieldDef::new(tags::REF_TAG_ID, "RefTagID", FieldType::Int),
        FieldDef::new(tags::REF_MSG_TYPE, "RefMsgType", FieldType::String),
        FieldDef::new(
            tags::SESSION_REJECT_REASON,
            "SessionRejectReason",
            FieldType::Int,
        ),
    ];

    if fixt {
        defs.push(FieldDef::new(tags::APPL_VER_ID, "ApplVerID", FieldType::String));
        defs.push(FieldDef::new(
            tags::DEFAULT_APPL_VER_ID,
            "DefaultApplVerID",
            FieldType::String,
        ));
    }

    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dictionary_admin_messages() {
        let dict = session_dictionary(Version::Fix44);
        for msg_type in ["0", "1", "2", "3", "4", "5", "A"] {
            assert!(dict.get_message(msg_type).is_some(), "missing {msg_type}");
        }
        assert!(dict.get_message("D").is_none());
    }

    #[test]
    fn test_session_dictionary_header_trailer() {
        let dict = session_dictionary(Version::Fix42);
        assert!(dict.header.iter().any(|f| f.tag == tags::MSG_SEQ_NUM && f.required));
        assert!(dict.trailer.iter().any(|f| f.tag == tags::CHECK_SUM && f.required));
        assert!(!dict.header.iter().any(|f| f.tag == tags::APPL_VER_ID));
    }

    #[test]
    fn test_session_dictionary_fixt_extras() {
        let dict = session_dictionary(Version::Fixt11);
        assert!(dict.header.iter().any(|f| f.tag == tags::APPL_VER_ID));
        let logon = dict.get_message("A").unwrap();
        assert!(
            logon
                .fields
                .iter()
                .any(|f| f.tag == tags::DEFAULT_APPL_VER_ID && f.required)
        );
    }

    #[test]
    fn test_dictionary_cache_load_once() {
        let dir = std::env::temp_dir().join("anvilfix-dict-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fix44.json");
        let dict = session_dictionary(Version::Fix44);
        std::fs::write(&path, serde_json::to_string(&dict).unwrap()).unwrap();

        let cache = DictionaryCache::new();
        let a = cache.load(&path).unwrap();
        let b = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_dictionary_missing_file() {
        let result = load_dictionary(Path::new("/nonexistent/dict.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_dictionary_json_roundtrip() {
        let dict = session_dictionary(Version::Fix44);
        let json = serde_json::to_string(&dict).unwrap();
        let parsed: Dictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, Version::Fix44);
        assert_eq!(parsed.messages.len(), dict.messages.len());
    }
}
