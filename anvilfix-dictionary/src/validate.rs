/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Structural message validation against a data dictionary.
//!
//! Checks run in a fixed order; the first failure wins and carries the
//! session reject reason the outbound Reject (35=3) must use:
//!
//! 1. BeginString matches the dictionary version
//! 2. MsgType is declared
//! 3. Required fields are present
//! 4. Tags are declared and belong to the message (duplicates detected)
//! 5. Values conform to the declared type
//! 6. Enumerated fields carry a declared value
//! 7. Header / body / trailer ordering (optional)
//! 8. Repeating group structure
//!
//! The dictionary itself is shared and immutable; per-session differences
//! live in [`ValidationOptions`] held beside the `Arc`.

use crate::schema::{Dictionary, FieldType, GroupDef, MessageDef};
use anvilfix_core::error::SessionRejectReason;
use anvilfix_core::field::FieldRef;
use anvilfix_core::message::RawMessage;
use anvilfix_core::tags;
use anvilfix_tagvalue::fields as codecs;
use std::sync::Arc;
use thiserror::Error;

/// Per-session validation policy.
///
/// This is the mutable portion of the dictionary: each session owns its
/// copy while the schema stays shared.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Enforce header/body/trailer field ordering.
    pub check_fields_out_of_order: bool,
    /// Reject fields with empty values.
    pub check_fields_have_values: bool,
    /// Reject user-defined tags (5000+) that the dictionary does not declare.
    pub check_user_defined_fields: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_fields_out_of_order: true,
            check_fields_have_values: true,
            check_user_defined_fields: true,
        }
    }
}

/// A failed validation check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{text}")]
pub struct ValidationError {
    /// The session reject reason for the outbound Reject.
    pub reason: SessionRejectReason,
    /// The offending tag, when one is identifiable.
    pub ref_tag: Option<u32>,
    /// Human-readable description.
    pub text: String,
}

impl ValidationError {
    fn new(reason: SessionRejectReason, ref_tag: Option<u32>, text: impl Into<String>) -> Self {
        Self {
            reason,
            ref_tag,
            text: text.into(),
        }
    }
}

/// Dictionary-driven message validator.
#[derive(Debug, Clone)]
pub struct Validator {
    dictionary: Arc<Dictionary>,
    options: ValidationOptions,
}

impl Validator {
    /// Creates a validator with default options.
    #[must_use]
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            options: ValidationOptions::default(),
        }
    }

    /// Creates a validator with explicit options.
    #[must_use]
    pub const fn with_options(dictionary: Arc<Dictionary>, options: ValidationOptions) -> Self {
        Self {
            dictionary,
            options,
        }
    }

    /// Returns the shared dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Returns a mutable handle to this session's validation policy.
    pub fn options_mut(&mut self) -> &mut ValidationOptions {
        &mut self.options
    }

    /// Validates a parsed message.
    ///
    /// # Errors
    /// Returns the first failed check with its reject reason.
    pub fn validate(&self, raw: &RawMessage<'_>) -> Result<(), ValidationError> {
        self.check_begin_string(raw)?;
        let msg_def = self.check_msg_type(raw)?;
        self.check_required_fields(raw, msg_def)?;
        self.check_tags_declared(raw, msg_def)?;
        self.check_values(raw)?;
        if self.options.check_fields_out_of_order {
            self.check_field_order(raw)?;
        }
        self.check_groups(raw, msg_def)?;
        Ok(())
    }

    fn check_begin_string(&self, raw: &RawMessage<'_>) -> Result<(), ValidationError> {
        let expected = self.dictionary.version.begin_string();
        if raw.begin_string() != expected {
            return Err(ValidationError::new(
                SessionRejectReason::ValueIsIncorrect,
                Some(tags::BEGIN_STRING),
                format!(
                    "BeginString mismatch: expected {expected} received {}",
                    raw.begin_string()
                ),
            ));
        }
        Ok(())
    }

    fn check_msg_type<'d>(
        &'d self,
        raw: &RawMessage<'_>,
    ) -> Result<&'d MessageDef, ValidationError> {
        let msg_type = raw.msg_type().as_str();
        self.dictionary.get_message(msg_type).ok_or_else(|| {
            ValidationError::new(
                SessionRejectReason::InvalidMsgType,
                Some(tags::MSG_TYPE),
                format!("Invalid MsgType: {msg_type}"),
            )
        })
    }

    fn check_required_fields(
        &self,
        raw: &RawMessage<'_>,
        msg_def: &MessageDef,
    ) -> Result<(), ValidationError> {
        let missing = self
            .dictionary
            .header
            .iter()
            .chain(msg_def.fields.iter())
            .chain(self.dictionary.trailer.iter())
            .find(|f| f.required && raw.get_field(f.tag).is_none());

        match missing {
            Some(f) => Err(ValidationError::new(
                SessionRejectReason::RequiredTagMissing,
                Some(f.tag),
                format!("Required tag missing: {}", f.tag),
            )),
            None => Ok(()),
        }
    }

    fn check_tags_declared(
        &self,
        raw: &RawMessage<'_>,
        msg_def: &MessageDef,
    ) -> Result<(), ValidationError> {
        let mut seen_body_tags: Vec<u32> = Vec::new();

        for field in raw.fields() {
            let tag = field.tag;
            if !self.dictionary.declares_tag(tag) {
                if tag >= 5000 && !self.options.check_user_defined_fields {
                    continue;
                }
                return Err(ValidationError::new(
                    SessionRejectReason::InvalidTagNumber,
                    Some(tag),
                    format!("Invalid tag number: {tag}"),
                ));
            }

            if tags::is_header_tag(tag) || tags::is_trailer_tag(tag) {
                continue;
            }

            if !msg_def.declares(tag) {
                return Err(ValidationError::new(
                    SessionRejectReason::TagNotDefinedForThisMessageType,
                    Some(tag),
                    format!("Tag not defined for this message type: {tag}"),
                ));
            }

            // Duplicates are legitimate only inside repeating groups.
            if seen_body_tags.contains(&tag) && !in_any_group(msg_def, tag) {
                return Err(ValidationError::new(
                    SessionRejectReason::TagAppearsMoreThanOnce,
                    Some(tag),
                    format!("Tag appears more than once: {tag}"),
                ));
            }
            seen_body_tags.push(tag);
        }

        Ok(())
    }

    fn check_values(&self, raw: &RawMessage<'_>) -> Result<(), ValidationError> {
        for field in raw.fields() {
            if field.is_empty() {
                if self.options.check_fields_have_values {
                    return Err(ValidationError::new(
                        SessionRejectReason::TagSpecifiedWithoutAValue,
                        Some(field.tag),
                        format!("Tag specified without a value: {}", field.tag),
                    ));
                }
                continue;
            }

            let Some(def) = self.dictionary.get_field(field.tag) else {
                continue;
            };

            check_value_format(field, def.field_type)?;

            if let Ok(value) = field.as_str()
                && !def.accepts_value(value)
            {
                return Err(ValidationError::new(
                    SessionRejectReason::ValueIsIncorrect,
                    Some(field.tag),
                    format!("Value is incorrect for tag {}: {value}", field.tag),
                ));
            }
        }
        Ok(())
    }

    fn check_field_order(&self, raw: &RawMessage<'_>) -> Result<(), ValidationError> {
        // Header fields must precede the body; trailer fields must close it.
        let mut in_body = false;
        let mut in_trailer = false;

        for field in raw.fields() {
            let header = tags::is_header_tag(field.tag);
            let trailer = tags::is_trailer_tag(field.tag);

            if trailer {
                in_trailer = true;
            } else if in_trailer || (header && in_body) {
                return Err(ValidationError::new(
                    SessionRejectReason::TagSpecifiedOutOfRequiredOrder,
                    Some(field.tag),
                    format!("Tag specified out of required order: {}", field.tag),
                ));
            } else if !header {
                in_body = true;
            }
        }
        Ok(())
    }

    fn check_groups(
        &self,
        raw: &RawMessage<'_>,
        msg_def: &MessageDef,
    ) -> Result<(), ValidationError> {
        for group in &msg_def.groups {
            self.check_group(raw, group)?;
        }
        Ok(())
    }

    fn check_group(&self, raw: &RawMessage<'_>, group: &GroupDef) -> Result<(), ValidationError> {
        let body: Vec<&FieldRef<'_>> = raw.body_fields().collect();
        let Some(count_pos) = body.iter().position(|f| f.tag == group.count_tag) else {
            return Ok(());
        };

        let declared: u64 = body[count_pos].as_u64().map_err(|_| {
            ValidationError::new(
                SessionRejectReason::IncorrectDataFormat,
                Some(group.count_tag),
                format!("Incorrect data format for tag {}", group.count_tag),
            )
        })?;

        // Blocks are the member fields that directly follow the count field,
        // split on the delimiter tag.
        let mut blocks: Vec<Vec<u32>> = Vec::new();
        for field in &body[count_pos + 1..] {
            if !group.is_member(field.tag) {
                break;
            }
            if field.tag == group.delimiter_tag {
                blocks.push(vec![field.tag]);
            } else {
                match blocks.last_mut() {
                    Some(block) => block.push(field.tag),
                    None => {
                        return Err(ValidationError::new(
                            SessionRejectReason::RepeatingGroupFieldsOutOfOrder,
                            Some(field.tag),
                            format!(
                                "Repeating group fields out of order: expected delimiter {} first",
                                group.delimiter_tag
                            ),
                        ));
                    }
                }
            }
        }

        if blocks.len() as u64 != declared {
            return Err(ValidationError::new(
                SessionRejectReason::IncorrectNumInGroupCount,
                Some(group.count_tag),
                format!(
                    "Incorrect NumInGroup count for tag {}: declared {declared}, found {}",
                    group.count_tag,
                    blocks.len()
                ),
            ));
        }

        for block in &blocks {
            if let Some(missing) = group
                .fields
                .iter()
                .find(|f| f.required && !block.contains(&f.tag))
            {
                return Err(ValidationError::new(
                    SessionRejectReason::RequiredTagMissing,
                    Some(missing.tag),
                    format!("Required tag missing in repeating group: {}", missing.tag),
                ));
            }
        }

        Ok(())
    }
}

fn in_any_group(msg_def: &MessageDef, tag: u32) -> bool {
    msg_def
        .groups
        .iter()
        .any(|g| g.count_tag == tag || g.is_member(tag))
}

fn check_value_format(field: &FieldRef<'_>, field_type: FieldType) -> Result<(), ValidationError> {
    let bad_format = |tag: u32| {
        ValidationError::new(
            SessionRejectReason::IncorrectDataFormat,
            Some(tag),
            format!("Incorrect data format for tag {tag}"),
        )
    };

    let ok = if field_type.is_integer() {
        codecs::parse_int(field.tag, field.value).is_ok()
    } else if field_type.is_decimal() {
        codecs::parse_float(field.tag, field.value).is_ok()
    } else {
        match field_type {
            FieldType::Boolean => codecs::parse_bool(field.tag, field.value).is_ok(),
            FieldType::Char => field.value.len() == 1 && field.value[0].is_ascii(),
            FieldType::UtcTimestamp => {
                codecs::parse_utc_timestamp(field.tag, field.value).is_ok()
            }
            FieldType::DayOfWeek => codecs::parse_day_of_week(field.tag, field.value).is_ok(),
            FieldType::UtcDateOnly | FieldType::LocalMktDate => {
                field.value.len() == 8 && field.value.iter().all(u8::is_ascii_digit)
            }
            FieldType::MonthYear => {
                field.value.len() == 6 && field.value.iter().all(u8::is_ascii_digit)
            }
            _ => true,
        }
    };

    if ok { Ok(()) } else { Err(bad_format(field.tag)) }
}
