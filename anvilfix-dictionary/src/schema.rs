/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Schema definitions for FIX data dictionaries.
//!
//! This module defines the structures that describe a FIX version:
//! - [`FieldDef`]: field definitions with tag, name, type, and enum values
//! - [`MessageDef`]: message definitions with required/optional fields
//! - [`GroupDef`]: repeating group definitions
//! - [`Dictionary`]: the complete per-version dictionary

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// FIX protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// FIX 4.0
    Fix40,
    /// FIX 4.1
    Fix41,
    /// FIX 4.2
    Fix42,
    /// FIX 4.3
    Fix43,
    /// FIX 4.4
    Fix44,
    /// FIX 5.0
    Fix50,
    /// FIX 5.0 SP1
    Fix50Sp1,
    /// FIX 5.0 SP2
    Fix50Sp2,
    /// FIXT 1.1 (transport layer for FIX 5.0+)
    Fixt11,
}

impl Version {
    /// Returns the BeginString value for this version.
    #[must_use]
    pub const fn begin_string(&self) -> &'static str {
        match self {
            Self::Fix40 => "FIX.4.0",
            Self::Fix41 => "FIX.4.1",
            Self::Fix42 => "FIX.4.2",
            Self::Fix43 => "FIX.4.3",
            Self::Fix44 => "FIX.4.4",
            Self::Fix50 | Self::Fix50Sp1 | Self::Fix50Sp2 | Self::Fixt11 => "FIXT.1.1",
        }
    }

    /// Resolves a classic BeginString or FIXT transport string.
    #[must_use]
    pub fn from_begin_string(s: &str) -> Option<Self> {
        match s {
            "FIX.4.0" => Some(Self::Fix40),
            "FIX.4.1" => Some(Self::Fix41),
            "FIX.4.2" => Some(Self::Fix42),
            "FIX.4.3" => Some(Self::Fix43),
            "FIX.4.4" => Some(Self::Fix44),
            "FIXT.1.1" => Some(Self::Fixt11),
            _ => None,
        }
    }

    /// Resolves an ApplVerID (tag 1128) wire value.
    #[must_use]
    pub fn from_appl_ver_id(s: &str) -> Option<Self> {
        match s {
            "2" => Some(Self::Fix40),
            "3" => Some(Self::Fix41),
            "4" => Some(Self::Fix42),
            "5" => Some(Self::Fix43),
            "6" => Some(Self::Fix44),
            "7" => Some(Self::Fix50),
            "8" => Some(Self::Fix50Sp1),
            "9" => Some(Self::Fix50Sp2),
            _ => None,
        }
    }

    /// Returns the ApplVerID wire value for this version, if it has one.
    #[must_use]
    pub const fn appl_ver_id(&self) -> Option<&'static str> {
        match self {
            Self::Fix40 => Some("2"),
            Self::Fix41 => Some("3"),
            Self::Fix42 => Some("4"),
            Self::Fix43 => Some("5"),
            Self::Fix44 => Some("6"),
            Self::Fix50 => Some("7"),
            Self::Fix50Sp1 => Some("8"),
            Self::Fix50Sp2 => Some("9"),
            Self::Fixt11 => None,
        }
    }

    /// Returns true if this version uses FIXT transport.
    #[must_use]
    pub const fn uses_fixt(&self) -> bool {
        matches!(
            self,
            Self::Fix50 | Self::Fix50Sp1 | Self::Fix50Sp2 | Self::Fixt11
        )
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.begin_string())
    }
}

/// FIX field data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FieldType {
    /// Integer value.
    Int,
    /// Length field (for data fields).
    Length,
    /// Sequence number.
    SeqNum,
    /// Number of entries in a repeating group.
    NumInGroup,
    /// Day of month (1-31).
    DayOfMonth,
    /// Floating point number.
    Float,
    /// Quantity.
    Qty,
    /// Price.
    Price,
    /// Price offset.
    PriceOffset,
    /// Amount (price * quantity).
    Amt,
    /// Percentage.
    Percentage,
    /// Single character.
    Char,
    /// Boolean (Y/N).
    Boolean,
    /// String.
    #[default]
    String,
    /// Multiple string value (space-separated).
    MultipleStringValue,
    /// Country code (ISO 3166).
    Country,
    /// Currency code (ISO 4217).
    Currency,
    /// Exchange code (ISO 10383 MIC).
    Exchange,
    /// Month-year (YYYYMM).
    MonthYear,
    /// UTC timestamp.
    UtcTimestamp,
    /// UTC time only.
    UtcTimeOnly,
    /// UTC date only.
    UtcDateOnly,
    /// Local market date.
    LocalMktDate,
    /// Day of week (SU..SA).
    DayOfWeek,
    /// Raw data (binary, length-prefixed by a Length field).
    Data,
}

impl FieldType {
    /// Returns true if this type carries an integer grammar.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::Length | Self::SeqNum | Self::NumInGroup | Self::DayOfMonth
        )
    }

    /// Returns true if this type carries a decimal grammar.
    #[must_use]
    pub const fn is_decimal(&self) -> bool {
        matches!(
            self,
            Self::Float | Self::Qty | Self::Price | Self::PriceOffset | Self::Amt | Self::Percentage
        )
    }
}

impl std::str::FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_uppercase().as_str() {
            "INT" => Self::Int,
            "LENGTH" => Self::Length,
            "SEQNUM" => Self::SeqNum,
            "NUMINGROUP" => Self::NumInGroup,
            "DAYOFMONTH" => Self::DayOfMonth,
            "FLOAT" => Self::Float,
            "QTY" | "QUANTITY" => Self::Qty,
            "PRICE" => Self::Price,
            "PRICEOFFSET" => Self::PriceOffset,
            "AMT" | "AMOUNT" => Self::Amt,
            "PERCENTAGE" => Self::Percentage,
            "CHAR" => Self::Char,
            "BOOLEAN" => Self::Boolean,
            "MULTIPLESTRINGVALUE" => Self::MultipleStringValue,
            "COUNTRY" => Self::Country,
            "CURRENCY" => Self::Currency,
            "EXCHANGE" => Self::Exchange,
            "MONTHYEAR" => Self::MonthYear,
            "UTCTIMESTAMP" => Self::UtcTimestamp,
            "UTCTIMEONLY" => Self::UtcTimeOnly,
            "UTCDATEONLY" => Self::UtcDateOnly,
            "LOCALMKTDATE" => Self::LocalMktDate,
            "DAYOFWEEK" => Self::DayOfWeek,
            "DATA" => Self::Data,
            _ => Self::String,
        })
    }
}

/// Definition of a FIX field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field tag number.
    pub tag: u32,
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Valid values for enumerated fields (wire value -> description).
    #[serde(default)]
    pub values: Option<HashMap<String, String>>,
}

impl FieldDef {
    /// Creates a new field definition.
    #[must_use]
    pub fn new(tag: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            tag,
            name: name.into(),
            field_type,
            values: None,
        }
    }

    /// Adds valid values for an enumerated field.
    #[must_use]
    pub fn with_values<const N: usize>(mut self, values: [(&str, &str); N]) -> Self {
        self.values = Some(
            values
                .iter()
                .map(|(v, d)| ((*v).to_string(), (*d).to_string()))
                .collect(),
        );
        self
    }

    /// Returns true if the wire value is admissible for this field.
    #[must_use]
    pub fn accepts_value(&self, value: &str) -> bool {
        match &self.values {
            Some(values) => values.contains_key(value),
            None => true,
        }
    }
}

/// Reference to a field within a message, with its required flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgField {
    /// Field tag number.
    pub tag: u32,
    /// Whether the field is required.
    pub required: bool,
}

impl MsgField {
    /// Creates a required member.
    #[must_use]
    pub const fn required(tag: u32) -> Self {
        Self {
            tag,
            required: true,
        }
    }

    /// Creates an optional member.
    #[must_use]
    pub const fn optional(tag: u32) -> Self {
        Self {
            tag,
            required: false,
        }
    }
}

/// Definition of a repeating group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDef {
    /// Tag of the count field (NumInGroup).
    pub count_tag: u32,
    /// Tag of the first field in each block (the delimiter).
    pub delimiter_tag: u32,
    /// Members of each block, in dictionary order; the delimiter is first.
    pub fields: Vec<MsgField>,
    /// Nested groups within this group.
    #[serde(default)]
    pub groups: Vec<GroupDef>,
}

impl GroupDef {
    /// Returns true if the tag is a member of this group's blocks,
    /// including nested group members.
    #[must_use]
    pub fn is_member(&self, tag: u32) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
            || self
                .groups
                .iter()
                .any(|g| g.count_tag == tag || g.is_member(tag))
    }
}

/// Message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageCategory {
    /// Administrative message (session level).
    Admin,
    /// Application message.
    App,
}

/// Definition of a FIX message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDef {
    /// Message type value (tag 35).
    pub msg_type: String,
    /// Message name.
    pub name: String,
    /// Message category.
    pub category: MessageCategory,
    /// Body fields in dictionary order.
    pub fields: Vec<MsgField>,
    /// Repeating groups in this message.
    #[serde(default)]
    pub groups: Vec<GroupDef>,
}

impl MessageDef {
    /// Returns true if the tag is declared in this message's body,
    /// either directly or inside one of its groups.
    #[must_use]
    pub fn declares(&self, tag: u32) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
            || self
                .groups
                .iter()
                .any(|g| g.count_tag == tag || g.is_member(tag))
    }
}

/// Complete FIX dictionary for a specific version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionary {
    /// FIX version.
    pub version: Version,
    /// Field definitions indexed by tag.
    pub fields: HashMap<u32, FieldDef>,
    /// Message definitions indexed by msg_type.
    pub messages: HashMap<String, MessageDef>,
    /// Standard header members.
    pub header: Vec<MsgField>,
    /// Standard trailer members.
    pub trailer: Vec<MsgField>,
}

impl Dictionary {
    /// Creates a new empty dictionary for the specified version.
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            fields: HashMap::new(),
            messages: HashMap::new(),
            header: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Adds a field definition.
    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.insert(field.tag, field);
    }

    /// Adds a message definition.
    pub fn add_message(&mut self, message: MessageDef) {
        self.messages.insert(message.msg_type.clone(), message);
    }

    /// Gets a field definition by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&FieldDef> {
        self.fields.get(&tag)
    }

    /// Gets a message definition by MsgType value.
    #[must_use]
    pub fn get_message(&self, msg_type: &str) -> Option<&MessageDef> {
        self.messages.get(msg_type)
    }

    /// Returns true if the tag is declared anywhere in this dictionary.
    #[must_use]
    pub fn declares_tag(&self, tag: u32) -> bool {
        self.fields.contains_key(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_begin_string() {
        assert_eq!(Version::Fix42.begin_string(), "FIX.4.2");
        assert_eq!(Version::Fix44.begin_string(), "FIX.4.4");
        assert_eq!(Version::Fix50Sp2.begin_string(), "FIXT.1.1");
    }

    #[test]
    fn test_version_from_begin_string() {
        assert_eq!(Version::from_begin_string("FIX.4.4"), Some(Version::Fix44));
        assert_eq!(Version::from_begin_string("FIXT.1.1"), Some(Version::Fixt11));
        assert_eq!(Version::from_begin_string("FIX.9.9"), None);
    }

    #[test]
    fn test_version_appl_ver_id_roundtrip() {
        assert_eq!(Version::Fix50Sp2.appl_ver_id(), Some("9"));
        assert_eq!(Version::from_appl_ver_id("9"), Some(Version::Fix50Sp2));
        assert_eq!(Version::Fixt11.appl_ver_id(), None);
    }

    #[test]
    fn test_field_type_from_str() {
        assert_eq!("INT".parse::<FieldType>().unwrap(), FieldType::Int);
        assert_eq!(
            "UTCTIMESTAMP".parse::<FieldType>().unwrap(),
            FieldType::UtcTimestamp
        );
        assert_eq!("unknown".parse::<FieldType>().unwrap(), FieldType::String);
    }

    #[test]
    fn test_field_def_enum_values() {
        let field = FieldDef::new(98, "EncryptMethod", FieldType::Int)
            .with_values([("0", "None")]);
        assert!(field.accepts_value("0"));
        assert!(!field.accepts_value("1"));

        let open = FieldDef::new(58, "Text", FieldType::String);
        assert!(open.accepts_value("anything"));
    }

    #[test]
    fn test_message_def_declares() {
        let def = MessageDef {
            msg_type: "D".to_string(),
            name: "NewOrderSingle".to_string(),
            category: MessageCategory::App,
            fields: vec![MsgField::required(11), MsgField::optional(58)],
            groups: vec![GroupDef {
                count_tag: 453,
                delimiter_tag: 448,
                fields: vec![MsgField::required(448), MsgField::optional(447)],
                groups: vec![],
            }],
        };

        assert!(def.declares(11));
        assert!(def.declares(453));
        assert!(def.declares(448));
        assert!(def.declares(447));
        assert!(!def.declares(999));
    }
}
