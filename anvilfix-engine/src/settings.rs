/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! INI-style session settings.
//!
//! The file holds one `[DEFAULT]` section followed by one or more
//! `[SESSION]` sections. `#` starts a comment; keys are case-insensitive
//! and both keys and values are trimmed. Session sections inherit every
//! default unless they override it. Validation happens at load time:
//! a bad file prevents the engine from starting.

use anvilfix_core::error::ConfigError;
use anvilfix_core::session_id::SessionId;
use anvilfix_core::types::CompId;
use anvilfix_tagvalue::fields::parse_day_of_week;
use chrono::NaiveTime;
use std::collections::HashMap;
use std::path::Path;

/// Recognized setting keys (matched case-insensitively).
pub mod keys {
    /// `initiator` or `acceptor`.
    pub const CONNECTION_TYPE: &str = "ConnectionType";
    /// FIX version string.
    pub const BEGIN_STRING: &str = "BeginString";
    /// Our CompID.
    pub const SENDER_COMP_ID: &str = "SenderCompID";
    /// Counterparty CompID.
    pub const TARGET_COMP_ID: &str = "TargetCompID";
    /// Disambiguates sessions sharing a CompID triple.
    pub const SESSION_QUALIFIER: &str = "SessionQualifier";
    /// Session window opening time, `HH:MM:SS`.
    pub const START_TIME: &str = "StartTime";
    /// Session window closing time, `HH:MM:SS`.
    pub const END_TIME: &str = "EndTime";
    /// Session window opening day.
    pub const START_DAY: &str = "StartDay";
    /// Session window closing day.
    pub const END_DAY: &str = "EndDay";
    /// Logon window opening time.
    pub const LOGON_TIME: &str = "LogonTime";
    /// Logon window closing time.
    pub const LOGOUT_TIME: &str = "LogoutTime";
    /// Logon window opening day.
    pub const LOGON_DAY: &str = "LogonDay";
    /// Logon window closing day.
    pub const LOGOUT_DAY: &str = "LogoutDay";
    /// Evaluate windows in local time.
    pub const USE_LOCAL_TIME: &str = "UseLocalTime";
    /// Heartbeat interval in seconds.
    pub const HEART_BT_INT: &str = "HeartBtInt";
    /// Acceptor listen port.
    pub const SOCKET_ACCEPT_PORT: &str = "SocketAcceptPort";
    /// Initiator dial host.
    pub const SOCKET_CONNECT_HOST: &str = "SocketConnectHost";
    /// Initiator dial port.
    pub const SOCKET_CONNECT_PORT: &str = "SocketConnectPort";
    /// TCP_NODELAY.
    pub const SOCKET_NO_DELAY: &str = "SocketNoDelay";
    /// Kernel send buffer size.
    pub const SOCKET_SEND_BUFFER_SIZE: &str = "SocketSendBufferSize";
    /// Kernel receive buffer size.
    pub const SOCKET_RECEIVE_BUFFER_SIZE: &str = "SocketReceiveBufferSize";
    /// SO_REUSEADDR.
    pub const SOCKET_REUSE_ADDRESS: &str = "SocketReuseAddress";
    /// File store directory.
    pub const FILE_STORE_PATH: &str = "FileStorePath";
    /// Dictionary path for classic FIX sessions.
    pub const DATA_DICTIONARY: &str = "DataDictionary";
    /// Session-layer dictionary path for FIXT sessions.
    pub const TRANSPORT_DATA_DICTIONARY: &str = "TransportDataDictionary";
    /// Application dictionary path for FIXT sessions.
    pub const APP_DATA_DICTIONARY: &str = "AppDataDictionary";
    /// Enable dictionary validation.
    pub const USE_DATA_DICTIONARY: &str = "UseDataDictionary";
    /// Default application version for FIXT sessions.
    pub const DEFAULT_APPL_VER_ID: &str = "DefaultApplVerID";
    /// Reset sequence numbers on logon.
    pub const RESET_ON_LOGON: &str = "ResetOnLogon";
    /// Reset sequence numbers on logout.
    pub const RESET_ON_LOGOUT: &str = "ResetOnLogout";
    /// Reset sequence numbers on disconnect.
    pub const RESET_ON_DISCONNECT: &str = "ResetOnDisconnect";
    /// Refresh store state on logon.
    pub const REFRESH_ON_LOGON: &str = "RefreshOnLogon";
    /// Persist outbound messages.
    pub const PERSIST_MESSAGES: &str = "PersistMessages";
    /// Verify inbound CompIDs.
    pub const CHECK_COMP_ID: &str = "CheckCompID";
    /// Verify SendingTime recency.
    pub const CHECK_LATENCY: &str = "CheckLatency";
    /// Maximum SendingTime divergence in seconds.
    pub const MAX_LATENCY: &str = "MaxLatency";
    /// Seconds to wait for a Logon reply.
    pub const LOGON_TIMEOUT: &str = "LogonTimeout";
    /// Seconds to wait for a Logout reply.
    pub const LOGOUT_TIMEOUT: &str = "LogoutTimeout";
    /// Enforce header/body/trailer field order.
    pub const VALIDATE_FIELDS_OUT_OF_ORDER: &str = "ValidateFieldsOutOfOrder";
    /// Reject empty field values.
    pub const VALIDATE_FIELDS_HAVE_VALUES: &str = "ValidateFieldsHaveValues";
    /// Reject undeclared user-defined tags.
    pub const VALIDATE_USER_DEFINED_FIELDS: &str = "ValidateUserDefinedFields";
    /// Verify BodyLength and CheckSum.
    pub const VALIDATE_LENGTH_AND_CHECKSUM: &str = "ValidateLengthAndChecksum";
    /// Emit SendingTime with milliseconds.
    pub const MILLISECONDS_IN_TIMESTAMP: &str = "MillisecondsInTimestamp";
    /// Re-issue resend requests for covered gaps.
    pub const SEND_REDUNDANT_RESENDREQUESTS: &str = "SendRedundantResendRequests";
    /// Seconds between initiator reconnect attempts.
    pub const RECONNECT_INTERVAL: &str = "ReconnectInterval";
}

/// One section's key/value pairs, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Creates an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value; the key is stored case-folded, both sides trimmed.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.trim().to_lowercase(), value.trim().to_string());
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_lowercase())
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Gets a value or fails with `ConfigError::MissingSetting`.
    ///
    /// # Errors
    /// Returns `ConfigError` when the key is absent.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingSetting {
            key: key.to_string(),
        })
    }

    /// Gets a value parsed as an integer.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidSetting` when present but unparseable.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.get(key)
            .map(|v| {
                v.parse().map_err(|_| ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("'{v}' is not an integer"),
                })
            })
            .transpose()
    }

    /// Gets a `Y`/`N` value.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidSetting` for anything but Y or N.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key)
            .map(|v| match v.to_uppercase().as_str() {
                "Y" => Ok(true),
                "N" => Ok(false),
                _ => Err(ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("'{v}' is not Y or N"),
                }),
            })
            .transpose()
    }

    /// Gets a `HH:MM:SS` time value.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidSetting` when present but malformed.
    pub fn get_time(&self, key: &str) -> Result<Option<NaiveTime>, ConfigError> {
        self.get(key)
            .map(|v| {
                NaiveTime::parse_from_str(v, "%H:%M:%S").map_err(|_| {
                    ConfigError::InvalidSetting {
                        key: key.to_string(),
                        reason: format!("'{v}' is not HH:MM:SS"),
                    }
                })
            })
            .transpose()
    }

    /// Gets a day-of-week value (`SU`..`SA`, 1..=7).
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidSetting` when present but unrecognized.
    pub fn get_day(&self, key: &str) -> Result<Option<i8>, ConfigError> {
        self.get(key)
            .map(|v| {
                parse_day_of_week(0, v.as_bytes()).map_err(|_| ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("'{v}' is not a day name"),
                })
            })
            .transpose()
    }

    /// Overlays `self` on top of the given defaults.
    #[must_use]
    pub fn with_defaults(&self, defaults: &Properties) -> Properties {
        let mut merged = defaults.clone();
        for (key, value) in &self.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Number of keys present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parsed and validated settings file.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    defaults: Properties,
    sessions: Vec<(SessionId, Properties)>,
}

impl SessionSettings {
    /// Reads and validates a settings file.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O failure or invalid content.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    /// Parses and validates settings text.
    ///
    /// # Errors
    /// Returns `ConfigError` for malformed lines, missing required keys,
    /// or inconsistent values.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut defaults = Properties::new();
        let mut session_sections: Vec<Properties> = Vec::new();
        let mut current_index: Option<usize> = None;
        let mut in_default = false;

        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_uppercase();
                match name.as_str() {
                    "DEFAULT" => {
                        in_default = true;
                        current_index = None;
                    }
                    "SESSION" => {
                        in_default = false;
                        session_sections.push(Properties::new());
                        current_index = Some(session_sections.len() - 1);
                    }
                    _ => {
                        return Err(ConfigError::MalformedLine {
                            line_no: index + 1,
                            line: raw_line.to_string(),
                        });
                    }
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line_no: index + 1,
                    line: raw_line.to_string(),
                });
            };
            if in_default {
                defaults.set(key, value);
            } else if let Some(i) = current_index {
                session_sections[i].set(key, value);
            } else {
                return Err(ConfigError::MalformedLine {
                    line_no: index + 1,
                    line: raw_line.to_string(),
                });
            }
        }

        if session_sections.is_empty() {
            return Err(ConfigError::NoSessionsDefined(String::new()));
        }

        let mut sessions = Vec::with_capacity(session_sections.len());
        for section in &session_sections {
            let merged = section.with_defaults(&defaults);
            let id = session_id_from(&merged)?;
            validate(&id, &merged)?;
            sessions.push((id, merged));
        }

        Ok(Self { defaults, sessions })
    }

    /// Returns the `[DEFAULT]` section.
    #[must_use]
    pub fn defaults(&self) -> &Properties {
        &self.defaults
    }

    /// Returns every session with its merged properties.
    #[must_use]
    pub fn sessions(&self) -> &[(SessionId, Properties)] {
        &self.sessions
    }

    /// Returns the merged properties for one session.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&Properties> {
        self.sessions
            .iter()
            .find(|(sid, _)| sid == id)
            .map(|(_, props)| props)
    }
}

fn session_id_from(props: &Properties) -> Result<SessionId, ConfigError> {
    let begin_string = props.require(keys::BEGIN_STRING)?;
    let sender = props.require(keys::SENDER_COMP_ID)?;
    let target = props.require(keys::TARGET_COMP_ID)?;

    let comp_id = |value: &str, key: &str| {
        CompId::new(value).ok_or_else(|| ConfigError::InvalidSetting {
            key: key.to_string(),
            reason: "CompID too long".to_string(),
        })
    };

    let mut id = SessionId::new(
        begin_string,
        comp_id(sender, keys::SENDER_COMP_ID)?,
        comp_id(target, keys::TARGET_COMP_ID)?,
    );
    if let Some(qualifier) = props.get(keys::SESSION_QUALIFIER) {
        id = id.with_qualifier(qualifier);
    }
    Ok(id)
}

fn validate(id: &SessionId, props: &Properties) -> Result<(), ConfigError> {
    let connection_type = props.require(keys::CONNECTION_TYPE)?;
    let is_initiator = match connection_type {
        "initiator" => true,
        "acceptor" => false,
        other => {
            return Err(ConfigError::InvalidSetting {
                key: keys::CONNECTION_TYPE.to_string(),
                reason: format!("'{other}' is not initiator or acceptor"),
            });
        }
    };

    if !is_initiator && props.has(keys::SESSION_QUALIFIER) {
        return Err(ConfigError::InvalidSetting {
            key: keys::SESSION_QUALIFIER.to_string(),
            reason: "SessionQualifier cannot be used with acceptor".to_string(),
        });
    }

    let start_day = props.get_day(keys::START_DAY)?;
    let end_day = props.get_day(keys::END_DAY)?;
    if start_day.is_some() != end_day.is_some() {
        let (key, reason) = if start_day.is_some() {
            (keys::START_DAY, "StartDay used without EndDay")
        } else {
            (keys::END_DAY, "EndDay used without StartDay")
        };
        return Err(ConfigError::InvalidSetting {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }

    if is_initiator {
        let heart_bt_int = props
            .get_int(keys::HEART_BT_INT)?
            .ok_or_else(|| ConfigError::MissingSetting {
                key: keys::HEART_BT_INT.to_string(),
            })?;
        if heart_bt_int <= 0 {
            return Err(ConfigError::InvalidSetting {
                key: keys::HEART_BT_INT.to_string(),
                reason: "Heartbeat must be greater than zero".to_string(),
            });
        }
        props.require(keys::SOCKET_CONNECT_HOST)?;
        props.require(keys::SOCKET_CONNECT_PORT)?;
    } else {
        props.require(keys::SOCKET_ACCEPT_PORT)?;
    }

    // The logon window must sit inside the session window.
    let start = props.get_time(keys::START_TIME)?;
    let end = props.get_time(keys::END_TIME)?;
    if let (Some(start), Some(end)) = (start, end) {
        for key in [keys::LOGON_TIME, keys::LOGOUT_TIME] {
            if let Some(t) = props.get_time(key)?
                && !time_within(start, end, t)
            {
                return Err(ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: "must be between StartTime and EndTime".to_string(),
                });
            }
        }
    }

    if id.is_fixt() && !props.has(keys::DEFAULT_APPL_VER_ID) {
        return Err(ConfigError::MissingSetting {
            key: keys::DEFAULT_APPL_VER_ID.to_string(),
        });
    }

    Ok(())
}

/// Membership test for a possibly midnight-wrapping `[start, end]` span.
fn time_within(start: NaiveTime, end: NaiveTime, t: NaiveTime) -> bool {
    if start <= end {
        t >= start && t <= end
    } else {
        t >= start || t <= end
    }
}
