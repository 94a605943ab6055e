/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session construction from settings.
//!
//! The factory turns one validated settings section into a live session:
//! it resolves the time windows, the store, and the dictionary validators,
//! then hands the session to the engine registry.

use crate::settings::{Properties, keys};
use anvilfix_core::error::{ConfigError, FixError};
use anvilfix_core::session_id::SessionId;
use anvilfix_dictionary::{DictionaryCache, ValidationOptions, Validator, Version, session_dictionary};
use anvilfix_session::{Application, Session, SessionConfig, SessionRole, TimeRange};
use anvilfix_store::MessageStoreFactory;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds sessions from settings sections.
pub struct SessionFactory {
    application: Arc<dyn Application>,
    store_factory: Arc<dyn MessageStoreFactory>,
    dictionaries: Arc<DictionaryCache>,
}

impl SessionFactory {
    /// Creates a factory.
    ///
    /// # Arguments
    /// * `application` - Callback surface shared by all sessions
    /// * `store_factory` - Per-session store creation
    /// * `dictionaries` - The engine's dictionary cache
    #[must_use]
    pub fn new(
        application: Arc<dyn Application>,
        store_factory: Arc<dyn MessageStoreFactory>,
        dictionaries: Arc<DictionaryCache>,
    ) -> Self {
        Self {
            application,
            store_factory,
            dictionaries,
        }
    }

    /// Builds the session for one validated settings section.
    ///
    /// # Errors
    /// Returns `FixError` when a referenced dictionary cannot be loaded or
    /// the store cannot be opened.
    pub async fn create(
        &self,
        id: SessionId,
        props: &Properties,
    ) -> Result<Session, FixError> {
        let role = match props.require(keys::CONNECTION_TYPE)? {
            "initiator" => SessionRole::Initiator,
            _ => SessionRole::Acceptor,
        };

        let mut config = SessionConfig::new(role);
        if let Some(interval) = props.get_int(keys::HEART_BT_INT)? {
            config.heart_bt_int = interval.max(0) as u32;
        }
        config.session_time = self.time_range(
            props,
            keys::START_TIME,
            keys::END_TIME,
            keys::START_DAY,
            keys::END_DAY,
        )?;
        config.logon_time = self
            .time_range(
                props,
                keys::LOGON_TIME,
                keys::LOGOUT_TIME,
                keys::LOGON_DAY,
                keys::LOGOUT_DAY,
            )?
            .or(config.session_time);

        if let Some(v) = props.get_bool(keys::CHECK_COMP_ID)? {
            config.check_comp_id = v;
        }
        if let Some(v) = props.get_bool(keys::CHECK_LATENCY)? {
            config.check_latency = v;
        }
        if let Some(v) = props.get_int(keys::MAX_LATENCY)? {
            config.max_latency = Duration::from_secs(v.max(0) as u64);
        }
        if let Some(v) = props.get_int(keys::LOGON_TIMEOUT)? {
            config.logon_timeout = Duration::from_secs(v.max(0) as u64);
        }
        if let Some(v) = props.get_int(keys::LOGOUT_TIMEOUT)? {
            config.logout_timeout = Duration::from_secs(v.max(0) as u64);
        }
        if let Some(v) = props.get_bool(keys::RESET_ON_LOGON)? {
            config.reset_on_logon = v;
        }
        if let Some(v) = props.get_bool(keys::RESET_ON_LOGOUT)? {
            config.reset_on_logout = v;
        }
        if let Some(v) = props.get_bool(keys::RESET_ON_DISCONNECT)? {
            config.reset_on_disconnect = v;
        }
        if let Some(v) = props.get_bool(keys::REFRESH_ON_LOGON)? {
            config.refresh_on_logon = v;
        }
        if let Some(v) = props.get_bool(keys::PERSIST_MESSAGES)? {
            config.persist_messages = v;
        }
        if let Some(v) = props.get_bool(keys::SEND_REDUNDANT_RESENDREQUESTS)? {
            config.send_redundant_resend_requests = v;
        }
        if let Some(v) = props.get_bool(keys::MILLISECONDS_IN_TIMESTAMP)? {
            config.millis_in_timestamp = v;
        }
        if let Some(v) = props.get_bool(keys::VALIDATE_LENGTH_AND_CHECKSUM)? {
            config.validate_length_and_checksum = v;
        }
        if let Some(v) = props.get_bool(keys::USE_DATA_DICTIONARY)? {
            config.use_data_dictionary = v;
        }
        config.default_appl_ver_id =
            props.get(keys::DEFAULT_APPL_VER_ID).map(str::to_string);

        let options = ValidationOptions {
            check_fields_out_of_order: props
                .get_bool(keys::VALIDATE_FIELDS_OUT_OF_ORDER)?
                .unwrap_or(true),
            check_fields_have_values: props
                .get_bool(keys::VALIDATE_FIELDS_HAVE_VALUES)?
                .unwrap_or(true),
            check_user_defined_fields: props
                .get_bool(keys::VALIDATE_USER_DEFINED_FIELDS)?
                .unwrap_or(true),
        };
        let (validator, app_validator) = self.validators(&id, props, options)?;

        let store = self.store_factory.create(&id)?;

        info!(session = %id, ?role, "session created");
        let session = Session::new(
            id.clone(),
            config,
            store,
            Arc::clone(&self.application),
            validator,
            app_validator,
        );
        self.application.on_create(&id).await;
        Ok(session)
    }

    /// Resolves the transport and application validators for a session.
    fn validators(
        &self,
        id: &SessionId,
        props: &Properties,
        options: ValidationOptions,
    ) -> Result<(Validator, Option<Validator>), ConfigError> {
        let version =
            Version::from_begin_string(id.begin_string()).ok_or_else(|| {
                ConfigError::InvalidSetting {
                    key: keys::BEGIN_STRING.to_string(),
                    reason: format!("unsupported BeginString {}", id.begin_string()),
                }
            })?;

        let transport_key = if id.is_fixt() {
            keys::TRANSPORT_DATA_DICTIONARY
        } else {
            keys::DATA_DICTIONARY
        };
        let loaded_transport = match props.get(transport_key) {
            Some(path) => Some(self.dictionaries.load(Path::new(path))?),
            None => None,
        };
        let transport_dict = loaded_transport
            .clone()
            .unwrap_or_else(|| Arc::new(session_dictionary(version)));
        let validator = Validator::with_options(transport_dict, options);

        // The application slot validates only when a full dictionary is
        // available: the FIXT AppDataDictionary, or for classic FIX the
        // same loaded dictionary as the transport slot.
        let app_dict = if id.is_fixt() {
            match props.get(keys::APP_DATA_DICTIONARY) {
                Some(path) => Some(self.dictionaries.load(Path::new(path))?),
                None => None,
            }
        } else {
            loaded_transport
        };
        let app_validator = app_dict.map(|dict| Validator::with_options(dict, options));

        Ok((validator, app_validator))
    }

    fn time_range(
        &self,
        props: &Properties,
        start_key: &str,
        end_key: &str,
        start_day_key: &str,
        end_day_key: &str,
    ) -> Result<Option<TimeRange>, ConfigError> {
        let (Some(start), Some(end)) =
            (props.get_time(start_key)?, props.get_time(end_key)?)
        else {
            return Ok(None);
        };
        let use_local = props.get_bool(keys::USE_LOCAL_TIME)?.unwrap_or(false);

        let range = match (props.get_day(start_day_key)?, props.get_day(end_day_key)?) {
            (Some(start_day), Some(end_day)) => {
                TimeRange::weekly(start, start_day, end, end_day, use_local)
            }
            _ => TimeRange::daily(start, end, use_local),
        };
        Ok(Some(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SessionSettings;
    use anvilfix_session::NullApplication;
    use anvilfix_store::MemoryStoreFactory;

    fn factory() -> SessionFactory {
        SessionFactory::new(
            Arc::new(NullApplication),
            Arc::new(MemoryStoreFactory::new()),
            Arc::new(DictionaryCache::new()),
        )
    }

    const TEXT: &str = "\
[DEFAULT]
ConnectionType=initiator
HeartBtInt=15
SocketConnectHost=127.0.0.1
SocketConnectPort=9876
BeginString=FIX.4.2
StartTime=08:00:00
EndTime=18:00:00
ResetOnLogon=Y
MaxLatency=30

[SESSION]
SenderCompID=CLIENT
TargetCompID=SERVER
";

    #[tokio::test]
    async fn test_create_from_settings() {
        let settings = SessionSettings::parse(TEXT).unwrap();
        let (id, props) = &settings.sessions()[0];

        let session = factory().create(id.clone(), props).await.unwrap();
        let config = session.config();

        assert_eq!(config.role, SessionRole::Initiator);
        assert_eq!(config.heart_bt_int, 15);
        assert!(config.reset_on_logon);
        assert_eq!(config.max_latency, Duration::from_secs(30));
        assert!(config.session_time.is_some());
        // Logon window defaults to the session window.
        assert!(config.logon_time.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_begin_string() {
        let text = TEXT.replace("FIX.4.2", "FIX.9.9");
        let settings = SessionSettings::parse(&text).unwrap();
        let (id, props) = &settings.sessions()[0];

        let result = factory().create(id.clone(), props).await;
        assert!(result.is_err());
    }
}
