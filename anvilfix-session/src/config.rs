/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-session configuration.
//!
//! Values originate from the engine's settings file; defaults follow the
//! QuickFIX conventions the counterparties in the wild expect.

use crate::time_range::TimeRange;
use std::time::Duration;

/// Connection role of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Listens and answers inbound Logons.
    Acceptor,
    /// Dials out and opens the handshake.
    Initiator,
}

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connection role.
    pub role: SessionRole,
    /// Heartbeat interval in seconds (HeartBtInt, tag 108).
    pub heart_bt_int: u32,
    /// Session activity window; outside it the session logs out.
    pub session_time: Option<TimeRange>,
    /// Logon window; logons are only attempted/accepted inside it.
    pub logon_time: Option<TimeRange>,
    /// Verify inbound CompIDs against the session identity.
    pub check_comp_id: bool,
    /// Verify SendingTime recency.
    pub check_latency: bool,
    /// Maximum tolerated |now - SendingTime|.
    pub max_latency: Duration,
    /// How long an initiator waits for the Logon reply.
    pub logon_timeout: Duration,
    /// How long to wait for the counterparty Logout.
    pub logout_timeout: Duration,
    /// Reset sequence numbers when a logon is initiated or accepted.
    pub reset_on_logon: bool,
    /// Reset sequence numbers after a graceful logout.
    pub reset_on_logout: bool,
    /// Reset sequence numbers when the transport drops.
    pub reset_on_disconnect: bool,
    /// Reload store state from disk before logging on.
    pub refresh_on_logon: bool,
    /// Persist outbound application messages for resend.
    pub persist_messages: bool,
    /// Re-issue resend requests even when the gap is already covered.
    pub send_redundant_resend_requests: bool,
    /// Emit SendingTime with milliseconds.
    pub millis_in_timestamp: bool,
    /// Verify BodyLength and CheckSum on inbound messages.
    pub validate_length_and_checksum: bool,
    /// Run dictionary validation on inbound messages.
    pub use_data_dictionary: bool,
    /// DefaultApplVerID for FIXT sessions (wire code or BeginString form).
    pub default_appl_ver_id: Option<String>,
}

impl SessionConfig {
    /// Creates a configuration with QuickFIX-style defaults.
    #[must_use]
    pub fn new(role: SessionRole) -> Self {
        Self {
            role,
            heart_bt_int: 30,
            session_time: None,
            logon_time: None,
            check_comp_id: true,
            check_latency: true,
            max_latency: Duration::from_secs(120),
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(2),
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            refresh_on_logon: false,
            persist_messages: true,
            send_redundant_resend_requests: false,
            millis_in_timestamp: true,
            validate_length_and_checksum: true,
            use_data_dictionary: true,
            default_appl_ver_id: None,
        }
    }

    /// Sets the heartbeat interval in seconds.
    #[must_use]
    pub const fn with_heart_bt_int(mut self, seconds: u32) -> Self {
        self.heart_bt_int = seconds;
        self
    }

    /// Sets the session activity window.
    #[must_use]
    pub fn with_session_time(mut self, window: TimeRange) -> Self {
        self.session_time = Some(window);
        self
    }

    /// Sets the logon window.
    #[must_use]
    pub fn with_logon_time(mut self, window: TimeRange) -> Self {
        self.logon_time = Some(window);
        self
    }

    /// Sets whether sequence numbers reset on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the maximum tolerated SendingTime latency.
    #[must_use]
    pub const fn with_max_latency(mut self, latency: Duration) -> Self {
        self.max_latency = latency;
        self
    }

    /// Returns the heartbeat interval as a duration.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heart_bt_int as u64)
    }

    /// Returns true if the given message type is exempt from persistence.
    ///
    /// Administrative messages are never stored; resend requests for their
    /// sequence numbers are answered with gap fills.
    #[must_use]
    pub fn is_persistable(&self, msg_type: &anvilfix_core::MsgType) -> bool {
        self.persist_messages && msg_type.is_app()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::MsgType;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(SessionRole::Initiator);
        assert_eq!(config.heart_bt_int, 30);
        assert!(config.check_comp_id);
        assert!(config.check_latency);
        assert!(config.persist_messages);
        assert!(config.validate_length_and_checksum);
        assert!(!config.reset_on_logon);
        assert_eq!(config.max_latency, Duration::from_secs(120));
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::new(SessionRole::Acceptor)
            .with_heart_bt_int(5)
            .with_reset_on_logon(true)
            .with_max_latency(Duration::from_secs(10));

        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert!(config.reset_on_logon);
        assert_eq!(config.max_latency, Duration::from_secs(10));
    }

    #[test]
    fn test_is_persistable() {
        let config = SessionConfig::new(SessionRole::Initiator);
        assert!(config.is_persistable(&MsgType::Application("D".to_string())));
        assert!(!config.is_persistable(&MsgType::Logon));
        assert!(!config.is_persistable(&MsgType::Heartbeat));
        assert!(!config.is_persistable(&MsgType::SequenceReset));
    }
}
