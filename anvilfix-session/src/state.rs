/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session state.
//!
//! Transitions are driven at runtime by wire events, timers, and driver
//! calls; the resend substate of an established session is tracked
//! separately as the presence of an outstanding resend range.

use std::fmt;

/// The connection-level state of a FIX session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport attached.
    #[default]
    Disconnected,
    /// Outbound Logon sent, awaiting the counterparty reply (initiator).
    LogonSent,
    /// Inbound Logon parsed, reply not yet sent (acceptor, transient).
    LogonReceived,
    /// Bidirectional application traffic allowed.
    LoggedOn,
    /// Outbound Logout sent, awaiting counterparty Logout or timeout.
    LogoutSent,
}

impl SessionState {
    /// Returns true if the handshake has completed and not yet torn down.
    #[must_use]
    pub const fn is_logged_on(self) -> bool {
        matches!(self, Self::LoggedOn | Self::LogoutSent)
    }

    /// Returns true if a transport is attached.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::LogonSent => "LogonSent",
            Self::LogonReceived => "LogonReceived",
            Self::LoggedOn => "LoggedOn",
            Self::LogoutSent => "LogoutSent",
        };
        write!(f, "{name}")
    }
}
