/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback surface.
//!
//! The embedding application observes session lifecycle events and message
//! traffic through this trait. Callbacks signal protocol intent through
//! returned values rather than exceptions: an inbound handler returns a
//! [`Rejection`], an outbound hook returns [`DoNotSend`]. The engine calls
//! into one session from at most one task at a time.

use anvilfix_core::error::SessionRejectReason;
use anvilfix_core::message::{Message, RawMessage};
use anvilfix_core::session_id::SessionId;
use async_trait::async_trait;

/// Returned by `to_app` to suppress an outbound send.
///
/// The message is dropped and no sequence number is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoNotSend;

/// Protocol intent returned by inbound callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A required field is absent; emits Reject with RequiredTagMissing.
    FieldNotFound {
        /// The missing tag.
        tag: u32,
    },
    /// A field value has the wrong format; emits Reject with
    /// IncorrectDataFormat.
    IncorrectDataFormat {
        /// The offending tag.
        tag: u32,
    },
    /// A field carries an out-of-range value; emits Reject with
    /// ValueIsIncorrect.
    IncorrectTagValue {
        /// The offending tag.
        tag: u32,
    },
    /// The application does not support this message type; emits a
    /// BusinessMessageReject (or plain Reject before FIX 4.2).
    UnsupportedMessageType,
    /// Refuse the logon: the session sends Logout and disconnects without
    /// ever reaching the logged-on state.
    RejectLogon {
        /// Reason text carried on the Logout.
        reason: String,
    },
}

impl Rejection {
    /// Maps the rejection to its session reject reason, where one applies.
    #[must_use]
    pub fn reject_reason(&self) -> Option<(SessionRejectReason, Option<u32>)> {
        match self {
            Self::FieldNotFound { tag } => {
                Some((SessionRejectReason::RequiredTagMissing, Some(*tag)))
            }
            Self::IncorrectDataFormat { tag } => {
                Some((SessionRejectReason::IncorrectDataFormat, Some(*tag)))
            }
            Self::IncorrectTagValue { tag } => {
                Some((SessionRejectReason::ValueIsIncorrect, Some(*tag)))
            }
            Self::UnsupportedMessageType | Self::RejectLogon { .. } => None,
        }
    }
}

/// Callback interface between the engine and the embedding application.
#[async_trait]
pub trait Application: Send + Sync {
    /// Called once when the session is created.
    async fn on_create(&self, session_id: &SessionId);

    /// Called when the handshake completes.
    async fn on_logon(&self, session_id: &SessionId);

    /// Called when the session leaves the logged-on state.
    async fn on_logout(&self, session_id: &SessionId);

    /// Called before an administrative message is sent; the message may be
    /// modified in place.
    async fn to_admin(&self, message: &mut Message, session_id: &SessionId);

    /// Called for every inbound administrative message.
    ///
    /// # Errors
    /// Returning a [`Rejection`] makes the session reject the message; for
    /// a Logon, [`Rejection::RejectLogon`] refuses the handshake.
    async fn from_admin(
        &self,
        message: &RawMessage<'_>,
        session_id: &SessionId,
    ) -> Result<(), Rejection>;

    /// Called before an application message is sent; the message may be
    /// modified in place.
    ///
    /// # Errors
    /// Returning [`DoNotSend`] suppresses the send without consuming a
    /// sequence number.
    async fn to_app(&self, message: &mut Message, session_id: &SessionId)
    -> Result<(), DoNotSend>;

    /// Called for every inbound application message delivered in sequence.
    ///
    /// # Errors
    /// Returning a [`Rejection`] makes the session reject the message.
    async fn from_app(
        &self,
        message: &RawMessage<'_>,
        session_id: &SessionId,
    ) -> Result<(), Rejection>;
}

/// No-op application, useful for tests and admin-only sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullApplication;

#[async_trait]
impl Application for NullApplication {
    async fn on_create(&self, _session_id: &SessionId) {}

    async fn on_logon(&self, _session_id: &SessionId) {}

    async fn on_logout(&self, _session_id: &SessionId) {}

    async fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    async fn from_admin(
        &self,
        _message: &RawMessage<'_>,
        _session_id: &SessionId,
    ) -> Result<(), Rejection> {
        Ok(())
    }

    async fn to_app(
        &self,
        _message: &mut Message,
        _session_id: &SessionId,
    ) -> Result<(), DoNotSend> {
        Ok(())
    }

    async fn from_app(
        &self,
        _message: &RawMessage<'_>,
        _session_id: &SessionId,
    ) -> Result<(), Rejection> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::CompId;

    #[test]
    fn test_rejection_mapping() {
        assert_eq!(
            Rejection::FieldNotFound { tag: 55 }.reject_reason(),
            Some((SessionRejectReason::RequiredTagMissing, Some(55)))
        );
        assert_eq!(
            Rejection::IncorrectTagValue { tag: 54 }.reject_reason(),
            Some((SessionRejectReason::ValueIsIncorrect, Some(54)))
        );
        assert_eq!(Rejection::UnsupportedMessageType.reject_reason(), None);
    }

    #[tokio::test]
    async fn test_null_application() {
        let app = NullApplication;
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );

        app.on_create(&id).await;
        app.on_logon(&id).await;
        app.on_logout(&id).await;

        let mut msg = Message::new(anvilfix_core::MsgType::Heartbeat);
        app.to_admin(&mut msg, &id).await;
        assert!(app.to_app(&mut msg, &id).await.is_ok());
    }
}
