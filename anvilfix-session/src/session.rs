/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The FIX session state machine.
//!
//! A [`Session`] sits between a connection driver and the embedding
//! application. The driver feeds it framed inbound messages, a one-second
//! timer tick, and transport lifecycle events; the session answers by
//! writing serialized messages through its [`Responder`] and invoking the
//! application callbacks. One driver task owns a session at a time; the
//! engine enforces that with a per-session lock.
//!
//! Inbound processing order: framing integrity, BeginString, CompIDs,
//! SendingTime latency, sequence number, dictionary validation, then
//! administrative dispatch or application delivery.

use crate::application::{Application, Rejection};
use crate::config::{SessionConfig, SessionRole};
use crate::heartbeat::HeartbeatMonitor;
use crate::resend::ResendRange;
use crate::responder::Responder;
use crate::sequence::{SequenceCheck, SequenceNumbers};
use crate::state::SessionState;
use anvilfix_core::error::{FixError, SessionError, SessionRejectReason};
use anvilfix_core::message::{Message, MsgType, RawMessage};
use anvilfix_core::session_id::SessionId;
use anvilfix_core::tags;
use anvilfix_core::types::Timestamp;
use anvilfix_dictionary::Validator;
use anvilfix_store::MessageStore;
use anvilfix_tagvalue::{Decoder, encode_message, fields as codecs};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// TestReqID used on outbound TestRequests.
const TEST_REQ_ID: &str = "TEST";

/// Message types never persisted to the store; resends cover their
/// sequence numbers with gap fills.
fn is_admin_type(msg_type: &MsgType) -> bool {
    msg_type.is_admin()
}

/// Whether the session's FIX version carries SessionRejectReason (373)
/// and the other FIX 4.2+ reject fields.
fn supports_reject_fields(begin_string: &str) -> bool {
    begin_string >= "FIX.4.2"
}

/// Outcome of one dispatch arm: whether the shared pipeline should still
/// advance the inbound sequence number.
enum Advance {
    Target,
    Handled,
}

/// The FIX session protocol state machine.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    state: SessionState,
    enabled: bool,
    store: Arc<dyn MessageStore>,
    seqs: SequenceNumbers,
    application: Arc<dyn Application>,
    validator: Validator,
    app_validator: Option<Validator>,
    heartbeat: HeartbeatMonitor,
    responder: Option<Box<dyn Responder>>,
    resend_range: Option<ResendRange>,
    /// Inbound frames received ahead of sequence, replayed once the gap
    /// closes.
    queue: BTreeMap<u64, Vec<u8>>,
    /// When the current state was entered (logon/logout timeouts).
    state_entered_at: Instant,
    /// Set when our own Logon carried ResetSeqNumFlag=Y, so the echoed
    /// flag on the reply does not reset a second time.
    sent_reset_logon: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("next_sender", &self.seqs.next_sender())
            .field("next_target", &self.seqs.next_target())
            .finish()
    }
}

impl Session {
    /// Creates a session.
    ///
    /// # Arguments
    /// * `id` - Immutable session identity
    /// * `config` - Per-session policy
    /// * `store` - Message store (opened by the factory)
    /// * `application` - Callback surface
    /// * `validator` - Transport-dictionary validator
    /// * `app_validator` - Application-dictionary validator (FIXT only)
    #[must_use]
    pub fn new(
        id: SessionId,
        config: SessionConfig,
        store: Arc<dyn MessageStore>,
        application: Arc<dyn Application>,
        validator: Validator,
        app_validator: Option<Validator>,
    ) -> Self {
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval());
        let seqs = SequenceNumbers::new(Arc::clone(&store));
        Self {
            id,
            config,
            state: SessionState::Disconnected,
            enabled: true,
            store,
            seqs,
            application,
            validator,
            app_validator,
            heartbeat,
            responder: None,
            resend_range: None,
            queue: BTreeMap::new(),
            state_entered_at: Instant::now(),
            sent_reset_logon: false,
        }
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true if the handshake has completed.
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        self.state.is_logged_on()
    }

    /// Returns true if the session may log on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the next outbound sequence number.
    #[must_use]
    pub fn next_sender_seq_num(&self) -> u64 {
        self.seqs.next_sender()
    }

    /// Returns the next expected inbound sequence number.
    #[must_use]
    pub fn next_target_seq_num(&self) -> u64 {
        self.seqs.next_target()
    }

    /// Returns the outstanding resend range, if any.
    #[must_use]
    pub fn resend_range(&self) -> Option<ResendRange> {
        self.resend_range
    }

    /// Enables the session for logon.
    pub fn logon(&mut self) {
        self.enabled = true;
    }

    /// Disables the session; a logged-on session logs out on the next tick.
    pub fn logout(&mut self) {
        self.enabled = false;
    }

    /// Attaches the outbound sink for the current transport.
    pub fn set_responder(&mut self, responder: Box<dyn Responder>) {
        self.responder = Some(responder);
    }

    /// Returns true if `now` falls inside the session window (or no window
    /// is configured).
    #[must_use]
    pub fn is_session_time(&self, now: chrono::DateTime<Utc>) -> bool {
        self.config
            .session_time
            .as_ref()
            .is_none_or(|w| w.is_in_range(now))
    }

    /// Returns true if `now` falls inside the logon window.
    #[must_use]
    pub fn is_logon_time(&self, now: chrono::DateTime<Utc>) -> bool {
        match &self.config.logon_time {
            Some(w) => w.is_in_range(now),
            None => self.is_session_time(now),
        }
    }

    /// Resets the session's persisted state: both sequence numbers to 1,
    /// empty store, fresh creation time.
    ///
    /// # Errors
    /// Returns `FixError` if the store cannot be truncated.
    pub async fn reset(&mut self) -> Result<(), FixError> {
        info!(session = %self.id, "resetting sequence numbers");
        self.store.reset().await?;
        Ok(())
    }

    /// Initiator entry point: the transport is up, open the handshake.
    ///
    /// # Errors
    /// Returns `FixError` on store or encoding failures.
    pub async fn initiate_logon(&mut self) -> Result<(), FixError> {
        if self.config.refresh_on_logon {
            self.store.refresh().await?;
        }
        if self.config.reset_on_logon {
            self.store.reset().await?;
        }

        let mut msg = Message::new(MsgType::Logon);
        msg.set_uint(tags::ENCRYPT_METHOD, 0);
        msg.set_uint(tags::HEART_BT_INT, u64::from(self.config.heart_bt_int));
        if self.config.reset_on_logon {
            msg.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
            self.sent_reset_logon = true;
        }
        if self.id.is_fixt()
            && let Some(ver) = self.default_appl_ver_id_code()
        {
            msg.set(tags::DEFAULT_APPL_VER_ID, &ver);
        }

        info!(session = %self.id, "initiating logon");
        if self.send_admin(msg).await? {
            self.set_state(SessionState::LogonSent);
        }
        Ok(())
    }

    /// Sends an application message on this session.
    ///
    /// # Errors
    /// Returns `FixError` on store or encoding failures.
    ///
    /// # Returns
    /// `false` if the application suppressed the send or the transport
    /// refused the bytes.
    pub async fn send(&mut self, mut msg: Message) -> Result<bool, FixError> {
        if msg.msg_type().is_app() {
            if self
                .application
                .to_app(&mut msg, &self.id)
                .await
                .is_err()
            {
                debug!(session = %self.id, "application suppressed outbound message");
                return Ok(false);
            }
            self.send_stamped(msg).await
        } else {
            self.application.to_admin(&mut msg, &self.id).await;
            self.send_stamped(msg).await
        }
    }

    /// Processes one framed inbound message, then any queued messages the
    /// advancing sequence number releases.
    ///
    /// # Errors
    /// Returns `FixError` on store failures; protocol violations are
    /// handled internally per the disconnection policy.
    pub async fn on_message(&mut self, data: &[u8]) -> Result<(), FixError> {
        let mut pending = Some(data.to_vec());
        while let Some(bytes) = pending.take() {
            self.process_frame(&bytes).await?;
            if self.state.is_connected() {
                let next = self.seqs.next_target();
                if let Some(queued) = self.queue.remove(&next) {
                    pending = Some(queued);
                }
            }
        }
        Ok(())
    }

    /// Driver notification that the transport dropped.
    pub async fn on_transport_disconnect(&mut self) {
        if self.state.is_connected() {
            warn!(session = %self.id, "transport disconnected");
            self.teardown().await;
        }
    }

    /// One-second timer tick: heartbeats, timeouts, session-time windows.
    ///
    /// # Errors
    /// Returns `FixError` on store failures.
    pub async fn on_timer_tick(&mut self) -> Result<(), FixError> {
        self.check_session_time().await?;

        if !self.enabled && self.state == SessionState::LoggedOn {
            self.initiate_logout("").await?;
            return Ok(());
        }

        match self.state {
            SessionState::LogonSent => {
                if self.state_entered_at.elapsed() > self.config.logon_timeout {
                    warn!(session = %self.id, "timed out waiting for logon response");
                    self.teardown().await;
                }
            }
            SessionState::LogoutSent => {
                if self.state_entered_at.elapsed() > self.config.logout_timeout {
                    warn!(session = %self.id, "timed out waiting for logout response");
                    self.teardown().await;
                }
            }
            SessionState::LoggedOn => {
                if self.heartbeat.timed_out() {
                    let err = SessionError::HeartbeatTimeout {
                        elapsed_ms: self.heartbeat.silence_millis(),
                    };
                    error!(session = %self.id, %err, "timed out waiting for heartbeat");
                    self.teardown().await;
                } else if self.heartbeat.test_request_due() {
                    let mut msg = Message::new(MsgType::TestRequest);
                    msg.set(tags::TEST_REQ_ID, TEST_REQ_ID);
                    self.send_admin(msg).await?;
                    self.heartbeat.on_test_request_sent(TEST_REQ_ID);
                } else if self.heartbeat.heartbeat_due() {
                    self.send_admin(Message::new(MsgType::Heartbeat)).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Inbound pipeline
    // ---------------------------------------------------------------------

    async fn process_frame(&mut self, data: &[u8]) -> Result<(), FixError> {
        let decoded = Decoder::new(data)
            .with_length_and_checksum_verification(self.config.validate_length_and_checksum)
            .decode();
        let raw = match decoded {
            Ok(raw) => raw,
            Err(err) => {
                warn!(session = %self.id, %err, "discarding garbled message");
                return Ok(());
            }
        };
        let msg_type = raw.msg_type().clone();

        let echoed_test_req = match msg_type {
            MsgType::Heartbeat => raw.get_field_str(tags::TEST_REQ_ID),
            _ => None,
        };
        self.heartbeat.on_received(echoed_test_req);

        // BeginString must match the session identity.
        if raw.begin_string() != self.id.begin_string() {
            warn!(
                session = %self.id,
                received = raw.begin_string(),
                "incorrect BeginString"
            );
            self.initiate_logout("Incorrect BeginString").await?;
            self.teardown().await;
            return Ok(());
        }

        // Handshake-position rules: the first message on a fresh transport
        // must be a Logon in both roles.
        match self.state {
            SessionState::LogonSent if msg_type != MsgType::Logon => {
                warn!(session = %self.id, %msg_type, "expected logon response, disconnecting");
                self.teardown().await;
                return Ok(());
            }
            SessionState::Disconnected | SessionState::LogonReceived
                if msg_type != MsgType::Logon =>
            {
                warn!(session = %self.id, %msg_type, "first message is not a logon, disconnecting");
                self.teardown().await;
                return Ok(());
            }
            _ => {}
        }

        if self.config.check_comp_id && !self.comp_ids_match(&raw) {
            let seq = raw.msg_seq_num().unwrap_or(0);
            let expected = format!(
                "{}->{}",
                self.id.target_comp_id(),
                self.id.sender_comp_id()
            );
            let received = format!(
                "{}->{}",
                raw.sender_comp_id().unwrap_or(""),
                raw.target_comp_id().unwrap_or("")
            );
            warn!(session = %self.id, expected, received, "CompID mismatch");
            self.send_reject(
                seq,
                SessionRejectReason::CompIdProblem,
                None,
                Some(msg_type.as_str()),
                SessionRejectReason::CompIdProblem.text(),
            )
            .await?;
            self.initiate_logout("CompID problem").await?;
            self.teardown().await;
            return Ok(());
        }

        if self.config.check_latency && !self.check_sending_time(&raw).await? {
            return Ok(());
        }

        // A Logon carrying ResetSeqNumFlag=Y (or an acceptor configured to
        // reset on logon) resets both counters before the sequence check.
        if msg_type == MsgType::Logon {
            let peer_requests_reset = raw
                .get_field(tags::RESET_SEQ_NUM_FLAG)
                .and_then(|f| f.as_bool().ok())
                .unwrap_or(false);
            if self.config.refresh_on_logon && self.config.role == SessionRole::Acceptor {
                self.store.refresh().await?;
            }
            if (peer_requests_reset && !self.sent_reset_logon)
                || (self.config.role == SessionRole::Acceptor && self.config.reset_on_logon)
            {
                info!(session = %self.id, "sequence numbers reset by logon");
                self.store.reset().await?;
            }
        }

        let Ok(seq) = raw.msg_seq_num() else {
            warn!(session = %self.id, "message without MsgSeqNum");
            self.initiate_logout("MsgSeqNum missing").await?;
            self.teardown().await;
            return Ok(());
        };

        // SequenceReset-Reset bypasses the sequence check entirely.
        let is_reset_mode = msg_type == MsgType::SequenceReset && !gap_fill_flag(&raw);
        if !is_reset_mode {
            match self.seqs.classify(seq) {
                SequenceCheck::InOrder => {}
                SequenceCheck::Gap { expected, received } => {
                    // A Logon ahead of sequence still completes the
                    // handshake; the recovery request follows the reply.
                    if msg_type == MsgType::Logon {
                        self.dispatch(&raw, seq).await?;
                    }
                    if self.state.is_connected() {
                        self.on_sequence_gap(data, &raw, expected, received).await?;
                    }
                    return Ok(());
                }
                SequenceCheck::TooLow { expected, received } => {
                    self.on_sequence_too_low(&raw, expected, received).await?;
                    return Ok(());
                }
            }

            if raw.poss_dup_flag()
                && msg_type != MsgType::SequenceReset
                && !self.verify_poss_dup(&raw, seq).await?
            {
                if self.state.is_connected() {
                    self.seqs.incr_target().await?;
                }
                return Ok(());
            }
        }

        // Structural validation; a rejected message still consumed its
        // sequence number. Application messages are only validated when an
        // application dictionary is configured.
        if self.config.use_data_dictionary
            && let Some(validator) = self.validator_for(&msg_type)
            && let Err(err) = validator.validate(&raw)
        {
            warn!(session = %self.id, %err, "message failed validation");
            self.send_reject(
                seq,
                err.reason,
                err.ref_tag,
                Some(msg_type.as_str()),
                &err.text,
            )
            .await?;
            self.seqs.incr_target().await?;
            return Ok(());
        }

        let advance = self.dispatch(&raw, seq).await?;
        if matches!(advance, Advance::Target) {
            self.seqs.incr_target().await?;
        }

        if let Some(range) = self.resend_range
            && range.is_satisfied_by(self.seqs.next_target())
        {
            info!(session = %self.id, %range, "resend range satisfied");
            self.resend_range = None;
        }

        Ok(())
    }

    async fn dispatch(&mut self, raw: &RawMessage<'_>, seq: u64) -> Result<Advance, FixError> {
        let msg_type = raw.msg_type().clone();

        // Application veto comes before any state transition.
        let callback = if msg_type.is_admin() {
            self.application.from_admin(raw, &self.id).await
        } else {
            self.application.from_app(raw, &self.id).await
        };
        if let Err(rejection) = callback {
            return self.on_callback_rejection(raw, seq, rejection).await;
        }

        match msg_type {
            MsgType::Logon => self.handle_logon(raw).await,
            MsgType::Heartbeat => Ok(Advance::Target),
            MsgType::TestRequest => {
                let mut reply = Message::new(MsgType::Heartbeat);
                if let Some(id) = raw.get_field_str(tags::TEST_REQ_ID) {
                    reply.set(tags::TEST_REQ_ID, id);
                }
                self.send_admin(reply).await?;
                Ok(Advance::Target)
            }
            MsgType::ResendRequest => {
                self.handle_resend_request(raw, seq).await?;
                Ok(Advance::Target)
            }
            MsgType::SequenceReset => self.handle_sequence_reset(raw, seq).await,
            MsgType::Reject => {
                warn!(
                    session = %self.id,
                    text = raw.get_field_str(tags::TEXT).unwrap_or(""),
                    "received session-level reject"
                );
                Ok(Advance::Target)
            }
            MsgType::Logout => self.handle_logout(raw).await,
            MsgType::Application(_) => Ok(Advance::Target),
        }
    }

    async fn on_callback_rejection(
        &mut self,
        raw: &RawMessage<'_>,
        seq: u64,
        rejection: Rejection,
    ) -> Result<Advance, FixError> {
        let msg_type = raw.msg_type().as_str().to_string();
        match rejection {
            Rejection::RejectLogon { reason } => {
                warn!(session = %self.id, reason, "application rejected logon");
                self.initiate_logout(&reason).await?;
                self.teardown().await;
                Ok(Advance::Handled)
            }
            Rejection::UnsupportedMessageType => {
                self.send_business_reject(seq, &msg_type, "Unsupported Message Type")
                    .await?;
                Ok(Advance::Target)
            }
            rejection => {
                let (reason, ref_tag) = rejection
                    .reject_reason()
                    .unwrap_or((SessionRejectReason::Other, None));
                self.send_reject(seq, reason, ref_tag, Some(&msg_type), reason.text())
                    .await?;
                Ok(Advance::Target)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Sequence anomalies
    // ---------------------------------------------------------------------

    async fn on_sequence_gap(
        &mut self,
        data: &[u8],
        raw: &RawMessage<'_>,
        expected: u64,
        received: u64,
    ) -> Result<(), FixError> {
        info!(
            session = %self.id,
            expected,
            received,
            msg_type = %raw.msg_type(),
            "sequence gap detected"
        );
        self.queue.insert(received, data.to_vec());

        let begin = expected;
        let end = received - 1;
        let covered = self
            .resend_range
            .is_some_and(|range| range.covers(begin, end));
        if covered && !self.config.send_redundant_resend_requests {
            debug!(session = %self.id, "gap already covered by outstanding resend request");
            return Ok(());
        }

        let mut msg = Message::new(MsgType::ResendRequest);
        msg.set_uint(tags::BEGIN_SEQ_NO, begin);
        msg.set_uint(tags::END_SEQ_NO, end);
        if self.send_admin(msg).await? {
            self.resend_range = Some(ResendRange::new(begin, end));
        }
        Ok(())
    }

    async fn on_sequence_too_low(
        &mut self,
        raw: &RawMessage<'_>,
        expected: u64,
        received: u64,
    ) -> Result<(), FixError> {
        if raw.poss_dup_flag() {
            if self.verify_poss_dup(raw, received).await? {
                debug!(
                    session = %self.id,
                    received,
                    "dropping already-processed possible duplicate"
                );
            }
            return Ok(());
        }

        let err = SessionError::SequenceTooLow { expected, received };
        error!(session = %self.id, %err, "fatal sequence error");
        self.initiate_logout(&err.to_string()).await?;
        self.teardown().await;
        Ok(())
    }

    /// Checks OrigSendingTime on a PossDup message.
    ///
    /// # Returns
    /// `true` when the duplicate is well-formed (caller drops or processes
    /// it); `false` when it was rejected here.
    async fn verify_poss_dup(
        &mut self,
        raw: &RawMessage<'_>,
        seq: u64,
    ) -> Result<bool, FixError> {
        let Some(orig) = raw.get_field(tags::ORIG_SENDING_TIME) else {
            if raw.msg_type().is_app() {
                self.send_reject(
                    seq,
                    SessionRejectReason::RequiredTagMissing,
                    Some(tags::ORIG_SENDING_TIME),
                    Some(raw.msg_type().as_str()),
                    "Required tag missing",
                )
                .await?;
                return Ok(false);
            }
            return Ok(true);
        };

        let orig_ts = codecs::parse_utc_timestamp(tags::ORIG_SENDING_TIME, orig.value);
        let sending_ts = raw
            .get_field(tags::SENDING_TIME)
            .map(|f| codecs::parse_utc_timestamp(tags::SENDING_TIME, f.value));
        if let (Ok(orig_ts), Some(Ok(sending_ts))) = (orig_ts, sending_ts)
            && orig_ts > sending_ts
        {
            self.send_reject(
                seq,
                SessionRejectReason::SendingTimeAccuracyProblem,
                Some(tags::ORIG_SENDING_TIME),
                Some(raw.msg_type().as_str()),
                SessionRejectReason::SendingTimeAccuracyProblem.text(),
            )
            .await?;
            self.initiate_logout("SendingTime accuracy problem").await?;
            self.teardown().await;
            return Ok(false);
        }
        Ok(true)
    }

    async fn check_sending_time(&mut self, raw: &RawMessage<'_>) -> Result<bool, FixError> {
        let Some(field) = raw.get_field(tags::SENDING_TIME) else {
            // Absence is caught by required-field validation.
            return Ok(true);
        };
        let Ok(sending_time) = codecs::parse_utc_timestamp(tags::SENDING_TIME, field.value)
        else {
            return Ok(true);
        };

        let latency = Timestamp::now().abs_diff_millis(sending_time);
        if latency <= self.config.max_latency.as_millis() as u64 {
            return Ok(true);
        }

        warn!(session = %self.id, latency_ms = latency, "SendingTime outside latency window");
        if raw.msg_type() == &MsgType::Logon {
            self.initiate_logout("SendingTime accuracy problem on logon")
                .await?;
        } else {
            let seq = raw.msg_seq_num().unwrap_or(0);
            self.send_reject(
                seq,
                SessionRejectReason::SendingTimeAccuracyProblem,
                Some(tags::SENDING_TIME),
                Some(raw.msg_type().as_str()),
                SessionRejectReason::SendingTimeAccuracyProblem.text(),
            )
            .await?;
        }
        self.teardown().await;
        Ok(false)
    }

    fn comp_ids_match(&self, raw: &RawMessage<'_>) -> bool {
        raw.sender_comp_id() == Some(self.id.target_comp_id().as_str())
            && raw.target_comp_id() == Some(self.id.sender_comp_id().as_str())
    }

    // ---------------------------------------------------------------------
    // Admin message handlers
    // ---------------------------------------------------------------------

    async fn handle_logon(&mut self, raw: &RawMessage<'_>) -> Result<Advance, FixError> {
        // A logon replayed through the recovery queue, or repeated by the
        // counterparty while established, changes nothing.
        if self.state == SessionState::LoggedOn {
            debug!(session = %self.id, "ignoring duplicate logon");
            return Ok(Advance::Target);
        }

        match self.config.role {
            SessionRole::Initiator => {
                if self.state != SessionState::LogonSent {
                    warn!(session = %self.id, "unexpected logon, disconnecting");
                    self.teardown().await;
                    return Ok(Advance::Handled);
                }
                if let Some(peer) = raw.get_field_str(tags::HEART_BT_INT)
                    && peer != self.config.heart_bt_int.to_string()
                {
                    warn!(
                        session = %self.id,
                        ours = self.config.heart_bt_int,
                        theirs = peer,
                        "counterparty HeartBtInt differs"
                    );
                }
                self.sent_reset_logon = false;
                self.set_state(SessionState::LoggedOn);
                info!(session = %self.id, "logon completed");
                self.application.on_logon(&self.id).await;
                Ok(Advance::Target)
            }
            SessionRole::Acceptor => {
                self.set_state(SessionState::LogonReceived);

                let now = Utc::now();
                if !self.enabled || !self.is_logon_time(now) {
                    warn!(session = %self.id, "logon refused: session disabled or out of window");
                    self.initiate_logout("Session is not active").await?;
                    self.teardown().await;
                    return Ok(Advance::Handled);
                }

                // Adopt the counterparty heartbeat interval.
                if let Ok(interval) = raw.get_field_as::<u32>(tags::HEART_BT_INT) {
                    self.config.heart_bt_int = interval;
                    self.heartbeat
                        .set_interval(std::time::Duration::from_secs(u64::from(interval)));
                }

                let peer_requests_reset = raw
                    .get_field(tags::RESET_SEQ_NUM_FLAG)
                    .and_then(|f| f.as_bool().ok())
                    .unwrap_or(false);

                let mut reply = Message::new(MsgType::Logon);
                reply.set_uint(tags::ENCRYPT_METHOD, 0);
                reply.set_uint(tags::HEART_BT_INT, u64::from(self.config.heart_bt_int));
                if peer_requests_reset {
                    reply.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
                }
                if self.id.is_fixt()
                    && let Some(ver) = self.default_appl_ver_id_code()
                {
                    reply.set(tags::DEFAULT_APPL_VER_ID, &ver);
                }
                if !self.send_admin(reply).await? {
                    return Ok(Advance::Handled);
                }

                self.set_state(SessionState::LoggedOn);
                info!(session = %self.id, "logon accepted");
                self.application.on_logon(&self.id).await;
                Ok(Advance::Target)
            }
        }
    }

    async fn handle_logout(&mut self, raw: &RawMessage<'_>) -> Result<Advance, FixError> {
        if self.state == SessionState::LogoutSent {
            info!(session = %self.id, "logout confirmed by counterparty");
        } else {
            info!(
                session = %self.id,
                text = raw.get_field_str(tags::TEXT).unwrap_or(""),
                "counterparty initiated logout"
            );
            self.send_admin(Message::new(MsgType::Logout)).await?;
        }

        self.seqs.incr_target().await?;
        if self.config.reset_on_logout {
            self.store.reset().await?;
        }
        self.teardown().await;
        Ok(Advance::Handled)
    }

    async fn handle_sequence_reset(
        &mut self,
        raw: &RawMessage<'_>,
        seq: u64,
    ) -> Result<Advance, FixError> {
        let Ok(new_seq) = raw.get_field_as::<u64>(tags::NEW_SEQ_NO) else {
            self.send_reject(
                seq,
                SessionRejectReason::RequiredTagMissing,
                Some(tags::NEW_SEQ_NO),
                Some("4"),
                "Required tag missing",
            )
            .await?;
            return Ok(Advance::Target);
        };
        let expected = self.seqs.next_target();

        if gap_fill_flag(raw) {
            if new_seq >= expected {
                info!(session = %self.id, new_seq, "gap fill");
                self.seqs.set_target(new_seq).await?;
            } else {
                self.send_reject(
                    seq,
                    SessionRejectReason::ValueIsIncorrect,
                    Some(tags::NEW_SEQ_NO),
                    Some("4"),
                    &format!("Attempt to lower sequence number, invalid value NewSeqNo={new_seq}"),
                )
                .await?;
                self.seqs.incr_target().await?;
            }
        } else {
            // Reset mode is honored regardless of its own sequence number.
            if new_seq > expected {
                info!(session = %self.id, new_seq, "sequence reset");
                self.seqs.set_target(new_seq).await?;
            } else if new_seq == expected {
                warn!(session = %self.id, new_seq, "sequence reset to current expected value");
            } else {
                self.send_reject(
                    seq,
                    SessionRejectReason::ValueIsIncorrect,
                    Some(tags::NEW_SEQ_NO),
                    Some("4"),
                    &format!("Attempt to lower sequence number, invalid value NewSeqNo={new_seq}"),
                )
                .await?;
            }
        }
        Ok(Advance::Handled)
    }

    async fn handle_resend_request(
        &mut self,
        raw: &RawMessage<'_>,
        seq: u64,
    ) -> Result<(), FixError> {
        let begin = match raw.get_field_as::<u64>(tags::BEGIN_SEQ_NO) {
            Ok(v) => v,
            Err(_) => {
                self.send_reject(
                    seq,
                    SessionRejectReason::RequiredTagMissing,
                    Some(tags::BEGIN_SEQ_NO),
                    Some("2"),
                    "Required tag missing",
                )
                .await?;
                return Ok(());
            }
        };
        let end_requested = raw.get_field_as::<u64>(tags::END_SEQ_NO).unwrap_or(0);

        let last_sent = self.seqs.next_sender().saturating_sub(1);
        let end = if end_requested == 0 || end_requested > last_sent {
            last_sent
        } else {
            end_requested
        };
        info!(
            session = %self.id,
            begin,
            end_requested,
            end,
            "answering resend request"
        );
        if begin > end {
            return Ok(());
        }

        let stored = self.store.get(begin, end).await?;
        if stored.is_empty() {
            // Nothing retrievable (e.g. after a reset): hard reset forward.
            let mut msg = Message::new(MsgType::SequenceReset);
            msg.set_bool(tags::GAP_FILL_FLAG, false);
            msg.set_uint(tags::NEW_SEQ_NO, self.seqs.next_sender());
            self.resend_with_seq(msg, begin).await?;
            return Ok(());
        }

        let mut next_expected = begin;
        for (stored_seq, bytes) in stored {
            if stored_seq > next_expected {
                self.send_gap_fill(next_expected, stored_seq).await?;
            }
            self.resend_stored(stored_seq, &bytes).await?;
            next_expected = stored_seq + 1;
        }
        if next_expected <= end {
            self.send_gap_fill(next_expected, end + 1).await?;
        }
        Ok(())
    }

    /// Replays one stored message with the duplicate markers set.
    async fn resend_stored(&mut self, seq: u64, bytes: &[u8]) -> Result<(), FixError> {
        let decoded = Decoder::new(bytes)
            .with_length_and_checksum_verification(false)
            .decode();
        let raw = match decoded {
            Ok(raw) => raw,
            Err(err) => {
                error!(session = %self.id, seq, %err, "stored message unreadable, gap filling");
                return self.send_gap_fill(seq, seq + 1).await;
            }
        };

        if is_admin_type(raw.msg_type()) {
            return self.send_gap_fill(seq, seq + 1).await;
        }

        let mut msg = raw.to_message();
        msg.header.set(anvilfix_core::Field::from_bool(tags::POSS_DUP_FLAG, true));
        if let Some(original) = raw.get_field_str(tags::SENDING_TIME) {
            msg.header
                .set(anvilfix_core::Field::from_str_value(tags::ORIG_SENDING_TIME, original));
        }
        msg.header.set(anvilfix_core::Field::from_str_value(
            tags::SENDING_TIME,
            &self.sending_time_now(),
        ));

        debug!(session = %self.id, seq, "resending stored message");
        let bytes = encode_message(self.id.begin_string(), &msg)?;
        self.write_raw(&bytes).await;
        Ok(())
    }

    /// Emits a SequenceReset-GapFill covering `[begin, new_seq)`.
    async fn send_gap_fill(&mut self, begin: u64, new_seq: u64) -> Result<(), FixError> {
        debug!(session = %self.id, begin, new_seq, "gap filling resend range");
        let mut msg = Message::new(MsgType::SequenceReset);
        msg.set_bool(tags::GAP_FILL_FLAG, true);
        msg.set_uint(tags::NEW_SEQ_NO, new_seq);
        self.resend_with_seq(msg, begin).await
    }

    /// Sends an administrative replay message at an already-consumed
    /// sequence number: no store write, no counter increment.
    async fn resend_with_seq(&mut self, mut msg: Message, seq: u64) -> Result<(), FixError> {
        self.application.to_admin(&mut msg, &self.id).await;
        self.stamp_header(&mut msg, seq);
        msg.header
            .set(anvilfix_core::Field::from_bool(tags::POSS_DUP_FLAG, true));
        let bytes = encode_message(self.id.begin_string(), &msg)?;
        self.write_raw(&bytes).await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Outbound path
    // ---------------------------------------------------------------------

    async fn send_admin(&mut self, mut msg: Message) -> Result<bool, FixError> {
        self.application.to_admin(&mut msg, &self.id).await;
        self.send_stamped(msg).await
    }

    async fn send_stamped(&mut self, mut msg: Message) -> Result<bool, FixError> {
        let seq = self.seqs.next_sender();
        self.stamp_header(&mut msg, seq);

        let bytes = encode_message(self.id.begin_string(), &msg)?;
        if self.config.is_persistable(msg.msg_type()) {
            self.store.set(seq, &bytes).await?;
        }
        self.seqs.incr_sender().await?;

        Ok(self.write_raw(&bytes).await)
    }

    /// Writes bytes through the responder; a refused write is a transport
    /// failure and tears the connection down with counters preserved.
    async fn write_raw(&mut self, bytes: &[u8]) -> bool {
        let ok = match &mut self.responder {
            Some(responder) => responder.send(bytes),
            None => {
                warn!(session = %self.id, "no responder attached, dropping outbound message");
                false
            }
        };
        if ok {
            self.heartbeat.on_sent();
        } else if self.responder.is_some() {
            warn!(session = %self.id, "responder write failed, disconnecting");
            self.teardown().await;
        }
        ok
    }

    fn stamp_header(&self, msg: &mut Message, seq: u64) {
        use anvilfix_core::Field;
        msg.header
            .set(Field::from_str_value(tags::SENDER_COMP_ID, self.id.sender_comp_id().as_str()));
        msg.header
            .set(Field::from_str_value(tags::TARGET_COMP_ID, self.id.target_comp_id().as_str()));
        msg.header.set(Field::from_uint(tags::MSG_SEQ_NUM, seq));
        msg.header.set(Field::from_str_value(
            tags::SENDING_TIME,
            &self.sending_time_now(),
        ));
        if self.id.is_fixt()
            && msg.msg_type().is_app()
            && let Some(ver) = self.default_appl_ver_id_code()
        {
            msg.header.set(Field::from_str_value(tags::APPL_VER_ID, &ver));
        }
    }

    fn sending_time_now(&self) -> String {
        codecs::format_utc_timestamp(Timestamp::now(), self.config.millis_in_timestamp)
    }

    fn validator_for(&self, msg_type: &MsgType) -> Option<&Validator> {
        if msg_type.is_admin() {
            Some(&self.validator)
        } else {
            self.app_validator.as_ref()
        }
    }

    fn default_appl_ver_id_code(&self) -> Option<String> {
        let configured = self.config.default_appl_ver_id.as_deref()?;
        match anvilfix_dictionary::Version::from_begin_string(configured) {
            Some(version) => version.appl_ver_id().map(str::to_string),
            None => Some(configured.to_string()),
        }
    }

    async fn send_reject(
        &mut self,
        ref_seq: u64,
        reason: SessionRejectReason,
        ref_tag: Option<u32>,
        ref_msg_type: Option<&str>,
        text: &str,
    ) -> Result<(), FixError> {
        info!(session = %self.id, ref_seq, %reason, "rejecting message");
        let mut msg = Message::new(MsgType::Reject);
        msg.set_uint(tags::REF_SEQ_NUM, ref_seq);
        if supports_reject_fields(self.id.begin_string()) {
            if let Some(tag) = ref_tag {
                msg.set_uint(tags::REF_TAG_ID, u64::from(tag));
            }
            if let Some(mt) = ref_msg_type {
                msg.set(tags::REF_MSG_TYPE, mt);
            }
            msg.set_uint(tags::SESSION_REJECT_REASON, u64::from(reason.code()));
        }
        if !text.is_empty() {
            msg.set(tags::TEXT, text);
        }
        self.send_admin(msg).await?;
        Ok(())
    }

    async fn send_business_reject(
        &mut self,
        ref_seq: u64,
        ref_msg_type: &str,
        text: &str,
    ) -> Result<(), FixError> {
        if !supports_reject_fields(self.id.begin_string()) {
            return self
                .send_reject(ref_seq, SessionRejectReason::Other, None, None, text)
                .await;
        }

        info!(session = %self.id, ref_seq, "business-rejecting message");
        let mut msg = Message::new(MsgType::Application("j".to_string()));
        msg.set_uint(tags::REF_SEQ_NUM, ref_seq);
        msg.set(tags::REF_MSG_TYPE, ref_msg_type);
        msg.set_uint(tags::BUSINESS_REJECT_REASON, 3);
        msg.set(tags::TEXT, text);
        self.send_stamped(msg).await?;
        Ok(())
    }

    async fn initiate_logout(&mut self, text: &str) -> Result<(), FixError> {
        let mut msg = Message::new(MsgType::Logout);
        if !text.is_empty() {
            msg.set(tags::TEXT, text);
        }
        let sent = self.send_admin(msg).await?;
        // A logout during the handshake does not make the session logged on.
        if sent && self.state == SessionState::LoggedOn {
            self.set_state(SessionState::LogoutSent);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    async fn check_session_time(&mut self) -> Result<(), FixError> {
        let Some(window) = self.config.session_time else {
            return Ok(());
        };
        let now = Utc::now();

        if !window.is_in_range(now) {
            if self.state == SessionState::LoggedOn {
                info!(session = %self.id, "session window closed, logging out");
                self.initiate_logout("").await?;
            }
            return Ok(());
        }

        let creation = self.store.creation_time().to_datetime();
        if !window.is_in_same_range(creation, now) {
            info!(session = %self.id, "new session window, resetting sequence numbers");
            self.store.reset().await?;
        }
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %state, "state transition");
        self.state = state;
        self.state_entered_at = Instant::now();
    }

    /// Drops the transport and returns to `Disconnected`.
    async fn teardown(&mut self) {
        let was_logged_on = self.state.is_logged_on();
        if let Some(responder) = &mut self.responder {
            responder.disconnect();
        }
        self.responder = None;
        self.set_state(SessionState::Disconnected);
        self.queue.clear();
        self.resend_range = None;
        self.heartbeat.reset();
        self.sent_reset_logon = false;

        if was_logged_on {
            self.application.on_logout(&self.id).await;
        }
        if self.config.reset_on_disconnect
            && let Err(err) = self.store.reset().await
        {
            error!(session = %self.id, %err, "failed to reset store on disconnect");
        }
    }
}

fn gap_fill_flag(raw: &RawMessage<'_>) -> bool {
    raw.get_field(tags::GAP_FILL_FLAG)
        .and_then(|f| f.as_bool().ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_reject_fields() {
        assert!(!supports_reject_fields("FIX.4.0"));
        assert!(!supports_reject_fields("FIX.4.1"));
        assert!(supports_reject_fields("FIX.4.2"));
        assert!(supports_reject_fields("FIX.4.4"));
        assert!(supports_reject_fields("FIXT.1.1"));
    }
}
