/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session state machine scenarios driven over an in-memory transport.

use anvilfix_core::{CompId, Message, MsgType, SessionId, Timestamp};
use anvilfix_dictionary::{Validator, Version, session_dictionary};
use anvilfix_session::{
    Application, Responder, Session, SessionConfig, SessionRole, SessionState, TimeRange,
};
use anvilfix_store::{MemoryStore, MessageStore};
use anvilfix_tagvalue::Encoder;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Captures everything the session writes to its transport.
#[derive(Clone, Default)]
struct Wire {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    disconnected: Arc<AtomicBool>,
}

impl Wire {
    fn frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    fn frame(&self, index: usize) -> Vec<u8> {
        self.sent.lock()[index].clone()
    }

    fn count(&self) -> usize {
        self.sent.lock().len()
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl Responder for Wire {
    fn send(&mut self, data: &[u8]) -> bool {
        self.sent.lock().push(data.to_vec());
        true
    }

    fn disconnect(&mut self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Counts lifecycle callbacks and inbound application deliveries.
#[derive(Default)]
struct CountingApp {
    logons: AtomicUsize,
    logouts: AtomicUsize,
    app_messages: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl Application for CountingApp {
    async fn on_create(&self, _session_id: &SessionId) {}

    async fn on_logon(&self, _session_id: &SessionId) {
        self.logons.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_logout(&self, _session_id: &SessionId) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }

    async fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    async fn from_admin(
        &self,
        _message: &anvilfix_core::RawMessage<'_>,
        _session_id: &SessionId,
    ) -> Result<(), anvilfix_session::Rejection> {
        Ok(())
    }

    async fn to_app(
        &self,
        _message: &mut Message,
        _session_id: &SessionId,
    ) -> Result<(), anvilfix_session::DoNotSend> {
        Ok(())
    }

    async fn from_app(
        &self,
        message: &anvilfix_core::RawMessage<'_>,
        _session_id: &SessionId,
    ) -> Result<(), anvilfix_session::Rejection> {
        self.app_messages.lock().push(message.msg_seq_num().unwrap_or(0));
        Ok(())
    }
}

struct Harness {
    session: Session,
    wire: Wire,
    app: Arc<CountingApp>,
    store: Arc<MemoryStore>,
}

fn server_session(config: SessionConfig) -> Harness {
    let id = SessionId::new(
        "FIX.4.4",
        CompId::new("SERVER").unwrap(),
        CompId::new("CLIENT").unwrap(),
    );
    let store = Arc::new(MemoryStore::new());
    let app = Arc::new(CountingApp::default());
    let validator = Validator::new(Arc::new(session_dictionary(Version::Fix44)));
    let mut session = Session::new(
        id,
        config,
        Arc::clone(&store) as Arc<dyn MessageStore>,
        Arc::clone(&app) as Arc<dyn Application>,
        validator,
        None,
    );
    let wire = Wire::default();
    session.set_responder(Box::new(wire.clone()));
    Harness {
        session,
        wire,
        app,
        store,
    }
}

fn acceptor() -> Harness {
    server_session(SessionConfig::new(SessionRole::Acceptor))
}

fn now_ts() -> String {
    Timestamp::now().format_millis().to_string()
}

/// Builds a framed message from CLIENT to SERVER.
fn client_frame(msg_type: &str, seq: u64, body: &[(u32, &str)]) -> Vec<u8> {
    let mut enc = Encoder::new("FIX.4.4");
    enc.put_str(35, msg_type);
    enc.put_uint(34, seq);
    enc.put_str(49, "CLIENT");
    enc.put_str(56, "SERVER");
    enc.put_str(52, &now_ts());
    for (tag, value) in body {
        enc.put_str(*tag, value);
    }
    enc.finish().to_vec()
}

fn client_logon(seq: u64) -> Vec<u8> {
    client_frame("A", seq, &[(98, "0"), (108, "30")])
}

/// Extracts the first value of a tag from a framed message.
fn get_tag(frame: &[u8], tag: u32) -> Option<String> {
    let needle = format!("{tag}=");
    frame.split(|&b| b == 0x01).find_map(|field| {
        let field = String::from_utf8_lossy(field);
        field
            .strip_prefix(needle.as_str())
            .map(|value| value.to_string())
    })
}

async fn logged_on_acceptor() -> Harness {
    let mut h = acceptor();
    h.session.on_message(&client_logon(1)).await.unwrap();
    assert_eq!(h.session.state(), SessionState::LoggedOn);
    h
}

#[tokio::test]
async fn logon_handshake_with_defaults() {
    let mut h = acceptor();
    h.session.on_message(&client_logon(1)).await.unwrap();

    assert_eq!(h.session.state(), SessionState::LoggedOn);
    assert_eq!(h.app.logons.load(Ordering::SeqCst), 1);
    assert_eq!(h.wire.count(), 1);

    let reply = h.wire.frame(0);
    assert_eq!(get_tag(&reply, 35).as_deref(), Some("A"));
    assert_eq!(get_tag(&reply, 34).as_deref(), Some("1"));
    assert_eq!(get_tag(&reply, 49).as_deref(), Some("SERVER"));
    assert_eq!(get_tag(&reply, 56).as_deref(), Some("CLIENT"));
    assert_eq!(get_tag(&reply, 98).as_deref(), Some("0"));
    assert_eq!(get_tag(&reply, 108).as_deref(), Some("30"));

    assert_eq!(h.session.next_target_seq_num(), 2);
    assert_eq!(h.session.next_sender_seq_num(), 2);
}

#[tokio::test]
async fn acceptor_rejects_non_logon_first_message() {
    let mut h = acceptor();
    h.session
        .on_message(&client_frame("0", 1, &[]))
        .await
        .unwrap();

    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert!(h.wire.is_disconnected());
    assert_eq!(h.app.logons.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gap_triggers_resend_request_then_gap_fill_recovers() {
    let mut h = logged_on_acceptor().await;
    h.store.set_next_target_seq_num(5).await.unwrap();

    // Message 8 arrives while 5 was expected.
    h.session
        .on_message(&client_frame("0", 8, &[]))
        .await
        .unwrap();

    let rr = h.wire.frame(1);
    assert_eq!(get_tag(&rr, 35).as_deref(), Some("2"));
    assert_eq!(get_tag(&rr, 7).as_deref(), Some("5"));
    assert_eq!(get_tag(&rr, 16).as_deref(), Some("7"));
    assert_eq!(h.session.next_target_seq_num(), 5);
    assert!(h.session.resend_range().is_some());

    // Counterparty gap-fills 5..7; the queued message 8 then replays.
    h.session
        .on_message(&client_frame("4", 5, &[(123, "Y"), (36, "8")]))
        .await
        .unwrap();

    assert_eq!(h.session.next_target_seq_num(), 9);
    assert!(h.session.resend_range().is_none());
    assert_eq!(h.session.state(), SessionState::LoggedOn);
}

#[tokio::test]
async fn duplicate_gap_is_not_rerequested() {
    let mut h = logged_on_acceptor().await;
    h.store.set_next_target_seq_num(5).await.unwrap();

    h.session
        .on_message(&client_frame("0", 8, &[]))
        .await
        .unwrap();
    h.session
        .on_message(&client_frame("0", 7, &[]))
        .await
        .unwrap();

    let resend_requests = h
        .wire
        .frames()
        .iter()
        .filter(|f| get_tag(f, 35).as_deref() == Some("2"))
        .count();
    assert_eq!(resend_requests, 1);
}

#[tokio::test]
async fn low_sequence_without_poss_dup_is_fatal() {
    let mut h = logged_on_acceptor().await;
    h.store.set_next_target_seq_num(10).await.unwrap();

    h.session
        .on_message(&client_frame("0", 7, &[(43, "N")]))
        .await
        .unwrap();

    let logout = h.wire.frame(1);
    assert_eq!(get_tag(&logout, 35).as_deref(), Some("5"));
    assert_eq!(
        get_tag(&logout, 58).as_deref(),
        Some("MsgSeqNum too low, expecting 10 received 7")
    );
    assert!(h.wire.is_disconnected());
    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(h.app.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn low_sequence_poss_dup_is_dropped_silently() {
    let mut h = logged_on_acceptor().await;
    h.store.set_next_target_seq_num(10).await.unwrap();
    let frames_before = h.wire.count();

    let ts = now_ts();
    h.session
        .on_message(&client_frame("0", 7, &[(43, "Y"), (122, &ts)]))
        .await
        .unwrap();

    assert_eq!(h.wire.count(), frames_before);
    assert_eq!(h.session.next_target_seq_num(), 10);
    assert_eq!(h.session.state(), SessionState::LoggedOn);
}

#[tokio::test]
async fn test_request_after_silence_then_heartbeat_response() {
    let mut h = acceptor();
    // Client requests a one-second heartbeat interval.
    h.session
        .on_message(&client_frame("A", 1, &[(98, "0"), (108, "1")]))
        .await
        .unwrap();
    assert_eq!(h.session.state(), SessionState::LoggedOn);

    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;
    h.session.on_timer_tick().await.unwrap();

    let test_request = h
        .wire
        .frames()
        .into_iter()
        .find(|f| get_tag(f, 35).as_deref() == Some("1"))
        .expect("test request sent");
    assert_eq!(get_tag(&test_request, 112).as_deref(), Some("TEST"));

    // The counterparty answers with a heartbeat echoing the TestReqID.
    h.session
        .on_message(&client_frame("0", 2, &[(112, "TEST")]))
        .await
        .unwrap();
    h.session.on_timer_tick().await.unwrap();

    assert!(!h.wire.is_disconnected());
    assert_eq!(h.session.state(), SessionState::LoggedOn);
}

#[tokio::test]
async fn heartbeat_timeout_disconnects() {
    let mut h = acceptor();
    // 1-second interval; 2.4 intervals of silence kills the session.
    h.session
        .on_message(&client_frame("A", 1, &[(98, "0"), (108, "1")]))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    h.session.on_timer_tick().await.unwrap();

    assert!(h.wire.is_disconnected());
    assert_eq!(h.session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn corrupt_checksum_is_dropped_without_advancing() {
    let mut h = logged_on_acceptor().await;
    let target_before = h.session.next_target_seq_num();
    let frames_before = h.wire.count();

    let mut frame = client_frame("0", 2, &[]);
    let len = frame.len();
    frame[len - 4..len - 1].copy_from_slice(b"000");
    h.session.on_message(&frame).await.unwrap();

    assert_eq!(h.session.next_target_seq_num(), target_before);
    assert_eq!(h.wire.count(), frames_before);
    assert_eq!(h.session.state(), SessionState::LoggedOn);
}

#[tokio::test]
async fn inbound_test_request_is_answered_with_echo() {
    let mut h = logged_on_acceptor().await;

    h.session
        .on_message(&client_frame("1", 2, &[(112, "PING42")]))
        .await
        .unwrap();

    let heartbeat = h.wire.frame(1);
    assert_eq!(get_tag(&heartbeat, 35).as_deref(), Some("0"));
    assert_eq!(get_tag(&heartbeat, 112).as_deref(), Some("PING42"));
    assert_eq!(h.session.next_target_seq_num(), 3);
}

#[tokio::test]
async fn graceful_logout_is_answered_and_disconnects() {
    let mut h = logged_on_acceptor().await;

    h.session
        .on_message(&client_frame("5", 2, &[]))
        .await
        .unwrap();

    let reply = h.wire.frame(1);
    assert_eq!(get_tag(&reply, 35).as_deref(), Some("5"));
    assert!(h.wire.is_disconnected());
    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(h.app.logouts.load(Ordering::SeqCst), 1);
    // The logout consumed its sequence number.
    assert_eq!(h.session.next_target_seq_num(), 3);
}

#[tokio::test]
async fn sent_app_messages_are_persisted_and_resent_with_gap_fills() {
    let mut h = logged_on_acceptor().await;

    // Two application messages (seq 2 and 3), then an inbound TestRequest
    // whose Heartbeat reply occupies sequence number 4 without being stored.
    let mut order = Message::new(MsgType::Application("D".to_string()));
    order.set(11, "ORDER-1");
    assert!(h.session.send(order).await.unwrap());
    let mut order = Message::new(MsgType::Application("D".to_string()));
    order.set(11, "ORDER-2");
    assert!(h.session.send(order).await.unwrap());
    h.session
        .on_message(&client_frame("1", 2, &[(112, "X")]))
        .await
        .unwrap();
    assert_eq!(h.session.next_sender_seq_num(), 5);

    // Both application messages are retrievable from the store.
    let stored = h.store.get(2, 3).await.unwrap();
    assert_eq!(stored.len(), 2);

    // The counterparty asks for everything from 2 onwards.
    h.session
        .on_message(&client_frame("2", 3, &[(7, "2"), (16, "0")]))
        .await
        .unwrap();

    let frames = h.wire.frames();
    let replayed: Vec<&Vec<u8>> = frames
        .iter()
        .filter(|f| get_tag(f, 43).as_deref() == Some("Y"))
        .collect();

    // Two resent orders plus one gap fill covering the heartbeat slot.
    assert_eq!(replayed.len(), 3);
    assert_eq!(get_tag(replayed[0], 35).as_deref(), Some("D"));
    assert_eq!(get_tag(replayed[0], 34).as_deref(), Some("2"));
    assert!(get_tag(replayed[0], 122).is_some());
    assert_eq!(get_tag(replayed[1], 35).as_deref(), Some("D"));
    assert_eq!(get_tag(replayed[1], 34).as_deref(), Some("3"));

    let gap_fill = replayed[2];
    assert_eq!(get_tag(gap_fill, 35).as_deref(), Some("4"));
    assert_eq!(get_tag(gap_fill, 123).as_deref(), Some("Y"));
    assert_eq!(get_tag(gap_fill, 34).as_deref(), Some("4"));
    assert_eq!(get_tag(gap_fill, 36).as_deref(), Some("5"));
}

#[tokio::test]
async fn resend_request_after_reset_answers_with_sequence_reset() {
    let mut h = logged_on_acceptor().await;
    // Nothing stored: the logon reply was admin, never persisted.
    h.session
        .on_message(&client_frame("2", 2, &[(7, "1"), (16, "1")]))
        .await
        .unwrap();

    let frames = h.wire.frames();
    let reset = frames
        .iter()
        .find(|f| get_tag(f, 35).as_deref() == Some("4"))
        .expect("sequence reset sent");
    assert_eq!(get_tag(reset, 123).as_deref(), Some("N"));
    assert_eq!(get_tag(reset, 36).as_deref(), Some("2"));
}

#[tokio::test]
async fn sequence_reset_reset_mode_moves_target_forward() {
    let mut h = logged_on_acceptor().await;

    // Reset mode bypasses the sequence check even with a wild MsgSeqNum.
    h.session
        .on_message(&client_frame("4", 99, &[(123, "N"), (36, "20")]))
        .await
        .unwrap();

    assert_eq!(h.session.next_target_seq_num(), 20);
}

#[tokio::test]
async fn sequence_reset_cannot_lower_target() {
    let mut h = logged_on_acceptor().await;
    h.store.set_next_target_seq_num(10).await.unwrap();

    h.session
        .on_message(&client_frame("4", 99, &[(123, "N"), (36, "3")]))
        .await
        .unwrap();

    assert_eq!(h.session.next_target_seq_num(), 10);
    let reject = h.wire.frame(1);
    assert_eq!(get_tag(&reject, 35).as_deref(), Some("3"));
    assert_eq!(get_tag(&reject, 373).as_deref(), Some("5"));
}

#[tokio::test]
async fn out_of_window_session_logs_out_on_tick() {
    use chrono::{Timelike, Utc};

    // A one-minute window that excludes the current time.
    let now = Utc::now();
    let start_h = (now.hour() + 2) % 24;
    let window = TimeRange::daily(
        chrono::NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
        chrono::NaiveTime::from_hms_opt(start_h, 1, 0).unwrap(),
        false,
    );

    let mut h = logged_on_acceptor().await;
    // Window applies from now on; the session is already logged on.
    let mut config = SessionConfig::new(SessionRole::Acceptor);
    config.session_time = Some(window);
    let mut out_of_window = server_session(config);
    out_of_window
        .session
        .on_message(&client_logon(1))
        .await
        .unwrap();
    // Logon is refused outside the window.
    assert_eq!(out_of_window.session.state(), SessionState::Disconnected);
    let logout = out_of_window.wire.frame(0);
    assert_eq!(get_tag(&logout, 35).as_deref(), Some("5"));

    // A session without a window stays up across ticks.
    h.session.on_timer_tick().await.unwrap();
    assert_eq!(h.session.state(), SessionState::LoggedOn);
}

#[tokio::test]
async fn disabled_session_logs_out_on_tick() {
    let mut h = logged_on_acceptor().await;
    h.session.logout();
    h.session.on_timer_tick().await.unwrap();

    assert_eq!(h.session.state(), SessionState::LogoutSent);
    let logout = h.wire.frames().into_iter().next_back().unwrap();
    assert_eq!(get_tag(&logout, 35).as_deref(), Some("5"));
}

#[tokio::test]
async fn app_messages_are_delivered_in_sequence_order() {
    let mut h = logged_on_acceptor().await;
    // Deliver heartbeats 2..=4 out of order: 3 and 4 queue behind 2.
    h.session
        .on_message(&client_frame("0", 3, &[]))
        .await
        .unwrap();
    h.session
        .on_message(&client_frame("0", 4, &[]))
        .await
        .unwrap();
    assert_eq!(h.session.next_target_seq_num(), 2);

    h.session
        .on_message(&client_frame("4", 2, &[(123, "Y"), (36, "3")]))
        .await
        .unwrap();

    // Gap fill moved to 3; queued 3 and 4 replayed in order.
    assert_eq!(h.session.next_target_seq_num(), 5);
}
