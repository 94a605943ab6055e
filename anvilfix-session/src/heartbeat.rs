/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Heartbeat and TestRequest timing.
//!
//! Driven by the session's one-second tick against two wall clocks:
//! a Heartbeat goes out when nothing was sent for a full interval, a
//! TestRequest when nothing was received for 1.2 intervals, and the
//! session times out at 2.4 intervals of inbound silence.

use std::time::{Duration, Instant};

/// Multiplier on the interval before a TestRequest is issued.
const TEST_REQUEST_FACTOR: f64 = 1.2;

/// Multiplier on the interval before the session is declared dead.
const TIMEOUT_FACTOR: f64 = 2.4;

/// Tracks send/receive clocks for one session.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// Heartbeat interval (HeartBtInt).
    interval: Duration,
    /// Time of last outbound message.
    last_sent: Instant,
    /// Time of last inbound message.
    last_received: Instant,
    /// Outstanding TestRequest ID awaiting its Heartbeat echo.
    pending_test_request: Option<String>,
}

impl HeartbeatMonitor {
    /// Creates a monitor with the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            interval,
            last_sent: now,
            last_received: now,
            pending_test_request: None,
        }
    }

    /// Replaces the interval (an acceptor adopts the peer's HeartBtInt).
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Records an outbound message.
    #[inline]
    pub fn on_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    /// Records an inbound message; an echoed TestReqID clears the pending
    /// TestRequest.
    pub fn on_received(&mut self, test_req_id: Option<&str>) {
        self.last_received = Instant::now();
        if let (Some(pending), Some(echoed)) = (&self.pending_test_request, test_req_id)
            && pending == echoed
        {
            self.pending_test_request = None;
        }
    }

    /// Records that a TestRequest went out.
    pub fn on_test_request_sent(&mut self, test_req_id: impl Into<String>) {
        self.pending_test_request = Some(test_req_id.into());
        self.last_sent = Instant::now();
    }

    /// Returns the outstanding TestRequest ID, if any.
    #[must_use]
    pub fn pending_test_request(&self) -> Option<&str> {
        self.pending_test_request.as_deref()
    }

    /// True when a Heartbeat is due: a full interval without sending.
    #[must_use]
    pub fn heartbeat_due(&self) -> bool {
        self.last_sent.elapsed() >= self.interval
    }

    /// True when a TestRequest is due: 1.2 intervals without receiving and
    /// no TestRequest already outstanding.
    #[must_use]
    pub fn test_request_due(&self) -> bool {
        self.pending_test_request.is_none()
            && self.last_received.elapsed() >= self.interval.mul_f64(TEST_REQUEST_FACTOR)
    }

    /// True when the counterparty is presumed dead: 2.4 intervals of
    /// inbound silence.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.last_received.elapsed() >= self.interval.mul_f64(TIMEOUT_FACTOR)
    }

    /// Milliseconds since the last inbound message.
    #[must_use]
    pub fn silence_millis(&self) -> u64 {
        self.last_received.elapsed().as_millis() as u64
    }

    /// Resets both clocks and drops any pending TestRequest.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_sent = now;
        self.last_received = now;
        self.pending_test_request = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_new_monitor_is_quiet() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        assert!(!monitor.heartbeat_due());
        assert!(!monitor.test_request_due());
        assert!(!monitor.timed_out());
    }

    #[test]
    fn test_heartbeat_due_after_interval() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(20));
        sleep(Duration::from_millis(25));
        assert!(monitor.heartbeat_due());

        monitor.on_sent();
        assert!(!monitor.heartbeat_due());
    }

    #[test]
    fn test_test_request_after_1_2_intervals() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(50));
        sleep(Duration::from_millis(40));
        assert!(!monitor.test_request_due());

        sleep(Duration::from_millis(25));
        assert!(monitor.test_request_due());

        monitor.on_test_request_sent("TEST");
        assert!(!monitor.test_request_due());
        assert_eq!(monitor.pending_test_request(), Some("TEST"));
    }

    #[test]
    fn test_echo_clears_pending_request() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        monitor.on_test_request_sent("TEST");

        monitor.on_received(Some("OTHER"));
        assert_eq!(monitor.pending_test_request(), Some("TEST"));

        monitor.on_received(Some("TEST"));
        assert!(monitor.pending_test_request().is_none());
    }

    #[test]
    fn test_timed_out_after_2_4_intervals() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(25));
        sleep(Duration::from_millis(40));
        assert!(!monitor.timed_out());
        sleep(Duration::from_millis(25));
        assert!(monitor.timed_out());
    }
}
