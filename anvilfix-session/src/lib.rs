/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Session
//!
//! FIX session layer protocol implementation for the AnvilFIX engine.
//!
//! This crate provides:
//! - **Session**: the protocol state machine driving logon/logout, sequence
//!   tracking, gap recovery, heartbeats, and session-time enforcement
//! - **Application**: the callback surface the embedding application implements
//! - **Responder**: the outbound byte sink a session writes through
//! - **Configuration**: per-session policy knobs
//! - **Support types**: sequence bookkeeping, heartbeat clocks, time windows,
//!   resend ranges

pub mod application;
pub mod config;
pub mod heartbeat;
pub mod resend;
pub mod responder;
pub mod sequence;
pub mod session;
pub mod state;
pub mod time_range;

pub use application::{Application, DoNotSend, NullApplication, Rejection};
pub use config::{SessionConfig, SessionRole};
pub use heartbeat::HeartbeatMonitor;
pub use resend::ResendRange;
pub use responder::Responder;
pub use sequence::{SequenceCheck, SequenceNumbers};
pub use session::Session;
pub use state::SessionState;
pub use time_range::TimeRange;
