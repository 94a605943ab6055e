/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AnvilFIX Transport
//!
//! TCP transport plumbing for the AnvilFIX session engine.
//!
//! This crate provides:
//! - **FixCodec**: a tokio codec framing the byte stream into complete FIX
//!   messages (BeginString + BodyLength + trailer scan)
//! - **Socket options**: reuse-address, nodelay, and buffer sizing applied
//!   through tokio's `TcpSocket`
//! - **TcpResponder**: a channel-backed [`anvilfix_session::Responder`]
//!   decoupling session processing from socket writes

pub mod codec;
pub mod responder;
pub mod socket;

pub use codec::{CodecError, FixCodec};
pub use responder::{TcpResponder, WriterCommand, run_writer, writer_channel};
pub use socket::{SocketOptions, bind_listener, configure_stream, connect};
