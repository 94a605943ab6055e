/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The per-connection drive loop shared by both roles.
//!
//! One cooperative task per connection: it owns the read half, frames the
//! byte stream, feeds the session under its lock, and drives the
//! one-second timer. Writes go through the channel-backed responder so the
//! session never blocks on the socket. On a multi-thread runtime this is
//! the thread-per-connection shape; on a current-thread runtime it is the
//! single reactor.

use crate::engine::SessionHandle;
use anvilfix_transport::{FixCodec, SocketOptions, configure_stream, run_writer, writer_channel};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;
use tracing::warn;

/// Runs one connection to completion.
///
/// # Arguments
/// * `session` - The resolved session
/// * `stream` - The established transport
/// * `options` - Socket options to apply to the stream
/// * `initial_buf` - Bytes already read from the socket (acceptor peek)
/// * `first_frame` - A frame already cut from the stream, fed first
/// * `initiate` - Open the handshake (initiator role)
pub async fn drive(
    session: SessionHandle,
    stream: TcpStream,
    options: SocketOptions,
    initial_buf: BytesMut,
    first_frame: Option<Vec<u8>>,
    initiate: bool,
) {
    if let Err(err) = configure_stream(&stream, &options) {
        warn!(%err, "failed to apply socket options");
    }
    let (mut read_half, write_half) = stream.into_split();
    let (responder, rx) = writer_channel();
    let writer = tokio::spawn(run_writer(write_half, rx));

    {
        let mut guard = session.lock().await;
        guard.set_responder(Box::new(responder));
        if initiate && guard.initiate_logon().await.is_err() {
            guard.on_transport_disconnect().await;
            writer.abort();
            return;
        }
    }

    if let Some(frame) = first_frame {
        let mut guard = session.lock().await;
        let alive = guard.on_message(&frame).await.is_ok() && guard.state().is_connected();
        if !alive {
            guard.on_transport_disconnect().await;
            writer.abort();
            return;
        }
    }

    let mut codec = FixCodec::new();
    let mut buf = initial_buf;
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    'connection: loop {
        tokio::select! {
            result = read_half.read_buf(&mut buf) => {
                match result {
                    Ok(0) => break 'connection,
                    Ok(_) => loop {
                        match codec.decode(&mut buf) {
                            Ok(Some(frame)) => {
                                let mut guard = session.lock().await;
                                if guard.on_message(&frame).await.is_err()
                                    || !guard.state().is_connected()
                                {
                                    break 'connection;
                                }
                            }
                            Ok(None) => break,
                            Err(err) => {
                                warn!(%err, "framing error, dropping connection");
                                break 'connection;
                            }
                        }
                    },
                    Err(err) => {
                        warn!(%err, "socket read failed");
                        break 'connection;
                    }
                }
            }
            _ = tick.tick() => {
                let mut guard = session.lock().await;
                if guard.on_timer_tick().await.is_err() || !guard.state().is_connected() {
                    break 'connection;
                }
            }
        }
    }

    session.lock().await.on_transport_disconnect().await;
    writer.abort();
}
