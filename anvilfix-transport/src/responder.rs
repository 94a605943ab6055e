/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Channel-backed responder.
//!
//! Sessions write synchronously; the socket is async. [`TcpResponder`]
//! bridges the two with an unbounded channel drained by a writer task, so
//! `Session::send` never blocks on the network.

use anvilfix_session::Responder;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Commands drained by the writer task.
#[derive(Debug)]
pub enum WriterCommand {
    /// Write these bytes to the socket.
    Write(Bytes),
    /// Shut the write half down and exit.
    Disconnect,
}

/// Responder pushing into the writer task's channel.
#[derive(Debug, Clone)]
pub struct TcpResponder {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl TcpResponder {
    /// Wraps a writer-task channel.
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<WriterCommand>) -> Self {
        Self { tx }
    }
}

impl Responder for TcpResponder {
    fn send(&mut self, data: &[u8]) -> bool {
        self.tx
            .send(WriterCommand::Write(Bytes::copy_from_slice(data)))
            .is_ok()
    }

    fn disconnect(&mut self) {
        let _ = self.tx.send(WriterCommand::Disconnect);
    }
}

/// Creates the responder/receiver pair for one connection.
#[must_use]
pub fn writer_channel() -> (TcpResponder, mpsc::UnboundedReceiver<WriterCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TcpResponder::new(tx), rx)
}

/// Drains writer commands into the socket until disconnect or write error.
pub async fn run_writer(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Write(bytes) => {
                if let Err(err) = write_half.write_all(&bytes).await {
                    warn!(%err, "socket write failed");
                    break;
                }
            }
            WriterCommand::Disconnect => {
                debug!("writer task disconnecting");
                let _ = write_half.shutdown().await;
                break;
            }
        }
    }
}
