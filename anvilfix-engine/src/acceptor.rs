/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The acceptor role.
//!
//! Listens on the configured port, peeks the first frame of every accepted
//! socket, resolves the session by the reversed CompID pair, and hands the
//! connection to the shared drive loop. A socket whose first frame is not
//! a Logon for a known session is dropped.

use crate::connection::drive;
use crate::engine::Engine;
use crate::factory::SessionFactory;
use crate::settings::{Properties, SessionSettings, keys};
use anvilfix_core::error::{ConfigError, FixError};
use anvilfix_core::message::MsgType;
use anvilfix_core::session_id::SessionId;
use anvilfix_core::types::CompId;
use anvilfix_session::Application;
use anvilfix_store::MessageStoreFactory;
use anvilfix_tagvalue::Decoder as MessageDecoder;
use anvilfix_transport::{FixCodec, SocketOptions, bind_listener};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Decoder;
use tracing::{info, warn};

/// How long an accepted socket may stay silent before its logon arrives.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-side connection driver.
pub struct SocketAcceptor {
    engine: Arc<Engine>,
    port: u16,
    options: SocketOptions,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SocketAcceptor {
    /// Builds every acceptor session from the settings and registers them
    /// with the engine.
    ///
    /// # Errors
    /// Returns `FixError` when no acceptor sessions are defined or a
    /// session cannot be built.
    pub async fn new(
        engine: Arc<Engine>,
        application: Arc<dyn Application>,
        store_factory: Arc<dyn MessageStoreFactory>,
        settings: &SessionSettings,
    ) -> Result<Self, FixError> {
        let factory = SessionFactory::new(
            application,
            store_factory,
            Arc::clone(engine.dictionaries()),
        );

        let mut port = None;
        let mut options = SocketOptions::default();
        for (id, props) in settings.sessions() {
            if props.get(keys::CONNECTION_TYPE) != Some("acceptor") {
                continue;
            }
            let session = factory.create(id.clone(), props).await?;
            engine.register(session);

            if port.is_none() {
                port = props
                    .get_int(keys::SOCKET_ACCEPT_PORT)?
                    .map(|p| p as u16);
                options = socket_options(props)?;
            }
        }

        let Some(port) = port else {
            return Err(ConfigError::NoSessionsDefined(" for acceptor".to_string()).into());
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            engine,
            port,
            options,
            stop_tx,
            stop_rx,
            handle: None,
        })
    }

    /// Returns the listen port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// # Errors
    /// Returns `FixError` if the port cannot be bound.
    pub fn start(&mut self) -> Result<(), FixError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = bind_listener(addr, &self.options)?;
        info!(%addr, "acceptor listening");

        let engine = Arc::clone(&self.engine);
        let options = self.options;
        let mut stop_rx = self.stop_rx.clone();
        self.handle = Some(tokio::spawn(async move {
            accept_loop(engine, listener, options, &mut stop_rx).await;
        }));
        Ok(())
    }

    /// Stops the acceptor: requests logout on every enabled session, waits
    /// up to ten seconds for the logoffs unless forced, and joins the
    /// accept loop. Sessions stay enabled so a restart logs back on.
    pub async fn stop(&mut self, force: bool) {
        let _ = self.stop_tx.send(true);

        let mut enabled = Vec::new();
        for handle in self.engine.session_handles() {
            let mut session = handle.lock().await;
            if session.is_enabled() {
                enabled.push(Arc::clone(&handle));
                session.logout();
            }
        }

        if !force {
            for _ in 0..10 {
                if !self.engine.is_logged_on().await {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        if force {
            for handle in self.engine.session_handles() {
                handle.lock().await.on_transport_disconnect().await;
            }
        }

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }

        for handle in enabled {
            handle.lock().await.logon();
        }
        info!("acceptor stopped");
    }

    /// Returns true if any acceptor session is logged on.
    pub async fn is_logged_on(&self) -> bool {
        self.engine.is_logged_on().await
    }
}

async fn accept_loop(
    engine: Arc<Engine>,
    listener: TcpListener,
    options: SocketOptions,
    stop_rx: &mut watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "accepted connection");
                    let engine = Arc::clone(&engine);
                    tokio::spawn(handle_connection(engine, stream, options));
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                }
            }
        }
    }
}

/// Reads the first frame, resolves the session, and drives the connection.
async fn handle_connection(engine: Arc<Engine>, mut stream: TcpStream, options: SocketOptions) {
    let mut codec = FixCodec::new();
    let mut buf = BytesMut::with_capacity(4096);

    let first_frame = tokio::time::timeout(FIRST_FRAME_TIMEOUT, async {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, "garbled first frame");
                    return None;
                }
            }
            match stream.read_buf(&mut buf).await {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "read failed before logon");
                    return None;
                }
            }
        }
    })
    .await;

    let Ok(Some(frame)) = first_frame else {
        warn!("no logon received on accepted socket, dropping");
        return;
    };

    let Some(session_id) = resolve_session_id(&frame) else {
        warn!("first frame is not a resolvable logon, dropping");
        return;
    };

    let Some(session) = engine.lookup(&session_id) else {
        warn!(session = %session_id, "logon for unknown session, dropping");
        return;
    };

    drive(session, stream, options, buf, Some(frame.to_vec()), false).await;
}

/// Maps an inbound Logon to its session by reversing the CompIDs.
fn resolve_session_id(frame: &[u8]) -> Option<SessionId> {
    let raw = MessageDecoder::new(frame)
        .with_length_and_checksum_verification(false)
        .decode()
        .ok()?;
    if raw.msg_type() != &MsgType::Logon {
        return None;
    }

    let begin_string = raw.begin_string();
    let wire_sender = raw.sender_comp_id()?;
    let wire_target = raw.target_comp_id()?;
    Some(SessionId::new(
        begin_string,
        CompId::new(wire_target)?,
        CompId::new(wire_sender)?,
    ))
}

pub(crate) fn socket_options(props: &Properties) -> Result<SocketOptions, ConfigError> {
    Ok(SocketOptions {
        no_delay: props.get_bool(keys::SOCKET_NO_DELAY)?.unwrap_or(false),
        reuse_address: props
            .get_bool(keys::SOCKET_REUSE_ADDRESS)?
            .unwrap_or(true),
        send_buffer_size: props
            .get_int(keys::SOCKET_SEND_BUFFER_SIZE)?
            .map(|v| v.max(0) as u32),
        receive_buffer_size: props
            .get_int(keys::SOCKET_RECEIVE_BUFFER_SIZE)?
            .map(|v| v.max(0) as u32),
    })
}
