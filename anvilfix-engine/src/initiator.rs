/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The initiator role.
//!
//! Tracks every session in one of three sets: `disconnected`, `pending`
//! (dialed, handshake in flight), and `connected`. A driver loop
//! periodically dials each enabled, in-window disconnected session and
//! promotes it through the sets as the handshake progresses. Reconnection
//! uses a flat interval, thirty seconds by default.

use crate::acceptor::socket_options;
use crate::connection::drive;
use crate::engine::Engine;
use crate::factory::SessionFactory;
use crate::settings::{SessionSettings, keys};
use anvilfix_core::error::{ConfigError, FixError};
use anvilfix_core::session_id::SessionId;
use anvilfix_session::Application;
use anvilfix_store::MessageStoreFactory;
use anvilfix_transport::{SocketOptions, connect};
use bytes::BytesMut;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Default seconds between reconnect attempts.
const DEFAULT_RECONNECT_INTERVAL: u64 = 30;

/// Dial target for one session.
#[derive(Debug, Clone)]
struct DialTarget {
    host: String,
    port: u16,
    options: SocketOptions,
}

/// The three connection-state sets, mutated under one lock.
#[derive(Debug, Default)]
pub(crate) struct ConnectionSets {
    disconnected: HashSet<SessionId>,
    pending: HashSet<SessionId>,
    connected: HashSet<SessionId>,
}

impl ConnectionSets {
    fn set_disconnected(&mut self, id: &SessionId) {
        self.pending.remove(id);
        self.connected.remove(id);
        self.disconnected.insert(id.clone());
    }

    fn set_pending(&mut self, id: &SessionId) {
        self.disconnected.remove(id);
        self.connected.remove(id);
        self.pending.insert(id.clone());
    }

    fn set_connected(&mut self, id: &SessionId) {
        self.disconnected.remove(id);
        self.pending.remove(id);
        self.connected.insert(id.clone());
    }
}

/// Client-side connection driver.
pub struct SocketInitiator {
    engine: Arc<Engine>,
    targets: HashMap<SessionId, DialTarget>,
    sets: Arc<Mutex<ConnectionSets>>,
    reconnect_interval: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SocketInitiator {
    /// Builds every initiator session from the settings and registers them
    /// with the engine.
    ///
    /// # Errors
    /// Returns `FixError` when no initiator sessions are defined or a
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

        let mut targets = HashMap::new();
        let mut sets = ConnectionSets::default();
        for (id, props) in settings.sessions() {
            if props.get(keys::CONNECTION_TYPE) != Some("initiator") {
                continue;
            }
            let session = factory.create(id.clone(), props).await?;
            engine.register(session);

            let host = props.require(keys::SOCKET_CONNECT_HOST)?.to_string();
            let port = props
                .get_int(keys::SOCKET_CONNECT_PORT)?
                .ok_or_else(|| ConfigError::MissingSetting {
                    key: keys::SOCKET_CONNECT_PORT.to_string(),
                })? as u16;
            targets.insert(
                id.clone(),
                DialTarget {
                    host,
                    port,
                    options: socket_options(props)?,
                },
            );
            sets.set_disconnected(id);
        }

        if targets.is_empty() {
            return Err(ConfigError::NoSessionsDefined(" for initiator".to_string()).into());
        }

        let reconnect_interval = settings
            .defaults()
            .get_int(keys::RECONNECT_INTERVAL)?
            .map_or(DEFAULT_RECONNECT_INTERVAL, |v| v.max(1) as u64);

        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            engine,
            targets,
            sets: Arc::new(Mutex::new(sets)),
            reconnect_interval: Duration::from_secs(reconnect_interval),
            stop_tx,
            stop_rx,
            handle: None,
        })
    }

    /// Returns true if the session has a handshake in flight.
    #[must_use]
    pub fn is_pending(&self, id: &SessionId) -> bool {
        self.sets.lock().pending.contains(id)
    }

    /// Returns true if the session completed its handshake.
    #[must_use]
    pub fn is_connected(&self, id: &SessionId) -> bool {
        self.sets.lock().connected.contains(id)
    }

    /// Returns true if the session has no transport.
    #[must_use]
    pub fn is_disconnected(&self, id: &SessionId) -> bool {
        self.sets.lock().disconnected.contains(id)
    }

    /// Spawns the driver loop.
    pub fn start(&mut self) {
        let engine = Arc::clone(&self.engine);
        let targets = self.targets.clone();
        let sets = Arc::clone(&self.sets);
        let interval = self.reconnect_interval;
        let mut stop_rx = self.stop_rx.clone();

        self.handle = Some(tokio::spawn(async move {
            loop {
                connect_round(&engine, &targets, &sets).await;
                promote_logged_on(&engine, &sets).await;

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }));
        info!(reconnect_secs = self.reconnect_interval.as_secs(), "initiator started");
    }

    /// Stops the initiator: requests logout everywhere, waits up to ten
    /// seconds unless forced, joins the driver. Sessions stay enabled so a
    /// restart dials again.
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
        info!("initiator stopped");
    }

    /// Returns true if any initiator session is logged on.
    pub async fn is_logged_on(&self) -> bool {
        self.engine.is_logged_on().await
    }
}

/// Dials every enabled, in-window session currently in the disconnected set.
async fn connect_round(
    engine: &Arc<Engine>,
    targets: &HashMap<SessionId, DialTarget>,
    sets: &Arc<Mutex<ConnectionSets>>,
) {
    let disconnected: Vec<SessionId> = sets.lock().disconnected.iter().cloned().collect();

    for id in disconnected {
        let Some(target) = targets.get(&id) else {
            continue;
        };
        let Some(session) = engine.lookup(&id) else {
            continue;
        };
        {
            let guard = session.lock().await;
            if !guard.is_enabled() || !guard.is_logon_time(Utc::now()) {
                continue;
            }
        }

        let addr = match tokio::net::lookup_host((target.host.as_str(), target.port)).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    warn!(session = %id, host = target.host, "host resolved to no addresses");
                    continue;
                }
            },
            Err(err) => {
                warn!(session = %id, %err, "host resolution failed");
                continue;
            }
        };

        match connect(addr, &target.options).await {
            Ok(stream) => {
                info!(session = %id, %addr, "connected");
                sets.lock().set_pending(&id);

                let sets = Arc::clone(sets);
                let options = target.options;
                let task_id = id.clone();
                tokio::spawn(async move {
                    drive(session, stream, options, BytesMut::new(), None, true).await;
                    sets.lock().set_disconnected(&task_id);
                    info!(session = %task_id, "disconnected");
                });
            }
            Err(err) => {
                warn!(session = %id, %addr, %err, "connect failed");
            }
        }
    }
}

/// Moves pending sessions whose handshake completed into `connected`.
async fn promote_logged_on(engine: &Arc<Engine>, sets: &Arc<Mutex<ConnectionSets>>) {
    let pending: Vec<SessionId> = sets.lock().pending.iter().cloned().collect();
    for id in pending {
        if let Some(session) = engine.lookup(&id)
            && session.lock().await.is_logged_on()
        {
            sets.lock().set_connected(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::types::CompId;

    fn id(sender: &str) -> SessionId {
        SessionId::new(
            "FIX.4.4",
            CompId::new(sender).unwrap(),
            CompId::new("SERVER").unwrap(),
        )
    }

    #[test]
    fn test_connection_sets_transitions() {
        let mut sets = ConnectionSets::default();
        let a = id("A");

        sets.set_disconnected(&a);
        assert!(sets.disconnected.contains(&a));

        sets.set_pending(&a);
        assert!(!sets.disconnected.contains(&a));
        assert!(sets.pending.contains(&a));

        sets.set_connected(&a);
        assert!(!sets.pending.contains(&a));
        assert!(sets.connected.contains(&a));

        sets.set_disconnected(&a);
        assert!(!sets.connected.contains(&a));
        assert!(sets.disconnected.contains(&a));
    }
}
