//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Controller: wiring between the listener, the login dialogue and the engine
//!
//! The controller tracks every connection in exactly one of two places:
//!
//! - **pending**: accepted, login dialogue in progress
//! - **sessions**: logged in and admitted to the [`Engine`]
//!
//! Both collections and the engine sit behind one lock, so promotion from pending to admitted,
//! deregistration of a closed connection and a world tick never interleave. A connection that
//! closes while its login is finishing is either promoted and then removed, or never promoted;
//! it is never in both places and never in neither while still open.

use crate::{
    AuthResultSink, Authenticator, Engine, MudConfig, MudError, MudResult, Session,
};
use metrics::{gauge, histogram};
use mudlark_service::{Connection, ConnectionId, ConnectionSink, Input, TelnetListener};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Instruction for the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Keep ticking
    Continue,
    /// Stop the loop so the driver can rebuild and start again
    Restart,
    /// Stop the loop so the driver can exit
    Shutdown,
}

/// Sends [`LoopControl`] instructions to a running [`Controller::run`]
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<LoopControl>,
}

impl ControlHandle {
    /// Ask the main loop to return [`LoopControl::Restart`]
    pub fn restart(&self) {
        let _ = self.tx.send(LoopControl::Restart);
    }

    /// Ask the main loop to return [`LoopControl::Shutdown`]
    pub fn shutdown(&self) {
        let _ = self.tx.send(LoopControl::Shutdown);
    }
}

struct Roster {
    pending: HashMap<ConnectionId, Connection>,
    sessions: HashMap<ConnectionId, String>,
    engine: Box<dyn Engine>,
}

impl Roster {
    fn register(&mut self, connection: Connection) {
        self.pending.insert(connection.id(), connection);
    }

    /// Move a pending connection into the engine
    ///
    /// Hands the session back if the connection is no longer pending.
    fn promote(&mut self, session: Session) -> Result<(), Session> {
        let id = session.id();
        if self.pending.remove(&id).is_none() {
            return Err(session);
        }
        self.sessions.insert(id, session.name().to_string());
        self.engine.admit(session);
        Ok(())
    }

    /// Forget a connection wherever it is; unknown ids are ignored
    fn deregister(&mut self, id: ConnectionId) -> Option<Session> {
        if self.pending.remove(&id).is_some() {
            return None;
        }
        if self.sessions.remove(&id).is_some() {
            return self.engine.remove(id);
        }
        None
    }

    fn update_gauges(&self) {
        gauge!("mudlark.connections.pending").set(self.pending.len() as f64);
        gauge!("mudlark.sessions").set(self.sessions.len() as f64);
    }
}

struct Inner {
    config: MudConfig,
    authenticator: Authenticator,
    roster: Mutex<Roster>,
    auth_tasks: Mutex<JoinSet<()>>,
    listener: TelnetListener,
    control_tx: mpsc::UnboundedSender<LoopControl>,
    control_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<LoopControl>>,
    this: Weak<Inner>,
}

/// Registration target handed to the listener
///
/// Holds the controller weakly so the listener inside it does not keep it alive.
struct ListenerSink(Weak<Inner>);

impl ConnectionSink for ListenerSink {
    fn register(&self, connection: Connection, input: Input) {
        match self.0.upgrade() {
            Some(inner) => inner.register(connection, input),
            None => connection.kill(),
        }
    }

    fn deregister(&self, connection: &Connection) {
        if let Some(inner) = self.0.upgrade() {
            inner.deregister(connection);
        }
    }
}

impl Inner {
    fn register(&self, connection: Connection, input: Input) {
        info!(
            connection_id = %connection.id(),
            peer_addr = %connection.peer_addr(),
            "New connection"
        );
        {
            let mut roster = self.roster.lock();
            roster.register(connection.clone());
            roster.update_gauges();
        }

        let Some(inner) = self.this.upgrade() else {
            connection.kill();
            return;
        };
        let mut tasks = self.auth_tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            if let Err(error) = result {
                if !error.is_cancelled() {
                    warn!(%error, "Login task failed");
                }
            }
        }
        tasks.spawn(async move {
            inner
                .authenticator
                .serve(connection, input, inner.as_ref())
                .await;
        });
    }

    fn deregister(&self, connection: &Connection) {
        let id = connection.id();
        let mut roster = self.roster.lock();
        match roster.deregister(id) {
            Some(session) => {
                info!(connection_id = %id, name = %session.name(), "Player disconnected")
            }
            None => debug!(connection_id = %id, "Connection deregistered"),
        }
        roster.update_gauges();
    }
}

impl AuthResultSink for Inner {
    fn on_authenticated(&self, session: Session) {
        let id = session.id();
        let mut roster = self.roster.lock();
        match roster.promote(session) {
            Ok(()) => info!(connection_id = %id, "Player admitted"),
            Err(session) => {
                debug!(
                    connection_id = %id,
                    name = %session.name(),
                    "Connection closed before login completed"
                );
                session.connection().kill();
            }
        }
        roster.update_gauges();
    }
}

/// Owns the listener, the login dialogues and the engine, and drives the tick loop
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    /// Create a controller; nothing is bound until [`start`](Self::start)
    ///
    /// The authenticator's timeout is replaced by `config.auth_timeout`.
    pub fn new(config: MudConfig, authenticator: Authenticator, engine: Box<dyn Engine>) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let authenticator = authenticator.with_timeout(config.auth_timeout);
        let inner = Arc::new_cyclic(|this: &Weak<Inner>| Inner {
            listener: TelnetListener::new(
                config.server.clone(),
                Arc::new(ListenerSink(this.clone())),
            ),
            config,
            authenticator,
            roster: Mutex::new(Roster {
                pending: HashMap::new(),
                sessions: HashMap::new(),
                engine,
            }),
            auth_tasks: Mutex::new(JoinSet::new()),
            control_tx,
            control_rx: tokio::sync::Mutex::new(control_rx),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Validate the configuration and start accepting connections
    pub async fn start(&self) -> MudResult<SocketAddr> {
        self.inner.config.validate()?;
        let addr = self.inner.listener.start().await?;
        info!(%addr, "Systems online");
        Ok(addr)
    }

    /// Get a handle for stopping [`run`](Self::run) from elsewhere
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.inner.control_tx.clone(),
        }
    }

    /// Run the tick loop until a restart or shutdown is requested
    ///
    /// Each tick is followed by a sleep of whatever remains of the tick interval, so slow ticks
    /// do not push later ones back. An engine error ends the loop with that error.
    pub async fn run(&self) -> MudResult<LoopControl> {
        let mut control = self
            .inner
            .control_rx
            .try_lock()
            .map_err(|_| MudError::AlreadyRunning)?;
        let interval = self.inner.config.tick_interval;
        let started = Instant::now();

        loop {
            let tick_start = Instant::now();
            debug!(uptime = ?tick_start.duration_since(started), "Main tick");
            self.tick()?;
            let elapsed = tick_start.elapsed().as_secs_f64();
            histogram!("mudlark.tick.duration").record(elapsed);

            let deadline = tick_start + interval;
            loop {
                let message = tokio::select! {
                    () = tokio::time::sleep_until(deadline) => break,
                    message = control.recv() => message,
                };
                match message {
                    Some(LoopControl::Continue) => {}
                    Some(request) => {
                        info!(?request, "Main loop stopping");
                        return Ok(request);
                    }
                    // Unreachable while a sender lives in the controller.
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                }
            }
        }
    }

    /// Advance the engine by one tick
    pub fn tick(&self) -> MudResult<()> {
        self.inner.roster.lock().engine.tick()
    }

    /// Stop accepting, end every login dialogue and close every connection
    pub async fn shutdown(&self) -> MudResult<()> {
        info!("Shutting down");
        let mut tasks = std::mem::take(&mut *self.inner.auth_tasks.lock());
        tasks.shutdown().await;

        if self.inner.listener.is_running() {
            self.inner.listener.shutdown().await?;
        }

        // Anything the listener could not deregister in time.
        let mut roster = self.inner.roster.lock();
        let ids: Vec<ConnectionId> = roster
            .pending
            .keys()
            .chain(roster.sessions.keys())
            .copied()
            .collect();
        for id in ids {
            roster.deregister(id);
        }
        roster.update_gauges();
        Ok(())
    }

    /// Get the bound address, if started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.listener.local_addr()
    }

    /// Get the number of connections still logging in
    pub fn pending_count(&self) -> usize {
        self.inner.roster.lock().pending.len()
    }

    /// Get the number of logged-in players
    pub fn session_count(&self) -> usize {
        self.inner.roster.lock().sessions.len()
    }

    /// Get the number of players the engine holds
    pub fn player_count(&self) -> usize {
        self.inner.roster.lock().engine.len()
    }

    /// Get the names of logged-in players
    pub fn player_names(&self) -> Vec<String> {
        let mut names: Vec<String> = {
            let roster = self.inner.roster.lock();
            roster.sessions.values().cloned().collect()
        };
        names.sort();
        names
    }

    /// Whether the connection is still logging in
    pub fn is_pending(&self, id: ConnectionId) -> bool {
        self.inner.roster.lock().pending.contains_key(&id)
    }

    /// Whether the connection belongs to a logged-in player
    pub fn is_admitted(&self, id: ConnectionId) -> bool {
        self.inner.roster.lock().sessions.contains_key(&id)
    }
}

impl ConnectionSink for Controller {
    fn register(&self, connection: Connection, input: Input) {
        self.inner.register(connection, input);
    }

    fn deregister(&self, connection: &Connection) {
        self.inner.deregister(connection);
    }
}

impl AuthResultSink for Controller {
    fn on_authenticated(&self, session: Session) {
        self.inner.on_authenticated(session);
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.inner.config)
            .field("local_addr", &self.local_addr())
            .field("pending", &self.pending_count())
            .field("sessions", &self.session_count())
            .finish()
    }
}
