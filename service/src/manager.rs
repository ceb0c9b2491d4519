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

//! Connection manager
//!
//! The ConnectionManager is responsible for:
//! - Assigning connection ids
//! - Spawning and owning every connection's supervisor task
//! - Registering and deregistering connections with a [`ConnectionSink`]
//! - Collective shutdown

use crate::{
    Connection, ConnectionConfig, ConnectionId, ConnectionSink, ConnectionWorker, Result,
    ServiceError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Connection manager
pub struct ConnectionManager {
    /// Live connections (lock-free concurrent map)
    connections: Arc<DashMap<ConnectionId, Connection>>,
    /// Supervisor tasks, one per connection
    workers: Mutex<JoinSet<()>>,
    /// Next connection ID (monotonically increasing)
    next_id: AtomicU64,
    /// Settings handed to every connection
    config: ConnectionConfig,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            workers: Mutex::new(JoinSet::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Take ownership of a stream and supervise it until it closes
    ///
    /// The connection is registered with `sink` before its socket is serviced and deregistered
    /// after the socket has closed.
    pub fn spawn<S>(
        &self,
        stream: S,
        peer_addr: SocketAddr,
        sink: Arc<dyn ConnectionSink>,
    ) -> ConnectionId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.next_connection_id();
        let (worker, connection, input) =
            ConnectionWorker::new(stream, id, peer_addr, self.config.clone());
        self.connections.insert(id, connection.clone());

        let connections = self.connections.clone();
        let mut workers = self.workers.lock();
        while let Some(result) = workers.try_join_next() {
            log_join(result);
        }
        workers.spawn(async move {
            sink.register(connection.clone(), input);
            let reason = worker.run().await;
            connections.remove(&id);
            sink.deregister(&connection);
            debug!(connection_id = %id, %reason, "Connection deregistered");
        });
        id
    }

    /// Get a connection by ID
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Close one connection and wait until its socket is closed
    pub async fn close_connection(&self, id: ConnectionId) -> Result<()> {
        let connection = self.get(id).ok_or(ServiceError::ConnectionNotFound(id))?;
        connection.close().await;
        Ok(())
    }

    /// Close every connection and wait for all supervisor tasks
    ///
    /// Tasks still running after `timeout` are aborted. Tasks that already finished or were
    /// cancelled are not errors.
    pub async fn shutdown(&self, timeout: Duration) {
        let count = self.connections.len();
        for entry in self.connections.iter() {
            entry.value().kill();
        }

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = workers.join_next().await {
                log_join(result);
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = workers.len(),
                "Connections did not close in time, aborting"
            );
            workers.shutdown().await;
        }

        self.connections.clear();
        info!(connections = count, "Connection manager shut down");
    }
}

fn log_join(result: std::result::Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(error) if error.is_cancelled() => {}
        Err(error) => warn!(%error, "Connection task failed"),
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
