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

//! Telnet listener
//!
//! The TelnetListener accepts TCP connections and hands each one to the
//! [`ConnectionManager`], which supervises it independently of every other connection.
//! Construction never touches the network; binding happens in [`TelnetListener::start`].

use crate::{ConnectionManager, ConnectionSink, Result, ServerConfig, ServiceError};
use metrics::counter;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Telnet listener
///
/// # Example
///
/// ```no_run
/// use mudlark_service::{CallbackSink, ServerConfig, TelnetListener};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sink = Arc::new(CallbackSink::new(|connection, _input| {
///         let _ = connection.send_line("Hello!");
///     }));
///     let listener = TelnetListener::new(ServerConfig::default(), sink);
///     let addr = listener.start().await?;
///     println!("listening on {addr}");
///
///     tokio::signal::ctrl_c().await?;
///     listener.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct TelnetListener {
    /// Listener configuration
    config: ServerConfig,
    /// Receives every accepted connection
    sink: Arc<dyn ConnectionSink>,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// Address actually bound, once started
    local_addr: Mutex<Option<SocketAddr>>,
    /// Running flag
    running: AtomicBool,
    /// Stops the accept loop
    shutdown: Mutex<CancellationToken>,
    /// Accept loop task handle
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelnetListener {
    /// Create a listener; nothing is bound until [`start`](Self::start)
    pub fn new(config: ServerConfig, sink: Arc<dyn ConnectionSink>) -> Self {
        let manager = Arc::new(ConnectionManager::new(config.connection.clone()));
        Self {
            config,
            sink,
            manager,
            local_addr: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown: Mutex::new(CancellationToken::new()),
            accept_handle: Mutex::new(None),
        }
    }

    /// Bind the configured address and start accepting connections
    ///
    /// Returns the bound address, which differs from the configured one when port 0 was used.
    pub async fn start(&self) -> Result<SocketAddr> {
        self.config.validate().map_err(ServiceError::InvalidConfig)?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyRunning);
        }

        let listener = match TcpListener::bind(self.config.bind_address).await {
            Ok(listener) => listener,
            Err(error) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(error.into());
            }
        };
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);
        info!(%addr, "Telnet listener bound");

        let shutdown = CancellationToken::new();
        *self.shutdown.lock() = shutdown.clone();
        let handle = tokio::spawn(accept_loop(
            listener,
            self.manager.clone(),
            self.sink.clone(),
            self.config.max_connections,
            shutdown,
        ));
        *self.accept_handle.lock() = Some(handle);
        Ok(addr)
    }

    /// Stop accepting and close every connection
    ///
    /// Connections get up to the configured shutdown timeout to flush their output.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::ServerNotRunning);
        }
        info!("Shutting down telnet listener");

        self.shutdown.lock().cancel();
        let handle = self.accept_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                if !error.is_cancelled() {
                    warn!(%error, "Accept loop failed");
                }
            }
        }
        self.manager.shutdown(self.config.shutdown_timeout).await;
        *self.local_addr.lock() = None;

        info!("Telnet listener shutdown complete");
        Ok(())
    }

    /// Whether the listener is accepting connections
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the bound address, if started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get the connection manager
    pub fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Get the listener configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn accept_loop(
    listener: TcpListener,
    manager: Arc<ConnectionManager>,
    sink: Arc<dyn ConnectionSink>,
    max_connections: usize,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, peer_addr)) => {
                if manager.connection_count() >= max_connections {
                    warn!(%peer_addr, max_connections, "Connection limit reached, rejecting");
                    counter!("mudlark.connections.rejected").increment(1);
                    drop(socket);
                    continue;
                }
                if let Err(error) = socket.set_nodelay(true) {
                    debug!(%peer_addr, %error, "Failed to set TCP_NODELAY");
                }
                let id = manager.spawn(socket, peer_addr, sink.clone());
                counter!("mudlark.connections.accepted").increment(1);
                info!(connection_id = %id, %peer_addr, "Connection accepted");
            }
            Err(error) => {
                error!(%error, "Failed to accept connection");
                // Back off on errors to avoid a tight loop
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    info!("Accept loop terminated");
}

impl std::fmt::Debug for TelnetListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelnetListener")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .field("running", &self.is_running())
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl Drop for TelnetListener {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("TelnetListener dropped while still running");
            self.shutdown.lock().cancel();
        }
    }
}
