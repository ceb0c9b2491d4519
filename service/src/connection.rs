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

//! Connection handle and input reader
//!
//! A connection is split in two:
//!
//! - [`Connection`] is a cheap, cloneable handle used to queue output, toggle password mode and
//!   request or await closure.
//! - [`Input`] is the single owned reader of the connection's input queue. Whoever holds it is
//!   the one party reading lines; handing it over (for example from the login dialogue to a game
//!   session) is an explicit move.
//!
//! The socket itself is owned by the [`ConnectionWorker`](crate::ConnectionWorker).

use crate::{ConnectionId, ConnectionState, Result, ServiceError};
use bytes::Bytes;
use metrics::counter;
use mudlark_telnetcodec::Outbound;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Handle to a live connection
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: ConnectionId,
    peer_addr: SocketAddr,
    output: mpsc::UnboundedSender<Outbound>,
    kill: CancellationToken,
    state: watch::Receiver<ConnectionState>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        output: mpsc::UnboundedSender<Outbound>,
        kill: CancellationToken,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id,
                peer_addr,
                output,
                kill,
                state,
            }),
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Queue an item for transmission
    ///
    /// Never waits for the network. Fails once the transmit queue has been torn down.
    pub fn send(&self, item: impl Into<Outbound>) -> Result<()> {
        let item = item.into();
        trace!(connection_id = %self.inner.id, text = item.is_text(), "Queueing output");
        self.inner
            .output
            .send(item)
            .map_err(|_| ServiceError::ConnectionClosed)
    }

    /// Queue a line of text, terminated with CR LF on the wire
    pub fn send_line(&self, text: impl Into<String>) -> Result<()> {
        self.send(Outbound::Line(text.into()))
    }

    /// Queue a prompt, sent without a line terminator
    pub fn send_prompt(&self, text: impl Into<String>) -> Result<()> {
        self.send(Outbound::Prompt(text.into()))
    }

    /// Queue pre-encoded bytes, sent verbatim
    pub fn send_raw(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.send(Outbound::Raw(bytes.into()))
    }

    /// Ask the client to stop (`true`) or resume (`false`) local echo
    ///
    /// Input is still delivered line by line while password mode is on.
    pub fn set_password_mode(&self, enabled: bool) -> Result<()> {
        counter!("mudlark.password_mode.toggled", "enabled" => enabled.to_string())
            .increment(1);
        self.send(Outbound::password_mode(enabled))
    }

    /// Raise the kill signal
    ///
    /// Returns immediately; use [`closed`](Self::closed) to wait for the socket to close.
    /// Raising it more than once has no further effect.
    pub fn kill(&self) {
        if !self.inner.kill.is_cancelled() {
            debug!(connection_id = %self.inner.id, "Kill requested");
        }
        self.inner.kill.cancel();
    }

    /// Whether the kill signal has been raised
    pub fn is_kill_requested(&self) -> bool {
        self.inner.kill.is_cancelled()
    }

    /// Wait until the connection is fully closed
    ///
    /// Completes only after the socket has been shut down, never merely because the kill signal
    /// was raised.
    pub async fn closed(&self) {
        let mut state = self.inner.state.clone();
        // An error means the worker is gone, and its socket with it.
        let _ = state.wait_for(|s| s.is_terminal()).await;
    }

    /// Raise the kill signal and wait for the connection to close
    pub async fn close(&self) {
        self.kill();
        self.closed().await;
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether the connection has finished closing
    pub fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// The owned reader of a connection's input queue
///
/// Lines arrive fully decoded: telnet commands stripped, trimmed and length capped.
pub struct Input {
    id: ConnectionId,
    lines: mpsc::UnboundedReceiver<String>,
}

impl Input {
    pub(crate) fn new(id: ConnectionId, lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self { id, lines }
    }

    /// The connection this input belongs to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next line
    ///
    /// Returns `None` once the connection has stopped receiving and every buffered line has been
    /// read.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Take the next line if one is already buffered
    pub fn try_next_line(&mut self) -> Option<String> {
        self.lines.try_recv().ok()
    }
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input")
            .field("id", &self.id)
            .field("buffered", &self.lines.len())
            .finish()
    }
}
