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

//! Connection lifecycle supervisor
//!
//! One [`ConnectionWorker`] owns one socket. It runs a receive pump and a send pump concurrently
//! and races them against the connection's kill signal. Whichever of these finishes first
//! decides the [`CloseReason`]; after that, teardown always takes the same path:
//!
//! 1. The remaining pumps are stopped and awaited. A stopped send pump first writes every item
//!    still queued, then the "Server closed connection." notice.
//! 2. The socket is shut down and dropped.
//! 3. [`ConnectionState::Closed`] is published, exactly once.

use crate::{CloseReason, Connection, ConnectionConfig, ConnectionId, ConnectionState, Input};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use mudlark_telnetcodec::{CodecResult, LineCodec, Outbound};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

/// Notice written to every connection as it is closed
pub const CLOSE_NOTICE: &str = "Server closed connection.";

/// Supervisor for a single connection's socket
pub struct ConnectionWorker<S> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: S,
    config: ConnectionConfig,
    output: mpsc::UnboundedReceiver<Outbound>,
    input: mpsc::UnboundedSender<String>,
    kill: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl<S> ConnectionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a stream, returning the worker along with the connection handle and its input reader
    ///
    /// Nothing is read or written until [`run`](Self::run) is awaited, but output may already be
    /// queued through the returned [`Connection`].
    pub fn new(
        stream: S,
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ConnectionConfig,
    ) -> (Self, Connection, Input) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);
        let kill = CancellationToken::new();

        let connection = Connection::new(id, peer_addr, output_tx, kill.clone(), state_rx);
        let input = Input::new(id, input_rx);
        let worker = Self {
            id,
            peer_addr,
            stream,
            config,
            output: output_rx,
            input: input_tx,
            kill,
            state: state_tx,
        };
        (worker, connection, input)
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run the connection until it closes
    ///
    /// Returns the trigger that ended it. By the time this returns the socket has been closed
    /// and [`Connection::closed`] has completed for every waiter.
    #[instrument(skip_all, fields(connection_id = %self.id, peer_addr = %self.peer_addr))]
    pub async fn run(self) -> CloseReason {
        let Self {
            id,
            peer_addr: _,
            stream,
            config,
            mut output,
            input,
            kill,
            state,
        } = self;

        gauge!("mudlark.connections.open").increment(1.0);
        debug!("Connection open");

        let (read_half, write_half) = tokio::io::split(stream);
        let codec = LineCodec::with_max_length(config.max_input_length);
        let mut reader = FramedRead::new(read_half, codec.clone());
        let mut writer = FramedWrite::new(write_half, codec);
        let stop = CancellationToken::new();

        let reason = {
            let receive = receive_pump(&mut reader, input, &stop, id);
            let preview_length = config.output_preview_length;
            let send = send_pump(&mut writer, &mut output, &stop, id, preview_length);
            tokio::pin!(receive, send);

            let mut receive_done = false;
            let mut send_done = false;
            let reason = tokio::select! {
                () = &mut receive => {
                    receive_done = true;
                    CloseReason::PeerClosed
                }
                result = &mut send => {
                    send_done = true;
                    match result {
                        Err(error) => {
                            if error.is_disconnect() {
                                debug!(%error, "Write failed");
                            } else {
                                warn!(%error, "Write failed");
                            }
                            CloseReason::WriteFailed
                        }
                        // The send pump only returns cleanly once stopped.
                        Ok(()) => CloseReason::Killed,
                    }
                }
                () = kill.cancelled() => CloseReason::Killed,
            };

            state.send_replace(ConnectionState::Closing);
            debug!(%reason, "Closing connection");
            stop.cancel();
            if !receive_done {
                (&mut receive).await;
            }
            if !send_done {
                if let Err(error) = (&mut send).await {
                    debug!(%error, "Final flush failed");
                }
            }
            reason
        };

        let mut stream = reader.into_inner().unsplit(writer.into_inner());
        if let Err(error) = stream.shutdown().await {
            debug!(%error, "Socket shutdown failed");
        }
        drop(stream);

        // Refuse anything queued from now on.
        output.close();
        state.send_replace(ConnectionState::Closed);

        gauge!("mudlark.connections.open").decrement(1.0);
        counter!("mudlark.connections.closed", "reason" => reason.as_str())
            .increment(1);
        debug!(%reason, "Connection closed");
        reason
    }
}

impl<S> std::fmt::Debug for ConnectionWorker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Move decoded lines from the socket to the input queue until end of stream or stop
async fn receive_pump<R>(
    reader: &mut FramedRead<R, LineCodec>,
    input: mpsc::UnboundedSender<String>,
    stop: &CancellationToken,
    id: ConnectionId,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => return,
            next = reader.next() => next,
        };
        match next {
            Some(Ok(line)) => {
                trace!(connection_id = %id, length = line.len(), "Line received");
                counter!("mudlark.lines.received").increment(1);
                // Nobody reading anymore; keep consuming so the peer's EOF is still seen.
                let _ = input.send(line);
            }
            Some(Err(error)) => {
                if error.is_disconnect() {
                    debug!(connection_id = %id, %error, "Read failed");
                } else {
                    warn!(connection_id = %id, %error, "Read failed");
                }
                return;
            }
            None => {
                debug!(connection_id = %id, "Peer closed connection");
                return;
            }
        }
    }
}

/// Write queued output to the socket until stopped or a write fails
///
/// On stop, everything still queued is written, followed by [`CLOSE_NOTICE`].
async fn send_pump<W>(
    writer: &mut FramedWrite<W, LineCodec>,
    output: &mut mpsc::UnboundedReceiver<Outbound>,
    stop: &CancellationToken,
    id: ConnectionId,
    preview_length: usize,
) -> CodecResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            next = output.recv() => next,
        };
        let Some(item) = next else {
            // Every handle is gone; nothing more can be queued.
            stop.cancelled().await;
            break;
        };
        feed(writer, item, id, preview_length).await?;
        while let Ok(item) = output.try_recv() {
            feed(writer, item, id, preview_length).await?;
        }
        writer.flush().await?;
    }

    output.close();
    while let Ok(item) = output.try_recv() {
        feed(writer, item, id, preview_length).await?;
    }
    feed(writer, Outbound::line(CLOSE_NOTICE), id, preview_length).await?;
    writer.flush().await
}

async fn feed<W>(
    writer: &mut FramedWrite<W, LineCodec>,
    item: Outbound,
    id: ConnectionId,
    preview_length: usize,
) -> CodecResult<()>
where
    W: AsyncWrite + Unpin,
{
    trace!(connection_id = %id, output = %item.preview(preview_length), "Sending");
    counter!("mudlark.messages.sent").increment(1);
    writer.feed(item).await
}
