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

//! Listener and connection lifecycle tests over loopback TCP

use mudlark_service::{
    CallbackSink, Connection, ConnectionState, Input, ServerConfig, TelnetListener,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

struct Harness {
    listener: TelnetListener,
    registered: mpsc::UnboundedReceiver<(Connection, Input)>,
    deregistered: Arc<AtomicUsize>,
}

async fn start(config: ServerConfig) -> (Harness, std::net::SocketAddr) {
    let (tx, registered) = mpsc::unbounded_channel();
    let deregistered = Arc::new(AtomicUsize::new(0));
    let counter = deregistered.clone();
    let sink = CallbackSink::new(move |connection, input| {
        let _ = tx.send((connection, input));
    })
    .with_deregister(move |_connection| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let listener = TelnetListener::new(config, Arc::new(sink));
    let addr = listener.start().await.unwrap();
    (
        Harness {
            listener,
            registered,
            deregistered,
        },
        addr,
    )
}

fn loopback() -> ServerConfig {
    ServerConfig::new("127.0.0.1:0".parse().unwrap())
}

async fn read_all(mut client: TcpStream) -> String {
    let mut received = Vec::new();
    client.read_to_end(&mut received).await.unwrap();
    String::from_utf8_lossy(&received).into_owned()
}

#[tokio::test]
async fn test_lines_are_delivered_without_telnet_commands() {
    let (mut harness, addr) = start(loopback()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    let (_connection, mut input) = harness.registered.recv().await.unwrap();

    client
        .write_all(b"\xff\xfb\x1fnorth\r\n\xff\xfa\x18\x00xterm\xff\xf0  south  \r\n")
        .await
        .unwrap();
    assert_eq!(input.next_line().await.as_deref(), Some("north"));
    assert_eq!(input.next_line().await.as_deref(), Some("south"));

    harness.listener.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peer_eof_fires_closed_once() {
    let (mut harness, addr) = start(loopback()).await;
    let client = TcpStream::connect(addr).await.unwrap();
    let (connection, mut input) = harness.registered.recv().await.unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let connection = connection.clone();
            tokio::spawn(async move { connection.closed().await })
        })
        .collect();

    drop(client);
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(input.next_line().await, None);

    harness.listener.shutdown().await.unwrap();
    assert_eq!(harness.deregistered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_kill_waits_for_socket_close() {
    let (mut harness, addr) = start(loopback()).await;
    let client = TcpStream::connect(addr).await.unwrap();
    let (connection, _input) = harness.registered.recv().await.unwrap();

    connection.kill();
    connection.kill();
    connection.closed().await;
    assert!(connection.is_closed());

    // Closed means the socket is gone: the client reads the notice and then EOF.
    assert_eq!(read_all(client).await, "Server closed connection.\r\n");
    harness.listener.shutdown().await.unwrap();
    assert_eq!(harness.deregistered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_queued_output_survives_kill() {
    let (mut harness, addr) = start(loopback()).await;
    let client = TcpStream::connect(addr).await.unwrap();
    let (connection, _input) = harness.registered.recv().await.unwrap();

    for n in 0..500 {
        connection.send_line(format!("line {n}")).unwrap();
    }
    connection.close().await;
    assert!(connection.send_line("after close").is_err());

    let received = read_all(client).await;
    let lines: Vec<&str> = received.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 501);
    assert_eq!(lines[0], "line 0");
    assert_eq!(lines[499], "line 499");
    assert_eq!(lines[500], "Server closed connection.");

    harness.listener.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_password_mode_sends_echo_negotiation() {
    let (mut harness, addr) = start(loopback()).await;
    let client = TcpStream::connect(addr).await.unwrap();
    let (connection, _input) = harness.registered.recv().await.unwrap();

    connection.send_prompt("Password: ").unwrap();
    connection.set_password_mode(true).unwrap();
    connection.set_password_mode(false).unwrap();
    connection.close().await;

    let mut client = client;
    let mut received = Vec::new();
    client.read_to_end(&mut received).await.unwrap();
    let mut expected = b"Password: \xff\xfb\x01\xff\xfc\x01".to_vec();
    expected.extend_from_slice(b"Server closed connection.\r\n");
    assert_eq!(received, expected);

    harness.listener.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_limit_rejects_extra_clients() {
    let (mut harness, addr) = start(loopback().with_max_connections(1)).await;
    let _first = TcpStream::connect(addr).await.unwrap();
    let _registered = harness.registered.recv().await.unwrap();

    let second = TcpStream::connect(addr).await.unwrap();
    // Rejected sockets are closed without a word.
    let received = tokio::time::timeout(Duration::from_secs(5), read_all(second))
        .await
        .unwrap();
    assert!(received.is_empty());
    assert_eq!(harness.listener.connection_count(), 1);

    harness.listener.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_every_connection() {
    let (mut harness, addr) = start(loopback()).await;
    let mut clients = Vec::new();
    let mut connections = Vec::new();
    for _ in 0..5 {
        clients.push(TcpStream::connect(addr).await.unwrap());
        connections.push(harness.registered.recv().await.unwrap().0);
    }
    assert_eq!(harness.listener.connection_count(), 5);

    harness.listener.shutdown().await.unwrap();
    assert_eq!(harness.listener.connection_count(), 0);
    assert!(connections.iter().all(Connection::is_closed));
    assert_eq!(harness.deregistered.load(Ordering::SeqCst), 5);
    for client in clients {
        assert_eq!(read_all(client).await, "Server closed connection.\r\n");
    }
}
