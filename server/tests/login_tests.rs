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

//! Login dialogue scenarios over loopback TCP

use mudlark_server::{
    AccountStore, Authenticator, Controller, CredentialHasher, MemoryStore, MudConfig, World,
};
use mudlark_service::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const WILL_ECHO: &[u8] = &[0xFF, 0xFB, 0x01];
const WONT_ECHO: &[u8] = &[0xFF, 0xFC, 0x01];
const MOTD: &str = "Welcome, adventurer.";
const CLOSE_NOTICE_LINE: &[u8] = b"Server closed connection.\r\n";
const WAIT: Duration = Duration::from_secs(10);

fn hasher() -> CredentialHasher {
    CredentialHasher::with_params(8, 1, 1).unwrap()
}

async fn start(auth_timeout: Option<Duration>) -> (Controller, Arc<MemoryStore>, SocketAddr) {
    let store = Arc::new(MemoryStore::new());
    store.insert_text("LOGIN", "Mudlark test realm");
    store.insert_text("MOTD", MOTD);
    let authenticator = Authenticator::new(store.clone(), store.clone())
        .with_hasher(hasher());
    let config = MudConfig::new(ServerConfig::new("127.0.0.1:0".parse().unwrap()))
        .with_auth_timeout(auth_timeout);
    let controller = Controller::new(config, authenticator, Box::new(World::new()));
    let addr = controller.start().await.unwrap();
    (controller, store, addr)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// A scripted telnet client that records everything the server sends
struct Client {
    stream: TcpStream,
    transcript: Vec<u8>,
    cursor: usize,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            transcript: Vec::new(),
            cursor: 0,
        }
    }

    /// Read until `text` appears after everything already matched
    async fn expect(&mut self, text: &str) {
        let needle = text.as_bytes();
        let found = tokio::time::timeout(WAIT, async {
            loop {
                if let Some(pos) = self.transcript[self.cursor..]
                    .windows(needle.len())
                    .position(|w| w == needle)
                {
                    self.cursor += pos + needle.len();
                    return true;
                }
                let mut buf = [0u8; 1024];
                let n = self.stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return false;
                }
                self.transcript.extend_from_slice(&buf[..n]);
            }
        })
        .await;
        assert!(
            matches!(found, Ok(true)),
            "expected {text:?}, got {:?}",
            String::from_utf8_lossy(&self.transcript[self.cursor..])
        );
    }

    async fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Read until the server closes the socket
    async fn expect_closed(&mut self) {
        tokio::time::timeout(WAIT, self.stream.read_to_end(&mut self.transcript))
            .await
            .expect("server did not close")
            .unwrap();
    }

    fn echo_balance(&self) -> (usize, usize) {
        (
            count(&self.transcript, WILL_ECHO),
            count(&self.transcript, WONT_ECHO),
        )
    }
}

#[tokio::test]
async fn test_fresh_login_registers_and_admits() {
    let (controller, store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;

    client.expect("Mudlark test realm\r\n\r\nName: ").await;
    client.send("alice").await;
    client.expect("Create a new user named 'alice'? (y/n) ").await;
    client.send("y").await;
    client.expect("Password: ").await;
    client.send("hunter2").await;
    client.expect("Repeat password: ").await;
    client.send("hunter2").await;
    client.expect(MOTD).await;

    wait_until(|| controller.session_count() == 1).await;
    assert_eq!(controller.pending_count(), 0);
    assert_eq!(controller.player_count(), 1);
    assert_eq!(controller.player_names(), vec!["alice".to_string()]);

    let account = store.find_account("ALICE").await.unwrap().unwrap();
    let verified = hasher().verify("hunter2", &account.credential).await;
    assert!(verified.unwrap());
    assert_eq!(store.account_count(), 1);
    assert_eq!(client.echo_balance(), (2, 2));

    controller.shutdown().await.unwrap();
    client.expect_closed().await;
    assert_eq!(controller.session_count(), 0);
    assert_eq!(controller.player_count(), 0);
}

#[tokio::test]
async fn test_existing_login_wrong_password_closes() {
    let (controller, store, addr) = start(None).await;
    store
        .create_account("alice", hasher().hash("hunter2").await.unwrap())
        .await
        .unwrap();
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("Alice").await;
    client.expect("Password: ").await;
    client.send("swordfish").await;
    client.expect("Invalid password.").await;
    client.expect_closed().await;

    assert!(client.transcript.ends_with(CLOSE_NOTICE_LINE));
    assert_eq!(client.echo_balance(), (1, 1));
    wait_until(|| controller.pending_count() == 0).await;
    assert_eq!(controller.session_count(), 0);

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_existing_login_right_password() {
    let (controller, store, addr) = start(None).await;
    store
        .create_account("alice", hasher().hash("hunter2").await.unwrap())
        .await
        .unwrap();
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("alice").await;
    client.expect("Password: ").await;
    client.send("hunter2").await;
    client.expect(MOTD).await;

    wait_until(|| controller.session_count() == 1).await;
    assert_eq!(client.echo_balance(), (1, 1));
    assert_eq!(store.account_count(), 1);

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abandoned_registration_restarts_at_name() {
    let (controller, store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("bob").await;
    client.expect("Create a new user named 'bob'? (y/n) ").await;
    client.send("n").await;
    client.expect("Name: ").await;

    assert_eq!(controller.pending_count(), 1);
    assert!(store.find_account("bob").await.unwrap().is_none());

    // The dialogue is still live and still the only one.
    client.send("bob").await;
    client.expect("Create a new user named 'bob'? (y/n) ").await;
    assert_eq!(controller.pending_count(), 1);
    assert_eq!(client.echo_balance(), (0, 0));

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_blank_names_are_skipped() {
    let (controller, _store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("").await;
    client.send("   ").await;
    client.send("carol").await;
    client.expect("Create a new user named 'carol'? (y/n) ").await;

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mismatched_passwords_repeat_the_pair() {
    let (controller, store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("dave").await;
    client.expect("(y/n) ").await;
    client.send("Yes").await;

    client.expect("Password: ").await;
    client.send("abc").await;
    client.expect("Repeat password: ").await;
    client.send("xyz").await;
    client.expect("Passwords do not match.").await;
    assert!(store.find_account("dave").await.unwrap().is_none());

    // A blank entry is asked for again.
    client.expect("Password: ").await;
    client.send("").await;
    client.expect("Password: ").await;
    client.send("abc").await;
    client.expect("Repeat password: ").await;
    client.send("abc").await;
    client.expect(MOTD).await;

    let account = store.find_account("dave").await.unwrap().unwrap();
    assert!(hasher().verify("abc", &account.credential).await.unwrap());
    assert!(!hasher().verify("xyz", &account.credential).await.unwrap());
    assert_eq!(store.account_count(), 1);
    assert_eq!(client.echo_balance(), (5, 5));

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_during_login_is_deregistered() {
    let (controller, _store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;
    client.expect("Name: ").await;
    wait_until(|| controller.pending_count() == 1).await;

    drop(client);
    wait_until(|| controller.pending_count() == 0).await;
    assert_eq!(controller.session_count(), 0);

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_login_timeout_closes_connection() {
    let (controller, _store, addr) = start(Some(Duration::from_secs(1))).await;
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("erin").await;
    client.expect("(y/n) ").await;
    client.send("y").await;
    client.expect("Password: ").await;
    client.expect("Login timed out.").await;
    client.expect_closed().await;

    // Echo suppression was lifted even though the dialogue was cut short.
    assert_eq!(client.echo_balance(), (1, 1));
    wait_until(|| controller.pending_count() == 0).await;

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logged_in_player_disconnect_leaves_world() {
    let (controller, _store, addr) = start(None).await;
    let mut client = Client::connect(addr).await;

    client.expect("Name: ").await;
    client.send("frank").await;
    client.expect("(y/n) ").await;
    client.send("y").await;
    client.expect("Password: ").await;
    client.send("pw").await;
    client.expect("Repeat password: ").await;
    client.send("pw").await;
    client.expect(MOTD).await;
    wait_until(|| controller.player_count() == 1).await;

    drop(client);
    wait_until(|| controller.player_count() == 0).await;
    assert_eq!(controller.session_count(), 0);
    assert_eq!(controller.pending_count(), 0);

    controller.shutdown().await.unwrap();
}
