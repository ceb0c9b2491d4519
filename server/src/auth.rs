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

//! Login dialogue
//!
//! [`Authenticator`] walks a freshly accepted connection from the name prompt to a verified
//! [`Account`]:
//!
//! ```text
//! PromptName ─→ LookupIdentity ─found─→ PromptPassword ─match─→ Authenticated
//!     ↑               │                       └─mismatch─→ failed, connection closed
//!     │           not found
//!     │               ↓
//!     └──no── ConfirmRegistration ─yes─→ PasswordSetup ─→ Authenticated
//! ```
//!
//! A wrong password ends the attempt and closes the connection. Registration asks for the new
//! password twice and repeats the pair until both entries are non-blank and equal.
//!
//! Password entry is bracketed by `IAC WILL ECHO` / `IAC WONT ECHO`. The disable is tied to a
//! drop guard, so it is sent on every exit path, including a dialogue cut short by the timeout.

use crate::store::{LOGIN_TEXT, MOTD_TEXT};
use crate::{
    Account, AccountStore, CredentialError, CredentialHasher, StoreError, TextStore,
    text_or_placeholder,
};
use metrics::counter;
use mudlark_service::{Connection, ConnectionId, Input, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Prompt for the account name
pub const NAME_PROMPT: &str = "Name: ";
/// Prompt for a password
pub const PASSWORD_PROMPT: &str = "Password: ";
/// Prompt for the repeated password during registration
pub const CONFIRM_PASSWORD_PROMPT: &str = "Repeat password: ";
/// Sent when a login password does not match
pub const INVALID_PASSWORD: &str = "Invalid password.";
/// Sent when the two registration passwords differ
pub const PASSWORD_MISMATCH: &str = "Passwords do not match.";
/// Sent when the login timeout expires
pub const TIMED_OUT: &str = "Login timed out.";

/// Why a login dialogue ended without an account
#[derive(Debug, Error)]
pub enum AuthError {
    /// The connection stopped delivering input
    #[error("Connection closed during login")]
    Disconnected,

    /// The password did not match the stored credential
    #[error("Invalid password")]
    InvalidPassword,

    /// The login timeout expired
    #[error("Login timed out")]
    TimedOut,

    /// The account or text store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Hashing or verification failed
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Connection failure other than a closed connection
    #[error("Service error: {0}")]
    Service(ServiceError),
}

impl From<ServiceError> for AuthError {
    fn from(error: ServiceError) -> Self {
        match error {
            error if error.is_disconnect() => AuthError::Disconnected,
            error => AuthError::Service(error),
        }
    }
}

impl AuthError {
    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthError::Disconnected => "disconnected",
            AuthError::InvalidPassword => "invalid_password",
            AuthError::TimedOut => "timed_out",
            AuthError::Store(_) => "store",
            AuthError::Credential(_) => "credential",
            AuthError::Service(_) => "service",
        }
    }
}

/// An authenticated player's connection
///
/// Owns the connection's [`Input`]; whoever holds the session is the one reading the player's
/// commands.
#[derive(Debug)]
pub struct Session {
    connection: Connection,
    input: Input,
    account: Account,
}

impl Session {
    /// Bind a connection and its input to an account
    pub fn new(connection: Connection, input: Input, account: Account) -> Self {
        Self {
            connection,
            input,
            account,
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Get the account name
    pub fn name(&self) -> &str {
        &self.account.name
    }

    /// Get the account
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Get the connection handle
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Queue a line of text for the player
    pub fn send_line(&self, text: impl Into<String>) -> Result<(), ServiceError> {
        self.connection.send_line(text)
    }

    /// Take the next command if one has arrived
    pub fn try_next_line(&mut self) -> Option<String> {
        self.input.try_next_line()
    }

    /// Wait for the next command
    pub async fn next_line(&mut self) -> Option<String> {
        self.input.next_line().await
    }

    /// Close the connection and wait for it to finish
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

/// Receiver of successfully authenticated sessions
pub trait AuthResultSink: Send + Sync + 'static {
    /// A login dialogue finished; the sink now owns the session
    fn on_authenticated(&self, session: Session);
}

enum AuthState {
    PromptName,
    LookupIdentity(String),
    PromptPassword(Account),
    ConfirmRegistration(String),
    PasswordSetup(String),
    Authenticated(Account),
}

/// Runs the login dialogue
#[derive(Clone)]
pub struct Authenticator {
    accounts: Arc<dyn AccountStore>,
    texts: Arc<dyn TextStore>,
    hasher: CredentialHasher,
    timeout: Option<Duration>,
}

impl Authenticator {
    /// Create an authenticator over the given stores
    pub fn new(accounts: Arc<dyn AccountStore>, texts: Arc<dyn TextStore>) -> Self {
        Self {
            accounts,
            texts,
            hasher: CredentialHasher::default(),
            timeout: None,
        }
    }

    /// Use a specific credential hasher
    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Bound the whole dialogue
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the dialogue on a newly accepted connection and hand the result to `sink`
    ///
    /// On success the session goes to [`AuthResultSink::on_authenticated`]. On any failure the
    /// connection is killed; a timeout first tells the player why.
    #[instrument(
        skip_all,
        fields(connection_id = %connection.id(), peer_addr = %connection.peer_addr())
    )]
    pub async fn serve(&self, connection: Connection, mut input: Input, sink: &dyn AuthResultSink) {
        let outcome = match self.timeout {
            Some(limit) => {
                let dialogue = self.authenticate(&connection, &mut input);
                match tokio::time::timeout(limit, dialogue).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(AuthError::TimedOut),
                }
            }
            None => self.authenticate(&connection, &mut input).await,
        };

        match outcome {
            Ok(account) => {
                counter!("mudlark.auth.succeeded").increment(1);
                info!(account = %account.name, "Login succeeded");
                sink.on_authenticated(Session::new(connection, input, account));
            }
            Err(error) => {
                counter!("mudlark.auth.failed", "reason" => error.as_str())
                    .increment(1);
                match &error {
                    AuthError::Disconnected | AuthError::Service(_) => {
                        debug!(%error, "Login abandoned");
                    }
                    AuthError::InvalidPassword => info!("Login failed: invalid password"),
                    AuthError::TimedOut => {
                        info!("Login timed out");
                        let _ = connection.send_line(TIMED_OUT);
                    }
                    AuthError::Store(_) | AuthError::Credential(_) => {
                        warn!(%error, "Login failed");
                    }
                }
                connection.kill();
            }
        }
    }

    /// Run the dialogue, returning the verified account
    ///
    /// Does not close the connection on failure; see [`serve`](Self::serve).
    pub async fn authenticate(
        &self,
        connection: &Connection,
        input: &mut Input,
    ) -> Result<Account, AuthError> {
        let mut state = AuthState::PromptName;
        loop {
            state = match state {
                AuthState::PromptName => {
                    let banner = text_or_placeholder(&*self.texts, LOGIN_TEXT).await?;
                    connection.send_line(banner)?;
                    connection.send_line("")?;
                    connection.send_prompt(NAME_PROMPT)?;
                    let name = loop {
                        let line = next_line(input).await?;
                        if !line.trim().is_empty() {
                            break line.trim().to_string();
                        }
                    };
                    AuthState::LookupIdentity(name)
                }
                AuthState::LookupIdentity(name) => match self.accounts.find_account(&name).await? {
                    Some(account) => AuthState::PromptPassword(account),
                    None => AuthState::ConfirmRegistration(name),
                },
                AuthState::PromptPassword(account) => {
                    let attempt = read_secret(connection, input, PASSWORD_PROMPT).await?;
                    if self.hasher.verify(&attempt, &account.credential).await? {
                        AuthState::Authenticated(account)
                    } else {
                        connection.send_line(INVALID_PASSWORD)?;
                        return Err(AuthError::InvalidPassword);
                    }
                }
                AuthState::ConfirmRegistration(name) => {
                    connection.send_prompt(format!(
                        "User not found.  Create a new user named '{name}'? (y/n) "
                    ))?;
                    let answer = next_line(input).await?;
                    if answer.starts_with(['y', 'Y']) {
                        AuthState::PasswordSetup(name)
                    } else {
                        AuthState::PromptName
                    }
                }
                AuthState::PasswordSetup(name) => {
                    let credential = loop {
                        let first = read_nonblank_secret(connection, input, PASSWORD_PROMPT).await?;
                        let second =
                            read_nonblank_secret(connection, input, CONFIRM_PASSWORD_PROMPT).await?;
                        if first == second {
                            break self.hasher.hash(&first).await?;
                        }
                        connection.send_line(PASSWORD_MISMATCH)?;
                    };
                    match self.accounts.create_account(&name, credential).await {
                        Ok(account) => {
                            counter!("mudlark.auth.registered").increment(1);
                            AuthState::Authenticated(account)
                        }
                        Err(StoreError::AlreadyExists(_)) => {
                            connection.send_line(format!("The name '{name}' was just taken."))?;
                            AuthState::PromptName
                        }
                        Err(error) => return Err(error.into()),
                    }
                }
                AuthState::Authenticated(account) => {
                    let motd = text_or_placeholder(&*self.texts, MOTD_TEXT).await?;
                    connection.send_line(motd)?;
                    return Ok(account);
                }
            };
        }
    }
}

async fn next_line(input: &mut Input) -> Result<String, AuthError> {
    input.next_line().await.ok_or(AuthError::Disconnected)
}

/// Echo suppression that is lifted when dropped
struct PasswordMode<'a> {
    connection: &'a Connection,
}

impl<'a> PasswordMode<'a> {
    fn enable(connection: &'a Connection) -> Result<Self, AuthError> {
        connection.set_password_mode(true)?;
        Ok(Self { connection })
    }
}

impl Drop for PasswordMode<'_> {
    fn drop(&mut self) {
        let _ = self.connection.set_password_mode(false);
    }
}

/// Prompt and read one line with local echo suppressed
async fn read_secret(
    connection: &Connection,
    input: &mut Input,
    prompt: &str,
) -> Result<String, AuthError> {
    let _echo = PasswordMode::enable(connection)?;
    connection.send_prompt(prompt)?;
    let secret = next_line(input).await?;
    // The player's Enter was not echoed either.
    connection.send_line("")?;
    Ok(secret)
}

async fn read_nonblank_secret(
    connection: &Connection,
    input: &mut Input,
    prompt: &str,
) -> Result<String, AuthError> {
    loop {
        let secret = read_secret(connection, input, prompt).await?;
        if !secret.is_empty() {
            return Ok(secret);
        }
    }
}
