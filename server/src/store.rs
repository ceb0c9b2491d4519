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

//! Account and text fixture storage
//!
//! The login dialogue only needs three lookups: fetch an account by name, create one, and fetch
//! a named block of static text (banner, message of the day). [`MemoryStore`] provides all three
//! in memory and can be seeded from a directory of `*.txt` files.

use crate::Credential;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the text shown before the name prompt
pub const LOGIN_TEXT: &str = "LOGIN";

/// Name of the text shown after a successful login
pub const MOTD_TEXT: &str = "MOTD";

const DEFAULT_LOGIN: &str = "Welcome to Mudlark.";
const DEFAULT_MOTD: &str = "There is no news today.";

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// An account with this name already exists
    #[error("Account '{0}' already exists")]
    AlreadyExists(String),

    /// The name cannot be used for an account
    #[error("Invalid account name '{0}'")]
    InvalidName(String),

    /// Reading fixtures failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A registered player account
#[derive(Debug, Clone)]
pub struct Account {
    /// Store-assigned identifier
    pub id: u64,
    /// Name as first registered
    pub name: String,
    /// Password hash
    pub credential: Credential,
}

/// Persistent accounts
///
/// Names are case-insensitive: `Alice` and `alice` are the same account.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Look up an account by name
    async fn find_account(&self, name: &str) -> StoreResult<Option<Account>>;

    /// Create an account; fails with [`StoreError::AlreadyExists`] if the name is taken
    async fn create_account(&self, name: &str, credential: Credential) -> StoreResult<Account>;
}

/// Named blocks of static text
#[async_trait]
pub trait TextStore: Send + Sync + 'static {
    /// Look up a text fixture by name
    async fn find_text(&self, name: &str) -> StoreResult<Option<String>>;
}

/// Look up a text fixture, substituting a placeholder when it is missing
pub async fn text_or_placeholder(store: &dyn TextStore, name: &str) -> StoreResult<String> {
    Ok(store
        .find_text(name)
        .await?
        .unwrap_or_else(|| format!("'{name}' not found.")))
}

fn account_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn text_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// In-memory account and text store
#[derive(Debug)]
pub struct MemoryStore {
    accounts: DashMap<String, Account>,
    texts: DashMap<String, String>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let store = Self::empty();
        store.insert_text(LOGIN_TEXT, DEFAULT_LOGIN);
        store.insert_text(MOTD_TEXT, DEFAULT_MOTD);
        store
    }
}

impl MemoryStore {
    /// Create a store with the built-in login and MOTD texts
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with no accounts and no texts
    pub fn empty() -> Self {
        Self {
            accounts: DashMap::new(),
            texts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add or replace a text fixture
    pub fn insert_text(&self, name: &str, text: impl Into<String>) {
        self.texts.insert(text_key(name), text.into());
    }

    /// Load every `*.txt` file in `dir` as a text fixture named after its upper-cased stem
    ///
    /// Returns the number of fixtures loaded.
    pub async fn load_fixtures(&self, dir: impl AsRef<Path>) -> StoreResult<usize> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = tokio::fs::read_to_string(&path).await?;
            debug!(fixture = %text_key(stem), path = %path.display(), "Loaded text fixture");
            self.insert_text(stem, text.trim_end());
            loaded += 1;
        }
        info!(dir = %dir.display(), loaded, "Text fixtures loaded");
        Ok(loaded)
    }

    /// Get the number of accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, name: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .get(&account_key(name))
            .map(|entry| entry.value().clone()))
    }

    async fn create_account(&self, name: &str, credential: Credential) -> StoreResult<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        match self.accounts.entry(account_key(name)) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let account = Account {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    name: name.to_string(),
                    credential,
                };
                slot.insert(account.clone());
                info!(account = %account.name, id = account.id, "Account created");
                Ok(account)
            }
        }
    }
}

#[async_trait]
impl TextStore for MemoryStore {
    async fn find_text(&self, name: &str) -> StoreResult<Option<String>> {
        let text = self.texts.get(&text_key(name));
        Ok(text.map(|entry| entry.value().clone()))
    }
}
