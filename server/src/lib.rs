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

//! # Mudlark Server
//!
//! The game side of the Mudlark telnet server. Connections accepted by
//! [`mudlark_service::TelnetListener`] are registered with the [`Controller`], which runs the
//! login dialogue ([`Authenticator`]) for each one and admits the resulting [`Session`] to the
//! [`Engine`]. The controller also drives the engine's tick on a fixed interval.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mudlark_server::{Authenticator, Controller, LoopControl, MemoryStore, MudConfig, World};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let authenticator = Authenticator::new(store.clone(), store);
//! let controller = Controller::new(MudConfig::default(), authenticator, Box::new(World::new()));
//!
//! controller.start().await?;
//! let outcome = controller.run().await?;
//! controller.shutdown().await?;
//! assert_ne!(outcome, LoopControl::Continue);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    future_incompatible,
    rust_2018_idioms
)]

mod auth;
mod config;
mod controller;
mod credential;
mod engine;
mod error;
mod store;

pub use self::auth::{
    AuthError, AuthResultSink, Authenticator, CONFIRM_PASSWORD_PROMPT, INVALID_PASSWORD,
    NAME_PROMPT, PASSWORD_MISMATCH, PASSWORD_PROMPT, Session, TIMED_OUT,
};
pub use self::config::{DEFAULT_TICK_INTERVAL, MudConfig};
pub use self::controller::{ControlHandle, Controller, LoopControl};
pub use self::credential::{Credential, CredentialError, CredentialHasher};
pub use self::engine::{Engine, World};
pub use self::error::{MudError, MudResult};
pub use self::store::{
    Account, AccountStore, LOGIN_TEXT, MOTD_TEXT, MemoryStore, StoreError, StoreResult, TextStore,
    text_or_placeholder,
};
