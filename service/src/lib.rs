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

//! Connection service for the Mudlark telnet server
//!
//! This crate owns everything between the TCP socket and the code that talks to a player:
//!
//! - **Supervision**: every socket is driven by one [`ConnectionWorker`], which runs a receive
//!   pump and a send pump and guarantees a single, ordered teardown whichever way the
//!   connection ends (peer EOF, write failure or kill)
//! - **Handles**: the rest of the program sees a [`Connection`] (queue output, toggle password
//!   mode, kill, await closure) and an [`Input`] (the one reader of received lines)
//! - **Accepting**: [`TelnetListener`] binds, accepts and hands each socket to the
//!   [`ConnectionManager`], which registers it with a [`ConnectionSink`]
//!
//! # Architecture
//!
//! ```text
//! TelnetListener
//!     ↓
//! ConnectionManager ──register/deregister──→ ConnectionSink
//!     ↓
//! ConnectionWorker → Connection + Input
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mudlark_service::{Connection, ConnectionSink, Input, ServerConfig, TelnetListener};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl ConnectionSink for Echo {
//!     fn register(&self, connection: Connection, mut input: Input) {
//!         tokio::spawn(async move {
//!             while let Some(line) = input.next_line().await {
//!                 if connection.send_line(line).is_err() {
//!                     break;
//!                 }
//!             }
//!         });
//!     }
//!
//!     fn deregister(&self, _connection: &Connection) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TelnetListener::new(ServerConfig::default(), Arc::new(Echo));
//!     listener.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     listener.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    future_incompatible,
    rust_2018_idioms
)]

mod config;
mod connection;
mod error;
mod handler;
mod manager;
mod server;
mod types;
mod worker;

pub use config::{ConnectionConfig, DEFAULT_PORT, ServerConfig};
pub use connection::{Connection, Input};
pub use error::{Result, ServiceError};
pub use handler::{CallbackSink, ConnectionSink};
pub use manager::ConnectionManager;
pub use mudlark_telnetcodec::Outbound;
pub use server::TelnetListener;
pub use types::{CloseReason, ConnectionId, ConnectionState};
pub use worker::{CLOSE_NOTICE, ConnectionWorker};
