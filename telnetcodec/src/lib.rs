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

//! # Mudlark Telnet Line Codec
//!
//! This crate turns the byte stream of a telnet client into discrete text lines, and queued
//! [`Outbound`] items back into bytes. It understands just enough of the telnet protocol
//! (RFC 854) for interactive line-mode use:
//!
//! - **Command stripping**: `IAC <cmd>`, `IAC <DO|DONT|WILL|WONT> <option>` and
//!   `IAC SB ... IAC SE` sequences are removed from the input, wherever they appear
//! - **Line framing**: input is split on LF, decoded as lossy UTF-8, trimmed and capped
//! - **Echo suppression**: [`Outbound::password_mode`] builds the `IAC WILL ECHO` /
//!   `IAC WONT ECHO` replies used while a password is typed
//! - **Newline normalization**: outbound text always leaves with CR LF line endings
//!
//! No option state is tracked; every negotiation the client starts is ignored.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use futures_util::{SinkExt, StreamExt};
//! use mudlark_telnetcodec::{LineCodec, Outbound};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example(socket: TcpStream) -> Result<(), Box<dyn std::error::Error>> {
//! let mut framed = Framed::new(socket, LineCodec::with_max_length(512));
//! framed.send(Outbound::prompt("Name: ")).await?;
//! if let Some(line) = framed.next().await {
//!     framed.send(Outbound::line(format!("Hello, {}!", line?))).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod codec;
pub mod consts;
mod outbound;
mod result;

pub use self::codec::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
pub use self::outbound::Outbound;
pub use self::result::{CodecError, CodecResult};
