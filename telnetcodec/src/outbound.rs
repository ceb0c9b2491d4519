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

use super::consts;
use bytes::Bytes;

/// An item waiting in a connection's transmit queue.
///
/// Text and raw bytes stay distinct until the moment they are encoded: text is newline
/// normalized, raw bytes (negotiation replies) go out untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Text terminated with CR LF
    Line(String),
    /// Text sent without a terminator, leaving the cursor after it
    Prompt(String),
    /// Pre-encoded bytes written verbatim
    Raw(Bytes),
}

impl Outbound {
    /// A full line of text.
    pub fn line(text: impl Into<String>) -> Self {
        Outbound::Line(text.into())
    }

    /// A prompt, which is not followed by a line ending.
    pub fn prompt(text: impl Into<String>) -> Self {
        Outbound::Prompt(text.into())
    }

    /// A raw `IAC <verb> <option>` negotiation triple.
    pub fn negotiate(verb: u8, option: u8) -> Self {
        Outbound::Raw(Bytes::copy_from_slice(&[consts::IAC, verb, option]))
    }

    /// Asks the remote terminal to stop (`IAC WILL ECHO`) or resume (`IAC WONT ECHO`) local echo.
    ///
    /// The server never echoes input itself; claiming the ECHO option only keeps passwords off
    /// the client's screen.
    pub fn password_mode(enabled: bool) -> Self {
        let verb = if enabled { consts::WILL } else { consts::WONT };
        Outbound::negotiate(verb, consts::option::ECHO)
    }

    /// Whether this item is human readable text.
    pub fn is_text(&self) -> bool {
        !matches!(self, Outbound::Raw(_))
    }

    /// The first `limit` characters of the text, for logging.
    pub fn preview(&self, limit: usize) -> String {
        match self {
            Outbound::Line(text) | Outbound::Prompt(text) => {
                let mut preview: String = text.chars().take(limit).collect();
                if text.chars().nth(limit).is_some() {
                    preview.push_str("...");
                }
                preview.escape_debug().to_string()
            }
            Outbound::Raw(bytes) => format!("{:02X?}", &bytes[..]),
        }
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Line(text)
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Outbound::Line(text.to_string())
    }
}

impl From<Bytes> for Outbound {
    fn from(bytes: Bytes) -> Self {
        Outbound::Raw(bytes)
    }
}
