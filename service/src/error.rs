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

//! Error types for the connection service

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Connection service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the line codec
    #[error("Codec error: {0}")]
    Codec(#[from] mudlark_telnetcodec::CodecError),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Listener was started twice
    #[error("Server already running")]
    AlreadyRunning,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceError {
    /// Check if the error only means the peer or connection is gone
    ///
    /// These are the normal end of a session rather than faults.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ServiceError::ConnectionClosed => true,
            ServiceError::Codec(e) => e.is_disconnect(),
            ServiceError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
