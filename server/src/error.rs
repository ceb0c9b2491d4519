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

//! Error types for the game server

use crate::{AuthError, CredentialError, StoreError};
use mudlark_service::ServiceError;
use thiserror::Error;

/// Result type for game server operations
pub type MudResult<T> = std::result::Result<T, MudError>;

/// Errors raised by the controller, the engine and the binary
#[derive(Debug, Error)]
pub enum MudError {
    /// Listener or connection failure
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Account or text store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Credential hashing failure
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Login dialogue failure
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The world failed to advance
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The controller is already running
    #[error("Controller already running")]
    AlreadyRunning,

    /// I/O error outside of a connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
