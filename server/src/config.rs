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

//! Game server configuration

use crate::{MudError, MudResult};
use mudlark_service::ServerConfig;
use std::time::Duration;

/// Default interval between world ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Game server configuration
///
/// # Example
///
/// ```
/// use mudlark_server::MudConfig;
/// use std::time::Duration;
///
/// let config = MudConfig::default()
///     .with_tick_interval(Duration::from_secs(1))
///     .with_auth_timeout(Some(Duration::from_secs(120)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MudConfig {
    /// Listener and per-connection settings
    pub server: ServerConfig,

    /// Wall-clock interval between world ticks
    pub tick_interval: Duration,

    /// Upper bound on the whole login dialogue
    ///
    /// `None` lets a login prompt wait forever.
    pub auth_timeout: Option<Duration>,
}

impl Default for MudConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            auth_timeout: None,
        }
    }
}

impl MudConfig {
    /// Create a configuration around the given listener settings
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            ..Default::default()
        }
    }

    /// Set the tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the login timeout
    pub fn with_auth_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> MudResult<()> {
        self.server.validate().map_err(MudError::InvalidConfig)?;
        if self.tick_interval.is_zero() {
            return Err(MudError::InvalidConfig(
                "tick_interval must be greater than 0".to_string(),
            ));
        }
        if self.auth_timeout.is_some_and(|t| t.is_zero()) {
            return Err(MudError::InvalidConfig(
                "auth_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
