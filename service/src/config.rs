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

//! Listener and connection configuration
//!
//! Configuration is passed explicitly to each component at construction time.
//!
//! # Examples
//!
//! ```
//! use mudlark_service::{ConnectionConfig, ServerConfig};
//! use std::time::Duration;
//!
//! let config = ServerConfig::default()
//!     .with_port(4001)
//!     .with_max_connections(250)
//!     .with_connection(ConnectionConfig::default().with_max_input_length(256));
//! assert!(config.validate().is_ok());
//! ```

use mudlark_telnetcodec::DEFAULT_MAX_LINE_LENGTH;
use std::net::SocketAddr;
use std::time::Duration;

/// Default telnet port for the server
pub const DEFAULT_PORT: u16 = 4000;

/// Per-connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum characters kept from one line of client input
    pub max_input_length: usize,

    /// Characters of outbound text shown in trace logs
    pub output_preview_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_LINE_LENGTH,
            output_preview_length: 80,
        }
    }
}

impl ConnectionConfig {
    /// Set the maximum input line length
    pub fn with_max_input_length(mut self, length: usize) -> Self {
        self.max_input_length = length;
        self
    }

    /// Set the outbound log preview length
    pub fn with_output_preview_length(mut self, length: usize) -> Self {
        self.output_preview_length = length;
        self
    }
}

/// Listener configuration
///
/// Use the builder pattern methods to customize the configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Time allowed for connections to close during shutdown
    ///
    /// Connection tasks still running afterwards are aborted.
    pub shutdown_timeout: Duration,

    /// Settings applied to every accepted connection
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            shutdown_timeout: Duration::from_secs(5),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the port, keeping the bind IP
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address.set_port(port);
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the per-connection settings
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        if self.connection.max_input_length == 0 {
            return Err("max_input_length must be greater than 0".to_string());
        }

        Ok(())
    }
}
