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

//! Core types for the connection service

use std::fmt;

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection lifecycle state, published by the connection worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Both pumps are running
    Open,
    /// A close trigger fired and teardown is in progress
    Closing,
    /// The socket is closed; terminal
    Closed,
}

impl ConnectionState {
    /// Check if the connection is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// The trigger that ended a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The receive pump saw end-of-stream or a read failure
    PeerClosed,
    /// The transmit pump could not write to the socket
    WriteFailed,
    /// Someone raised the connection's kill signal
    Killed,
}

impl CloseReason {
    /// Metric/log label for this reason
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::WriteFailed => "write_failed",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new(1);
        let id2 = ConnectionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_eq!(id2.as_u64(), 2);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id2.to_string(), "conn-2");
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Closing.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }

    #[test]
    fn test_close_reason_labels() {
        assert_eq!(CloseReason::PeerClosed.to_string(), "peer_closed");
        assert_eq!(CloseReason::WriteFailed.as_str(), "write_failed");
        assert_eq!(CloseReason::Killed.as_str(), "killed");
    }
}
