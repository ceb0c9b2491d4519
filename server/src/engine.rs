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

//! The game world contract
//!
//! The [`Controller`](crate::Controller) owns exactly one [`Engine`]. It admits sessions once
//! they log in, removes them when their connection closes, and calls [`Engine::tick`] on a fixed
//! interval. All three calls happen under the controller's roster lock, so an engine never sees
//! them interleave.

use crate::{MudResult, Session};
use mudlark_service::ConnectionId;
use std::collections::HashMap;
use tracing::{debug, trace};

/// The simulation driven by the controller's tick loop
///
/// Methods must not block: they run on the async workers with the roster locked.
pub trait Engine: Send + 'static {
    /// Add a logged-in player to the world
    fn admit(&mut self, session: Session);

    /// Take a player out of the world, returning their session if present
    fn remove(&mut self, id: ConnectionId) -> Option<Session>;

    /// Advance the world by one tick
    fn tick(&mut self) -> MudResult<()>;

    /// Get the number of players in the world
    fn len(&self) -> usize;

    /// Whether the world has no players
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default engine: a roster of sessions and a tick counter
#[derive(Debug, Default)]
pub struct World {
    sessions: HashMap<ConnectionId, Session>,
    ticks: u64,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Get a player's session
    pub fn session(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }
}

impl Engine for World {
    fn admit(&mut self, session: Session) {
        debug!(connection_id = %session.id(), name = %session.name(), "Player entered the world");
        self.sessions.insert(session.id(), session);
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&id);
        if let Some(session) = &session {
            debug!(connection_id = %id, name = %session.name(), "Player left the world");
        }
        session
    }

    fn tick(&mut self) -> MudResult<()> {
        self.ticks += 1;
        trace!(
            tick = self.ticks,
            players = self.sessions.len(),
            "World tick"
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
