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

//! Registration callbacks for accepted connections

use crate::{Connection, Input};

/// Receiver of connection registration and deregistration
///
/// The listener calls [`register`](Self::register) once a connection's handles exist and before
/// its socket is serviced, and [`deregister`](Self::deregister) once the socket has closed.
/// Both run to completion without waiting, so anything long-running (such as a login dialogue)
/// must be spawned rather than driven from inside the callback.
///
/// # Example
///
/// ```
/// use mudlark_service::{Connection, ConnectionSink, Input};
///
/// struct Greeter;
///
/// impl ConnectionSink for Greeter {
///     fn register(&self, connection: Connection, _input: Input) {
///         let _ = connection.send_line("Welcome!");
///     }
///
///     fn deregister(&self, _connection: &Connection) {}
/// }
/// ```
pub trait ConnectionSink: Send + Sync + 'static {
    /// A connection was accepted; `input` is its only line reader
    fn register(&self, connection: Connection, input: Input);

    /// A connection finished closing
    fn deregister(&self, connection: &Connection);
}

/// Closure-based sink
///
/// Convenient for tests and small tools that do not warrant a dedicated type.
pub struct CallbackSink {
    /// Called on registration
    pub on_register: Box<dyn Fn(Connection, Input) + Send + Sync + 'static>,
    /// Called on deregistration
    pub on_deregister: Option<Box<dyn Fn(&Connection) + Send + Sync + 'static>>,
}

impl CallbackSink {
    /// Create a sink from a registration callback
    pub fn new(on_register: impl Fn(Connection, Input) + Send + Sync + 'static) -> Self {
        Self {
            on_register: Box::new(on_register),
            on_deregister: None,
        }
    }

    /// Add a deregistration callback
    pub fn with_deregister(
        mut self,
        on_deregister: impl Fn(&Connection) + Send + Sync + 'static,
    ) -> Self {
        self.on_deregister = Some(Box::new(on_deregister));
        self
    }
}

impl ConnectionSink for CallbackSink {
    fn register(&self, connection: Connection, input: Input) {
        (self.on_register)(connection, input);
    }

    fn deregister(&self, connection: &Connection) {
        if let Some(ref f) = self.on_deregister {
            f(connection);
        }
    }
}
