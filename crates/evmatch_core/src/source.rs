//! Event delivery from an external source into the engine.
//!
//! The external reactor owns the connections and calls into a
//! [`Dispatcher`] from its callbacks. The dispatcher preserves arrival
//! order, fans every event out to its sinks, and guarantees that the
//! terminal stream-end notification is delivered exactly once.

use crate::error::{EvmatchError, Result};
use crate::event::Event;
use crate::test_object::TestObject;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Identifier of one connection to the event source.
///
/// Observers are scoped to a list of these so that several concurrent
/// connections to the same source can be filtered independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new("0")
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Receiver of source notifications.
///
/// All three hooks run synchronously on the reactor's thread, one at a time.
pub trait EventSink {
    /// A connection to the source came up.
    fn on_connect(&mut self, connection: &ConnectionId, test: &mut dyn TestObject) {
        let _ = (connection, test);
    }

    /// One event arrived on `connection`.
    fn on_event(&mut self, connection: &ConnectionId, event: &Event, test: &mut dyn TestObject);

    /// The stream ended. Delivered exactly once.
    fn on_stream_end(&mut self, test: &mut dyn TestObject);
}

/// Fans events out to sinks in delivery order.
#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Box<dyn EventSink>>,
    connections: Vec<ConnectionId>,
    delivered: u64,
    ended: bool,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a sink. Sinks receive notifications in attachment order.
    pub fn attach(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style [`Dispatcher::attach`].
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.attach(Box::new(sink));
        self
    }

    /// Connections seen so far.
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// Number of events delivered.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Returns true once the stream has ended or expired.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Announces a connection to every sink. Repeated announcements of the
    /// same id are forwarded too; sinks decide whether to re-register.
    pub fn connect(&mut self, connection: ConnectionId, test: &mut dyn TestObject) -> Result<()> {
        if self.ended {
            return Err(EvmatchError::StreamEnded);
        }
        debug!(%connection, "connection established");
        for sink in &mut self.sinks {
            sink.on_connect(&connection, test);
        }
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
        Ok(())
    }

    /// Delivers one event to every sink.
    pub fn deliver(
        &mut self,
        connection: &ConnectionId,
        event: &Event,
        test: &mut dyn TestObject,
    ) -> Result<()> {
        if self.ended {
            warn!(%connection, %event, "event after stream end dropped");
            return Err(EvmatchError::StreamEnded);
        }
        self.delivered += 1;
        for sink in &mut self.sinks {
            sink.on_event(connection, event, test);
        }
        Ok(())
    }

    /// Delivers the stream-end notification. Returns false if the stream had
    /// already ended, in which case nothing is delivered.
    pub fn end_stream(&mut self, test: &mut dyn TestObject) -> bool {
        if self.ended {
            return false;
        }
        self.ended = true;
        debug!(delivered = self.delivered, "stream ended");
        for sink in &mut self.sinks {
            sink.on_stream_end(test);
        }
        true
    }

    /// Wall-clock timeout: fails the test, stops it, and closes the stream
    /// without final reconciliation. Returns false if already ended.
    pub fn expire(&mut self, test: &mut dyn TestObject, reason: &str) -> bool {
        if self.ended {
            return false;
        }
        self.ended = true;
        test.record_failure(reason);
        test.stop();
        true
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks.len())
            .field("connections", &self.connections)
            .field("delivered", &self.delivered)
            .field("ended", &self.ended)
            .finish()
    }
}
