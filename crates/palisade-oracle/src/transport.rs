//! Relay transport abstraction.
//!
//! The oracle client only needs to open a connection, send frames, and read
//! frames. Keeping that behind a trait lets tests drive the client with
//! scripted connections instead of a live relay.

use std::future::Future;

use crate::error::OracleError;
use crate::message::{ClientMessage, RelayMessage};

/// Opens connections to a relay URL.
pub trait RelayTransport: Send + Sync {
    /// The connection type produced by [`connect`](Self::connect).
    type Connection: RelayConnection;

    /// Connects to `url`.
    fn connect(&self, url: &str)
        -> impl Future<Output = Result<Self::Connection, OracleError>> + Send;
}

/// One open relay connection.
pub trait RelayConnection: Send {
    /// Sends a frame.
    fn send(&mut self, msg: ClientMessage) -> impl Future<Output = Result<(), OracleError>> + Send;

    /// Receives the next recognised frame, or `None` once the relay has
    /// closed the connection.
    fn recv(&mut self) -> impl Future<Output = Result<Option<RelayMessage>, OracleError>> + Send;

    /// Closes the connection. Errors are not interesting at this point.
    fn close(self) -> impl Future<Output = ()> + Send;
}
