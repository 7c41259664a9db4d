//! Reputation oracle client for the Palisade relay.
//!
//! Asks an external web-of-trust ranking service for a pubkey's rank by
//! publishing a signed request event to the oracle's relay and waiting for
//! the matching result. The relay's admission policy consumes ranks through
//! the [`ReputationOracle`] trait.

mod client;
mod error;
mod message;
mod transport;
mod ws;

pub use client::{
    interpret_response, OracleClient, OracleConfig, ReputationOracle, DEFAULT_ORACLE_URL,
    DEFAULT_TIMEOUT,
};
pub use error::OracleError;
pub use message::{ClientMessage, RelayMessage};
pub use transport::{RelayConnection, RelayTransport};
pub use ws::{WsConnection, WsTransport};
