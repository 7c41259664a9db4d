//! Event persistence for the Palisade relay.
//!
//! Stores signed events in SQLite with two derived indexes kept in step
//! inside each write transaction: exact `name:value` tag tokens and a
//! trigram full-text document. Queries are compiled from untrusted
//! [`Filter`](palisade_types::Filter)s into parameterised SQL and streamed
//! back newest first.
//!
//! # Write paths
//!
//! | Kind class | Operation |
//! |------------|-----------|
//! | regular | [`EventStore::save`] |
//! | replaceable, addressable | [`EventStore::replace`] |
//! | ephemeral | never stored |
//!
//! The connection-level functions in [`events`] and [`access`] are public
//! for callers that already hold a connection (migrations tooling, tests).

pub mod access;
mod error;
pub mod events;
mod filter;
mod index;
mod lock;
mod store;
mod stream;

pub use error::{FilterError, StoreError};
pub use events::{is_older, ReplaceOutcome};
pub use filter::{compile_filter, CompiledQuery, QueryLimits};
pub use index::{search_text, tag_tokens, INDEXED_TAG_NAMES};
pub use lock::{ReplaceGuard, ReplaceKey, ReplaceLocks};
pub use store::EventStore;
pub use stream::EventStream;
