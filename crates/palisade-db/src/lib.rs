//! Database layer for the Palisade relay.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table the relay uses (events, the tag
//! token index, the trigram full-text index, access lists, and the log table)
//! is created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: readers never block the single writer, which
//!   matches a relay that answers many subscriptions and admits few events.
//! - **`r2d2` connection pool**: bounded connection reuse across blocking
//!   worker threads.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that queries it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
