//! Async facade over the connection-level store functions.

use palisade_db::DbPool;
use palisade_types::{Event, Filter};
use rusqlite::Connection;

use crate::access;
use crate::error::StoreError;
use crate::events::{self, ReplaceOutcome};
use crate::filter::{compile_filter, QueryLimits};
use crate::lock::{ReplaceKey, ReplaceLocks};
use crate::stream::EventStream;

/// The relay's event store.
///
/// Cheap to clone; clones share the pool and the replace lock table. Every
/// database call runs on Tokio's blocking pool.
#[derive(Clone)]
pub struct EventStore {
    pool: DbPool,
    limits: QueryLimits,
    locks: ReplaceLocks,
}

impl EventStore {
    /// Wraps a migrated pool.
    pub fn new(pool: DbPool, limits: QueryLimits) -> Self {
        Self {
            pool,
            limits,
            locks: ReplaceLocks::default(),
        }
    }

    /// The ceilings applied to every filter.
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }

    /// Stores a regular event.
    ///
    /// # Errors
    ///
    /// `StoreError::DuplicateEvent` when the id is already present.
    pub async fn save(&self, ev: &Event) -> Result<(), StoreError> {
        let ev = ev.clone();
        self.with_conn(move |conn| events::save_event(conn, &ev)).await
    }

    /// Deletes an event by id. Returns whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| events::delete_event(conn, &id)).await
    }

    /// Applies last-writer-wins for a replaceable or addressable event.
    ///
    /// Replaces of the same key are serialised in-process before the
    /// database transaction starts, so two concurrent writers can never both
    /// leave a live event behind.
    pub async fn replace(&self, ev: &Event) -> Result<ReplaceOutcome, StoreError> {
        let _guard = self.locks.acquire(ReplaceKey::of(ev)).await;
        let ev = ev.clone();
        let limits = self.limits;
        self.with_conn(move |conn| events::replace_event(conn, &ev, &limits))
            .await
    }

    /// Starts a query and returns its result stream.
    ///
    /// The filter is compiled before anything is spawned, so a rejected
    /// filter fails here and produces no partial results.
    pub fn query(&self, filter: &Filter) -> Result<EventStream, StoreError> {
        let query = compile_filter(filter, &self.limits)?;
        Ok(EventStream::spawn(self.pool.clone(), query))
    }

    /// Counts matching events. The filter's limit is ignored.
    pub async fn count(&self, filter: &Filter) -> Result<i64, StoreError> {
        let query = compile_filter(filter, &self.limits)?;
        self.with_conn(move |conn| events::count_events(conn, &query))
            .await
    }

    /// Whitelist tier of `pubkey`, `0` when unlisted.
    pub async fn whitelist_tier(&self, pubkey: &str) -> Result<u8, StoreError> {
        let pubkey = pubkey.to_string();
        self.with_conn(move |conn| access::whitelist_tier(conn, &pubkey))
            .await
    }

    /// Sets the whitelist tier of `pubkey`.
    pub async fn set_whitelist_tier(&self, pubkey: &str, tier: u8) -> Result<(), StoreError> {
        let pubkey = pubkey.to_string();
        self.with_conn(move |conn| access::set_whitelist_tier(conn, &pubkey, tier))
            .await
    }

    /// Whether `pubkey` is blacklisted.
    pub async fn is_blacklisted(&self, pubkey: &str) -> Result<bool, StoreError> {
        let pubkey = pubkey.to_string();
        self.with_conn(move |conn| access::is_blacklisted(conn, &pubkey))
            .await
    }

    /// Blacklists `pubkey`. Returns `false` if it already was.
    pub async fn add_to_blacklist(&self, pubkey: &str) -> Result<bool, StoreError> {
        let pubkey = pubkey.to_string();
        self.with_conn(move |conn| access::add_to_blacklist(conn, &pubkey))
            .await
    }

    /// Appends an operational log line.
    pub async fn save_log(&self, text: &str) -> Result<(), StoreError> {
        let text = text.to_string();
        self.with_conn(move |conn| access::save_log(conn, &text)).await
    }
}
