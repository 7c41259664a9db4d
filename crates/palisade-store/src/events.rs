//! Connection-level event persistence.
//!
//! These functions run on a caller-supplied SQLite connection and keep the
//! `events` row, its tag tokens, and its full-text document consistent
//! within one transaction. [`EventStore`](crate::EventStore) wraps them with
//! pooling, blocking-task offload, and replace locking.

use palisade_types::{Event, Filter, KindClass};
use rusqlite::{params, params_from_iter, types::Type, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::StoreError;
use crate::filter::{compile_filter, CompiledQuery, QueryLimits};
use crate::index::{search_text, tag_tokens};

/// Result of a replace attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The event is now the live one for its key.
    Stored,
    /// A newer (or tie-winning) event already holds the key.
    Superseded,
    /// This exact event is already the live one.
    Duplicate,
}

/// Whether `previous` loses to `next` under last-writer-wins.
///
/// Later `created_at` wins; on an exact tie the lexicographically smaller id
/// wins.
pub fn is_older(previous: &Event, next: &Event) -> bool {
    previous.created_at < next.created_at
        || (previous.created_at == next.created_at && previous.id > next.id)
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let tags_json: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Event {
        id: row.get(0)?,
        pubkey: row.get(1)?,
        created_at: row.get(2)?,
        kind: row.get(3)?,
        tags,
        content: row.get(5)?,
        sig: row.get(6)?,
    })
}

/// Inserts the row and its derived index entries. Returns `false` when the
/// id already exists. Does not open a transaction.
fn insert_event_row(conn: &Connection, ev: &Event) -> Result<bool, StoreError> {
    let tags_json = serde_json::to_string(&ev.tags)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO events (id, pubkey, created_at, kind, tags, content, sig)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ev.id,
            ev.pubkey,
            ev.created_at,
            ev.kind,
            tags_json,
            ev.content,
            ev.sig
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }
    let row_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare_cached("INSERT INTO event_tags (event_row, value) VALUES (?1, ?2)")?;
    for token in tag_tokens(ev) {
        stmt.execute(params![row_id, token])?;
    }

    let text = search_text(ev);
    if !text.is_empty() {
        conn.execute(
            "INSERT INTO event_fts (rowid, text) VALUES (?1, ?2)",
            params![row_id, text],
        )?;
    }

    Ok(true)
}

/// Deletes the row with `id` and its full-text document; tag tokens go by
/// cascade. Does not open a transaction.
fn delete_event_row(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let row_id: Option<i64> = conn
        .query_row("SELECT row_id FROM events WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let Some(row_id) = row_id else {
        return Ok(false);
    };
    conn.execute("DELETE FROM event_fts WHERE rowid = ?1", [row_id])?;
    conn.execute("DELETE FROM events WHERE row_id = ?1", [row_id])?;
    Ok(true)
}

/// Stores a regular event.
///
/// # Errors
///
/// Returns `StoreError::DuplicateEvent` if the id is already stored, or a
/// database error. Nothing is written on error.
pub fn save_event(conn: &Connection, ev: &Event) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    if !insert_event_row(&tx, ev)? {
        return Err(StoreError::DuplicateEvent);
    }
    tx.commit()?;
    Ok(())
}

/// Deletes an event by id. Returns whether a row was removed.
pub fn delete_event(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let removed = delete_event_row(&tx, id)?;
    tx.commit()?;
    Ok(removed)
}

/// Runs a compiled query to completion.
pub fn query_events(conn: &Connection, query: &CompiledQuery) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(&query.select_sql())?;
    let rows = stmt.query_map(params_from_iter(query.select_params()), event_from_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// Counts the rows matching a compiled query, ignoring its limit.
pub fn count_events(conn: &Connection, query: &CompiledQuery) -> Result<i64, StoreError> {
    let count = conn.query_row(
        &query.count_sql(),
        params_from_iter(query.count_params()),
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Applies last-writer-wins for a replaceable or addressable event.
///
/// The lookup, delete, and insert run inside one `BEGIN IMMEDIATE`
/// transaction. Callers serialise concurrent replaces of the same key
/// themselves (see [`ReplaceLocks`](crate::ReplaceLocks)).
pub fn replace_event(
    conn: &mut Connection,
    ev: &Event,
    limits: &QueryLimits,
) -> Result<ReplaceOutcome, StoreError> {
    let mut filter = Filter::default()
        .author(ev.pubkey.clone())
        .kind(ev.kind)
        .limit(1);
    if ev.kind_class() == KindClass::Addressable {
        filter = filter.tag("d", ev.d_tag());
    }
    let query = compile_filter(&filter, limits)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut should_store = true;
    for previous in query_events(&tx, &query)? {
        if previous.id == ev.id {
            return Ok(ReplaceOutcome::Duplicate);
        }
        if is_older(&previous, ev) {
            tracing::debug!(
                previous = %previous.id,
                next = %ev.id,
                kind = ev.kind,
                "replacing older event"
            );
            delete_event_row(&tx, &previous.id)?;
        } else {
            should_store = false;
        }
    }

    let outcome = if should_store {
        // The id may already be stored under a different key.
        if insert_event_row(&tx, ev)? {
            ReplaceOutcome::Stored
        } else {
            ReplaceOutcome::Duplicate
        }
    } else {
        ReplaceOutcome::Superseded
    };

    tx.commit()?;
    Ok(outcome)
}
