//! Cancelable query result stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use palisade_db::DbPool;
use palisade_types::Event;
use rusqlite::params_from_iter;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::error::StoreError;
use crate::events::event_from_row;
use crate::filter::CompiledQuery;

/// Rows buffered ahead of the consumer.
const STREAM_BUFFER: usize = 16;

/// Events produced by [`EventStore::query`](crate::EventStore::query).
///
/// A blocking worker walks the SQLite cursor and hands rows over a small
/// bounded channel, so it only reads ahead of the consumer by a few rows.
/// Dropping the stream, or calling [`cancel`](Self::cancel), makes the
/// worker stop at its next row and release its statement and pooled
/// connection.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Result<Event, StoreError>>,
}

impl EventStream {
    /// Starts the worker. Must be called from within a Tokio runtime.
    pub(crate) fn spawn(pool: DbPool, query: CompiledQuery) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = stream_rows(&pool, &query, &tx) {
                tracing::warn!(error = %e, "query stream failed");
                let _ = tx.blocking_send(Err(e));
            }
        });
        Self { rx }
    }

    /// Receives the next event, or `None` once the results are exhausted.
    pub async fn next_event(&mut self) -> Option<Result<Event, StoreError>> {
        self.rx.recv().await
    }

    /// Stops the worker. Already-buffered events can still be received.
    pub fn cancel(&mut self) {
        self.rx.close();
    }

    /// Drains the stream into a vector, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        while let Some(item) = self.rx.recv().await {
            events.push(item?);
        }
        Ok(events)
    }
}

impl Stream for EventStream {
    type Item = Result<Event, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

fn stream_rows(
    pool: &DbPool,
    query: &CompiledQuery,
    tx: &mpsc::Sender<Result<Event, StoreError>>,
) -> Result<(), StoreError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&query.select_sql())?;
    let mut rows = stmt.query(params_from_iter(query.select_params()))?;

    let mut sent = 0usize;
    while let Some(row) = rows.next()? {
        let event = event_from_row(row)?;
        if tx.blocking_send(Ok(event)).is_err() {
            tracing::debug!(sent, "query stream dropped by consumer");
            return Ok(());
        }
        sent += 1;
    }
    tracing::trace!(sent, "query stream exhausted");
    Ok(())
}
