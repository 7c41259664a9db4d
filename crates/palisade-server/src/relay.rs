//! Relay hooks: what happens when a client publishes an event or opens a
//! subscription.
//!
//! Client framing lives outside this module. The hooks take decoded events
//! and filters and return values a transport can turn into `OK` and `EVENT`
//! frames.

use palisade_oracle::ReputationOracle;
use palisade_store::{ReplaceOutcome, StoreError};
use palisade_types::{Event, Filter, KindClass};
use serde_json::{json, Value};
use thiserror::Error;

use crate::admission::{AdmissionError, Verdict};
use crate::RelayContext;

/// The `OK` status for a published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    /// Whether the relay accepted the event.
    pub accepted: bool,
    /// NIP-01 message, empty on plain success.
    pub message: String,
}

impl EventOutcome {
    fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    fn refused(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }

    /// The `["OK", <id>, <accepted>, <message>]` frame for `event_id`.
    pub fn to_frame(&self, event_id: &str) -> Value {
        json!(["OK", event_id, self.accepted, self.message])
    }
}

/// Failures of the relay hooks. The event or request may be retried.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Admission could not reach a verdict.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RelayError {
    /// The `OK` status to report when a publish fails this way.
    pub fn to_outcome(&self) -> EventOutcome {
        match self {
            RelayError::Admission(AdmissionError::Oracle(_)) => {
                EventOutcome::refused("error: could not verify reputation, try again later")
            }
            RelayError::Admission(AdmissionError::Store(_)) | RelayError::Store(_) => {
                EventOutcome::refused("error: database failure")
            }
        }
    }
}

/// Admits and stores a published event.
///
/// Ephemeral events are acknowledged without being stored. A regular event
/// already on file is acknowledged as a duplicate.
pub async fn on_event<O: ReputationOracle>(
    ctx: &RelayContext<O>,
    ev: &Event,
) -> Result<EventOutcome, RelayError> {
    if let Verdict::Reject(reason) = ctx.admission.evaluate(ev).await? {
        return Ok(EventOutcome::refused(reason.to_string()));
    }

    let outcome = match ev.kind_class() {
        KindClass::Ephemeral => EventOutcome::accepted(""),
        KindClass::Regular => match ctx.store.save(ev).await {
            Ok(()) => EventOutcome::accepted(""),
            Err(e) if e.is_duplicate() => EventOutcome::accepted("duplicate: already have this event"),
            Err(e) => return Err(e.into()),
        },
        KindClass::Replaceable | KindClass::Addressable => match ctx.store.replace(ev).await? {
            ReplaceOutcome::Stored => EventOutcome::accepted(""),
            ReplaceOutcome::Superseded => {
                tracing::debug!(id = %ev.id, kind = ev.kind, "newer version already stored");
                EventOutcome::accepted("")
            }
            ReplaceOutcome::Duplicate => {
                EventOutcome::accepted("duplicate: already have this event")
            }
        },
    };

    tracing::debug!(
        id = %ev.id,
        kind = ev.kind,
        class = %ev.kind_class(),
        "event handled"
    );
    Ok(outcome)
}

/// Answers a subscription: runs each filter and concatenates the results.
///
/// Results are per filter, in store order; an event matching two filters
/// appears twice.
pub async fn on_req<O: ReputationOracle>(
    ctx: &RelayContext<O>,
    filters: &[Filter],
) -> Result<Vec<Event>, RelayError> {
    let mut events = Vec::new();
    for filter in filters {
        let stream = ctx.store.query(filter)?;
        events.extend(stream.collect_all().await?);
    }
    tracing::info!(filters = filters.len(), events = events.len(), "REQ served");
    Ok(events)
}
