//! Shared protocol types for the Palisade relay.
//!
//! Provides the signed [`Event`] record, NIP-01 kind classification, the
//! subscription [`Filter`] wire shape, event id hashing and Schnorr signing,
//! and `npub` decoding. Every other crate in the workspace depends on these
//! definitions; this crate depends on none of them.

mod event;
mod filter;
mod keys;
mod kind;

pub use event::{Event, EventDraft, Tag};
pub use filter::Filter;
pub use keys::{decode_pubkey, event_hash, verify_event, KeyError, RelayKeys};
pub use kind::{
    KindClass, KIND_DIRECT_MESSAGE, KIND_JOB_FEEDBACK, KIND_PROFILE, KIND_REPUTATION_REQUEST,
    KIND_REPUTATION_RESULT,
};
