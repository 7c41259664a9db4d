//! Admission policy for inbound events.
//!
//! Decides, per event, whether the relay should store it. The decision
//! depends on the author's whitelist tier, the blacklist, and for
//! software-release ("developer") kinds an external reputation rank.
//!
//! # Order of checks
//!
//! 1. The operator's own events are always accepted.
//! 2. Events dated in the future are invalid.
//! 3. The kind must be allowed for the author's tier.
//! 4. Developer kinds from blacklisted authors are blocked.
//! 5. Developer kinds from authors with no prior developer-kind event are
//!    ranked by the oracle; a rank at or below the threshold blocks the
//!    event and blacklists the author.
//! 6. Direct messages must be addressed to the operator only.
//!
//! Store and oracle failures are never verdicts: they surface as
//! [`AdmissionError`] and leave the author's standing untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use palisade_oracle::{OracleError, ReputationOracle};
use palisade_store::{EventStore, StoreError};
use palisade_types::{Event, Filter, KIND_DIRECT_MESSAGE, KIND_PROFILE};
use thiserror::Error;

/// Software-release metadata kinds, gated by reputation.
pub const DEVELOPER_KINDS: &[u32] = &[32267, 30063, 1063, 3063];

/// Notes, comments, and app-collection kinds.
pub const USER_KINDS: &[u32] = &[1, 1111, 30267];

/// Why an event was refused on its merits.
///
/// The display strings are NIP-01 machine-readable `OK` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The author's tier does not allow this kind.
    #[error("blocked: kind not accepted")]
    KindNotAccepted,
    /// `created_at` is later than the relay clock.
    #[error("invalid: event creation date is from the future")]
    InvalidFutureEvent,
    /// The author is on the blacklist.
    #[error("blocked: you are blacklisted")]
    Blacklisted,
    /// The oracle ranked the author at or below the threshold.
    #[error("restricted: low reputation rank")]
    BelowReputationThreshold,
    /// A direct message names someone other than the operator.
    #[error("blocked: unsupported recipient")]
    UnsupportedRecipient,
}

/// Outcome of [`AdmissionController::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Store the event.
    Accept,
    /// Refuse the event.
    Reject(Rejection),
}

/// An infrastructure failure while evaluating. The event is neither
/// accepted nor rejected; retrying later is safe.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Reading or writing the access lists failed.
    #[error("admission store error: {0}")]
    Store(#[from] StoreError),
    /// The reputation oracle could not be consulted.
    #[error("admission oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// Standing of a pubkey, as reported by the accept endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Standing {
    /// On the blacklist.
    Blacklisted,
    /// Ranked by the oracle.
    Ranked {
        /// The oracle's rank.
        rank: f64,
        /// Whether the rank clears the threshold.
        accepted: bool,
    },
}

/// Which kinds each whitelist tier may publish.
///
/// A tier above the highest configured tier gets the highest configured
/// tier's set. A tier below the lowest configured tier gets nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    tiers: BTreeMap<u8, BTreeSet<u32>>,
}

impl TierTable {
    /// Builds a table from `(tier, kinds)` rows.
    pub fn new<I, K>(rows: I) -> Self
    where
        I: IntoIterator<Item = (u8, K)>,
        K: IntoIterator<Item = u32>,
    {
        let tiers = rows
            .into_iter()
            .map(|(tier, kinds)| (tier, kinds.into_iter().collect()))
            .collect();
        Self { tiers }
    }

    /// Kinds allowed at `tier`.
    pub fn allowed(&self, tier: u8) -> Option<&BTreeSet<u32>> {
        self.tiers.range(..=tier).next_back().map(|(_, kinds)| kinds)
    }

    /// Whether an author at `tier` may publish `kind`.
    pub fn permits(&self, tier: u8, kind: u32) -> bool {
        self.allowed(tier).is_some_and(|kinds| kinds.contains(&kind))
    }
}

impl Default for TierTable {
    fn default() -> Self {
        let tier0 = vec![KIND_PROFILE, KIND_DIRECT_MESSAGE];
        let tier1: Vec<u32> = tier0.iter().chain(USER_KINDS).copied().collect();
        let tier2: Vec<u32> = tier1.iter().chain(DEVELOPER_KINDS).copied().collect();
        Self::new([(0, tier0), (1, tier1), (2, tier2)])
    }
}

/// Policy settings for the controller.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Operator pubkey (hex).
    pub operator: String,
    /// Ranks at or below this are refused.
    pub threshold: f64,
    /// Tier to kind table.
    pub tiers: TierTable,
}

/// Evaluates inbound events against the relay's admission policy.
///
/// Holds no state of its own; everything durable lives in the store.
pub struct AdmissionController<O> {
    store: EventStore,
    oracle: Arc<O>,
    policy: Arc<AdmissionPolicy>,
    clock: fn() -> i64,
}

impl<O> Clone for AdmissionController<O> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            oracle: Arc::clone(&self.oracle),
            policy: Arc::clone(&self.policy),
            clock: self.clock,
        }
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl<O: ReputationOracle> AdmissionController<O> {
    /// Creates a controller using the system clock.
    pub fn new(store: EventStore, oracle: O, policy: AdmissionPolicy) -> Self {
        Self {
            store,
            oracle: Arc::new(oracle),
            policy: Arc::new(policy),
            clock: unix_now,
        }
    }

    /// Replaces the clock, in unix seconds.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Decides whether `ev` may be stored.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionError` when the store or the oracle fails. Such a
    /// failure never blacklists the author.
    pub async fn evaluate(&self, ev: &Event) -> Result<Verdict, AdmissionError> {
        let verdict = self.decide(ev).await;
        match &verdict {
            Ok(Verdict::Accept) => {
                tracing::debug!(id = %ev.id, kind = ev.kind, "event admitted");
            }
            Ok(Verdict::Reject(reason)) => {
                tracing::info!(
                    id = %ev.id,
                    pubkey = %ev.pubkey,
                    kind = ev.kind,
                    %reason,
                    "event rejected"
                );
            }
            Err(e) => {
                tracing::warn!(id = %ev.id, pubkey = %ev.pubkey, error = %e, "admission failed");
            }
        }
        verdict
    }

    async fn decide(&self, ev: &Event) -> Result<Verdict, AdmissionError> {
        if ev.pubkey == self.policy.operator {
            return Ok(Verdict::Accept);
        }

        if ev.created_at > (self.clock)() {
            return Ok(Verdict::Reject(Rejection::InvalidFutureEvent));
        }

        let tier = self.store.whitelist_tier(&ev.pubkey).await?;
        if !self.policy.tiers.permits(tier, ev.kind) {
            return Ok(Verdict::Reject(Rejection::KindNotAccepted));
        }

        if DEVELOPER_KINDS.contains(&ev.kind) {
            if self.store.is_blacklisted(&ev.pubkey).await? {
                return Ok(Verdict::Reject(Rejection::Blacklisted));
            }
            if !self.has_published(&ev.pubkey).await? {
                let rank = self.oracle.rank(&ev.pubkey).await?;
                if rank <= self.policy.threshold {
                    self.record_low_rank(&ev.pubkey, rank).await;
                    return Ok(Verdict::Reject(Rejection::BelowReputationThreshold));
                }
            }
        }

        if ev.kind == KIND_DIRECT_MESSAGE
            && ev.tag_values("p").any(|p| p != self.policy.operator)
        {
            return Ok(Verdict::Reject(Rejection::UnsupportedRecipient));
        }

        Ok(Verdict::Accept)
    }

    /// Whether `pubkey` already has a stored developer-kind event.
    async fn has_published(&self, pubkey: &str) -> Result<bool, AdmissionError> {
        let filter = Filter {
            authors: vec![pubkey.to_string()],
            kinds: DEVELOPER_KINDS.to_vec(),
            limit: Some(1),
            ..Filter::default()
        };
        let mut stream = self.store.query(&filter)?;
        match stream.next_event().await {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e.into()),
            None => Ok(false),
        }
    }

    /// Blacklists a low-ranked author. A failed write is logged; the
    /// rejection stands either way.
    async fn record_low_rank(&self, pubkey: &str, rank: f64) {
        match self.store.add_to_blacklist(pubkey).await {
            Ok(_) => {
                tracing::info!(pubkey, rank, "blacklisted low-rank author");
                let line = format!("blacklisted {pubkey}: rank {rank}");
                if let Err(e) = self.store.save_log(&line).await {
                    tracing::warn!(error = %e, "failed to write log line");
                }
            }
            Err(e) => {
                tracing::error!(pubkey, rank, error = %e, "failed to blacklist low-rank author");
            }
        }
    }

    /// Reports whether `pubkey` would pass the reputation gate, without
    /// recording anything.
    pub async fn standing(&self, pubkey: &str) -> Result<Standing, AdmissionError> {
        if self.store.is_blacklisted(pubkey).await? {
            return Ok(Standing::Blacklisted);
        }
        let rank = self.oracle.rank(pubkey).await?;
        Ok(Standing::Ranked {
            rank,
            accepted: rank > self.policy.threshold,
        })
    }
}
