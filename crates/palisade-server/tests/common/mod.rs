//! Shared fixtures for server integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use palisade_db::{create_pool, run_migrations, DbRuntimeSettings};
use palisade_oracle::{OracleError, ReputationOracle};
use palisade_server::admission::{AdmissionPolicy, TierTable};
use palisade_server::{RelayContext, RelayInfo};
use palisade_store::{EventStore, QueryLimits};
use palisade_types::{Event, Tag};
use tempfile::NamedTempFile;

pub const OPERATOR: &str = "0000000000000000000000000000000000000000000000000000000000000001";
pub const ALICE: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
pub const THRESHOLD: f64 = 0.5;

/// An oracle that always answers the same way and counts its calls.
#[derive(Clone)]
pub struct FixedOracle {
    rank: Option<f64>,
    calls: Arc<AtomicUsize>,
}

impl FixedOracle {
    pub fn ranking(rank: f64) -> Self {
        Self {
            rank: Some(rank),
            calls: Arc::default(),
        }
    }

    /// An oracle that never answers in time.
    pub fn silent() -> Self {
        Self {
            rank: None,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReputationOracle for FixedOracle {
    async fn rank(&self, _pubkey: &str) -> Result<f64, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rank.ok_or(OracleError::OracleTimeout)
    }
}

pub struct Harness {
    pub ctx: RelayContext<FixedOracle>,
    pub oracle: FixedOracle,
    pub store: EventStore,
    _file: NamedTempFile,
}

pub fn harness(oracle: FixedOracle) -> Harness {
    let file = NamedTempFile::new().expect("should create temp file");
    let path = file.path().to_str().expect("utf-8 path");
    let pool = create_pool(path, DbRuntimeSettings::default()).expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
    }

    let store = EventStore::new(pool, QueryLimits::default());
    let policy = AdmissionPolicy {
        operator: OPERATOR.to_string(),
        threshold: THRESHOLD,
        tiers: TierTable::default(),
    };
    let info = RelayInfo {
        name: "palisade-test".into(),
        pubkey: OPERATOR.into(),
        ..RelayInfo::default()
    };
    let ctx = RelayContext::new(store.clone(), oracle.clone(), policy, info);

    Harness {
        ctx,
        oracle,
        store,
        _file: file,
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// An event with a fresh id, dated a minute ago.
pub fn event(pubkey: &str, kind: u32, tags: Vec<Tag>) -> Event {
    let n = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    Event {
        id: format!("{n:064x}"),
        pubkey: pubkey.to_string(),
        created_at: now() - 60,
        kind,
        tags,
        content: String::new(),
        sig: String::new(),
    }
}
