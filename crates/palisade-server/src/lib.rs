//! Palisade relay server library logic.
//!
//! Wires the event store, the admission controller, and the reputation
//! oracle into a [`RelayContext`], exposes the relay hooks in [`relay`], and
//! builds the HTTP router.

pub mod admission;
pub mod api;
pub mod config;
pub mod relay;

use std::sync::Arc;

use admission::{AdmissionController, AdmissionPolicy, TierTable};
use axum::{routing::get, Extension, Router};
use config::Config;
use palisade_db::DbPool;
use palisade_oracle::{OracleClient, ReputationOracle};
use palisade_store::EventStore;
use palisade_types::{KeyError, RelayKeys};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Public relay metadata served as the NIP-11 document.
#[derive(Debug, Clone, Default)]
pub struct RelayInfo {
    /// Relay display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Operator pubkey, hex.
    pub pubkey: String,
    /// Operator contact URI.
    pub contact: String,
    /// Icon URL.
    pub icon: String,
    /// Banner URL.
    pub banner: String,
}

/// Everything a request handler needs, passed explicitly.
pub struct RelayContext<O = OracleClient> {
    /// Event persistence and access lists.
    pub store: EventStore,
    /// Admission policy.
    pub admission: AdmissionController<O>,
    /// NIP-11 metadata.
    pub info: RelayInfo,
}

impl<O: ReputationOracle> RelayContext<O> {
    /// Assembles a context from its parts.
    pub fn new(store: EventStore, oracle: O, policy: AdmissionPolicy, info: RelayInfo) -> Self {
        let admission = AdmissionController::new(store.clone(), oracle, policy);
        Self {
            store,
            admission,
            info,
        }
    }
}

impl RelayContext<OracleClient> {
    /// Builds the production context from configuration and a migrated pool.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if `relay.secret_key` is not a valid secret key.
    pub fn from_config(config: &Config, pool: DbPool) -> Result<Self, KeyError> {
        let keys = RelayKeys::from_secret_hex(&config.relay.secret_key)?;
        let store = EventStore::new(pool, config.query.limits());
        let oracle = OracleClient::new(keys, config.oracle.client_config());

        let tiers = if config.admission.tiers.is_empty() {
            TierTable::default()
        } else {
            TierTable::new(
                config
                    .admission
                    .tiers
                    .iter()
                    .map(|row| (row.tier, row.kinds.clone())),
            )
        };
        let policy = AdmissionPolicy {
            operator: config.relay.pubkey.clone(),
            threshold: config.admission.threshold,
            tiers,
        };
        let info = RelayInfo {
            name: config.relay.name.clone(),
            description: config.relay.description.clone(),
            pubkey: config.relay.pubkey.clone(),
            contact: config.relay.contact.clone(),
            icon: config.relay.icon.clone(),
            banner: config.relay.banner.clone(),
        };

        Ok(Self::new(store, oracle, policy, info))
    }
}

/// Builds the application router with all routes.
pub fn app<O: ReputationOracle + 'static>(ctx: RelayContext<O>) -> Router {
    Router::new()
        .route("/", get(api::relay_info_handler::<O>))
        .route("/health", get(api::health))
        .route("/api/v1/accept", get(api::accept_handler::<O>))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(ctx)))
}
