//! Reputation requests against a DVM-style ranking oracle.
//!
//! The exchange is a single request/response over a relay:
//!
//! 1. subscribe to `{"kinds": [6312, 7000], "#e": [<request id>]}`,
//! 2. publish a signed kind-5312 request naming the target pubkey,
//! 3. wait for the first result (6312) or job feedback (7000) that
//!    references the request.
//!
//! Subscribing before publishing means a fast oracle cannot answer into
//! the gap. The whole exchange, connect included, races one deadline.

use std::future::Future;
use std::time::Duration;

use palisade_types::{
    Event, EventDraft, Filter, RelayKeys, Tag, KIND_JOB_FEEDBACK, KIND_REPUTATION_REQUEST,
    KIND_REPUTATION_RESULT,
};
use serde::Deserialize;

use crate::error::OracleError;
use crate::message::{ClientMessage, RelayMessage};
use crate::transport::{RelayConnection, RelayTransport};
use crate::ws::WsTransport;

/// Default oracle relay.
pub const DEFAULT_ORACLE_URL: &str = "wss://relay.vertexlab.io";

/// Default deadline for one rank request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of ranked entries requested alongside the target.
const RESULT_LIMIT: &str = "7";

/// Something that can rank a pubkey.
///
/// The admission controller depends on this seam, not on the concrete
/// client, so policy can be tested without a network.
pub trait ReputationOracle: Send + Sync {
    /// Returns the rank of `pubkey`. Thresholding is the caller's job.
    fn rank(&self, pubkey: &str) -> impl Future<Output = Result<f64, OracleError>> + Send;
}

/// Client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// Relay the oracle listens on.
    pub url: String,
    /// Deadline covering connect, publish, and wait.
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ORACLE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RankEntry {
    pubkey: String,
    rank: f64,
}

/// Asks a ranking oracle for reputation scores.
///
/// Holds no connection between calls; each [`rank`](ReputationOracle::rank)
/// opens its own and closes it when done.
#[derive(Debug, Clone)]
pub struct OracleClient<T = WsTransport> {
    transport: T,
    keys: RelayKeys,
    config: OracleConfig,
}

impl OracleClient<WsTransport> {
    /// Creates a client speaking WebSocket.
    pub fn new(keys: RelayKeys, config: OracleConfig) -> Self {
        Self::with_transport(WsTransport, keys, config)
    }
}

impl<T: RelayTransport> OracleClient<T> {
    /// Creates a client over an arbitrary transport.
    pub fn with_transport(transport: T, keys: RelayKeys, config: OracleConfig) -> Self {
        Self {
            transport,
            keys,
            config,
        }
    }

    /// The client settings.
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Builds and signs the rank request for `pubkey`.
    pub fn build_request(&self, pubkey: &str) -> Result<Event, OracleError> {
        let draft = EventDraft {
            kind: KIND_REPUTATION_REQUEST,
            created_at: chrono::Utc::now().timestamp(),
            tags: vec![
                Tag::new(["param", "target", pubkey]),
                Tag::new(["param", "limit", RESULT_LIMIT]),
            ],
            content: String::new(),
        };
        Ok(self.keys.sign(draft)?)
    }

    async fn exchange(&self, request: &Event) -> Result<Event, OracleError> {
        let mut conn = self.transport.connect(&self.config.url).await?;
        let subscription_id = uuid::Uuid::new_v4().simple().to_string();

        let result = async {
            conn.send(ClientMessage::Req {
                subscription_id: subscription_id.clone(),
                filters: vec![Filter::default()
                    .kind(KIND_REPUTATION_RESULT)
                    .kind(KIND_JOB_FEEDBACK)
                    .tag("e", request.id.clone())],
            })
            .await?;
            conn.send(ClientMessage::Event(request.clone())).await?;
            wait_for_response(&mut conn, &subscription_id, &request.id).await
        }
        .await;

        let _ = conn.send(ClientMessage::Close(subscription_id)).await;
        conn.close().await;
        result
    }
}

impl<T: RelayTransport> ReputationOracle for OracleClient<T> {
    async fn rank(&self, pubkey: &str) -> Result<f64, OracleError> {
        let request = self.build_request(pubkey)?;
        tracing::debug!(target_pubkey = pubkey, request = %request.id, "requesting rank");

        let response = tokio::time::timeout(self.config.timeout, self.exchange(&request))
            .await
            .map_err(|_| {
                tracing::warn!(target_pubkey = pubkey, url = %self.config.url, "oracle timed out");
                OracleError::OracleTimeout
            })??;

        let rank = interpret_response(&response, pubkey)?;
        tracing::info!(target_pubkey = pubkey, rank, "oracle rank received");
        Ok(rank)
    }
}

async fn wait_for_response<C: RelayConnection>(
    conn: &mut C,
    subscription_id: &str,
    request_id: &str,
) -> Result<Event, OracleError> {
    loop {
        let Some(msg) = conn.recv().await? else {
            return Err(OracleError::ConnectionClosed);
        };
        match msg {
            RelayMessage::Event {
                subscription_id: sub,
                event,
            } if sub == subscription_id => {
                let answers = matches!(event.kind, KIND_REPUTATION_RESULT | KIND_JOB_FEEDBACK)
                    && event.tag_values("e").any(|id| id == request_id);
                if answers {
                    return Ok(*event);
                }
            }
            RelayMessage::Ok {
                event_id,
                accepted: false,
                message,
            } if event_id == request_id => {
                return Err(OracleError::PublishRejected(message));
            }
            RelayMessage::Closed {
                subscription_id: sub,
                message,
            } if sub == subscription_id => {
                return Err(OracleError::Transport(format!(
                    "subscription closed: {message}"
                )));
            }
            RelayMessage::Notice(notice) => {
                tracing::debug!(notice = %notice, "oracle relay notice");
            }
            _ => {}
        }
    }
}

/// Extracts the rank of `pubkey` from a result or feedback event.
pub fn interpret_response(response: &Event, pubkey: &str) -> Result<f64, OracleError> {
    match response.kind {
        KIND_JOB_FEEDBACK => {
            let message = response
                .tags
                .iter()
                .find(|t| t.0.len() >= 3 && t.0[1] == "error")
                .map(|t| t.0[2].clone())
                .unwrap_or_default();
            Err(OracleError::OracleRejected(message))
        }
        KIND_REPUTATION_RESULT => {
            let entries: Vec<RankEntry> = serde_json::from_str(&response.content)
                .map_err(|e| OracleError::InvalidResponse(format!("rank list: {e}")))?;
            entries
                .into_iter()
                .find(|entry| entry.pubkey == pubkey)
                .map(|entry| entry.rank)
                .ok_or(OracleError::PubkeyNotRanked)
        }
        other => Err(OracleError::InvalidResponse(format!(
            "unexpected response kind {other}"
        ))),
    }
}
