//! HTTP surface tests.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{harness, FixedOracle, ALICE, THRESHOLD};
use palisade_server::app;
use serde_json::Value;
use tower::ServiceExt; // for oneshot

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, content_type, json)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let h = harness(FixedOracle::silent());
    let (status, _, json) = get(app(h.ctx), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn relay_info_document() {
    let h = harness(FixedOracle::silent());
    let (status, content_type, json) = get(app(h.ctx), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/nostr+json"));
    assert_eq!(json["name"], "palisade-test");
    assert!(json["supported_nips"].as_array().unwrap().contains(&Value::from(11)));
}

#[tokio::test]
async fn accept_requires_pubkey() {
    let h = harness(FixedOracle::ranking(1.0));
    let (status, _, json) = get(app(h.ctx), "/api/v1/accept").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["accept"], false);
}

#[tokio::test]
async fn accept_rejects_malformed_pubkey() {
    let h = harness(FixedOracle::ranking(1.0));
    let (status, _, _) = get(app(h.ctx), "/api/v1/accept?pubkey=npub1nothing").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.oracle.calls(), 0);
}

#[tokio::test]
async fn accept_reports_rank_against_threshold() {
    let high = harness(FixedOracle::ranking(THRESHOLD + 0.1));
    let (status, _, json) = get(app(high.ctx), &format!("/api/v1/accept?pubkey={ALICE}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accept"], true);

    let low = harness(FixedOracle::ranking(THRESHOLD));
    let (status, _, json) = get(app(low.ctx), &format!("/api/v1/accept?pubkey={ALICE}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accept"], false);
    // The endpoint only reports; it never blacklists.
    assert!(!low.store.is_blacklisted(ALICE).await.unwrap());
}

#[tokio::test]
async fn accept_decodes_npub() {
    let h = harness(FixedOracle::ranking(1.0));
    let npub = bech32::encode::<bech32::Bech32>(
        bech32::Hrp::parse("npub").unwrap(),
        &hex::decode(ALICE).unwrap(),
    )
    .unwrap();
    let (status, _, json) = get(app(h.ctx), &format!("/api/v1/accept?pubkey={npub}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accept"], true);
    assert_eq!(h.oracle.calls(), 1);
}

#[tokio::test]
async fn accept_forbids_blacklisted() {
    let h = harness(FixedOracle::ranking(1.0));
    h.store.add_to_blacklist(ALICE).await.unwrap();
    let (status, _, json) = get(app(h.ctx), &format!("/api/v1/accept?pubkey={ALICE}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["accept"], false);
    assert_eq!(h.oracle.calls(), 0);
}

#[tokio::test]
async fn accept_oracle_failure_is_server_error() {
    let h = harness(FixedOracle::silent());
    let (status, _, json) = get(app(h.ctx), &format!("/api/v1/accept?pubkey={ALICE}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["accept"], false);
}
