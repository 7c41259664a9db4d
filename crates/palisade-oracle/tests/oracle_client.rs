//! Oracle client tests against scripted and in-process relays.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use palisade_oracle::{
    ClientMessage, OracleClient, OracleConfig, OracleError, RelayConnection, RelayMessage,
    RelayTransport, ReputationOracle, WsTransport,
};
use palisade_types::{verify_event, Event, RelayKeys, Tag};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const SECRET: &str = "0101010101010101010101010101010101010101010101010101010101010101";
const TARGET: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

fn keys() -> RelayKeys {
    RelayKeys::from_secret_hex(SECRET).unwrap()
}

fn answer(kind: u32, request_id: &str, tags: Vec<Tag>, content: &str) -> Event {
    let mut all_tags = vec![Tag::new(["e", request_id])];
    all_tags.extend(tags);
    Event {
        id: format!("answer-{kind}"),
        pubkey: "oracle".into(),
        created_at: 1,
        kind,
        tags: all_tags,
        content: content.into(),
        sig: String::new(),
    }
}

// ── scripted transport ───────────────────────────────────────────────

type Script = fn(&str, &Event) -> Vec<RelayMessage>;

struct ScriptedTransport {
    script: Script,
}

struct ScriptedConnection {
    script: Script,
    subscription_id: String,
    inbox: VecDeque<RelayMessage>,
}

impl RelayTransport for ScriptedTransport {
    type Connection = ScriptedConnection;

    async fn connect(&self, _url: &str) -> Result<ScriptedConnection, OracleError> {
        Ok(ScriptedConnection {
            script: self.script,
            subscription_id: String::new(),
            inbox: VecDeque::new(),
        })
    }
}

impl RelayConnection for ScriptedConnection {
    async fn send(&mut self, msg: ClientMessage) -> Result<(), OracleError> {
        match msg {
            ClientMessage::Req {
                subscription_id, ..
            } => self.subscription_id = subscription_id,
            ClientMessage::Event(ev) => {
                assert!(
                    !self.subscription_id.is_empty(),
                    "must subscribe before publishing"
                );
                let replies = (self.script)(&self.subscription_id, &ev);
                self.inbox.extend(replies);
            }
            ClientMessage::Close(_) => {}
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RelayMessage>, OracleError> {
        Ok(self.inbox.pop_front())
    }

    async fn close(self) {}
}

fn scripted(script: Script) -> OracleClient<ScriptedTransport> {
    OracleClient::with_transport(ScriptedTransport { script }, keys(), OracleConfig::default())
}

#[tokio::test]
async fn scripted_result_yields_rank_and_skips_noise() {
    let client = scripted(|sub, req| {
        vec![
            RelayMessage::Notice("hello".into()),
            RelayMessage::Ok {
                event_id: req.id.clone(),
                accepted: true,
                message: String::new(),
            },
            // Unrelated event on our subscription is ignored.
            RelayMessage::Event {
                subscription_id: sub.to_string(),
                event: Box::new(answer(6312, "someone-else", vec![], "[]")),
            },
            RelayMessage::Event {
                subscription_id: sub.to_string(),
                event: Box::new(answer(
                    6312,
                    &req.id,
                    vec![],
                    &json!([{"pubkey": TARGET, "rank": 0.25}]).to_string(),
                )),
            },
        ]
    });
    assert_eq!(client.rank(TARGET).await.unwrap(), 0.25);
}

#[tokio::test]
async fn publish_refusal_is_reported() {
    let client = scripted(|_, req| {
        vec![RelayMessage::Ok {
            event_id: req.id.clone(),
            accepted: false,
            message: "rate-limited: slow down".into(),
        }]
    });
    match client.rank(TARGET).await {
        Err(OracleError::PublishRejected(msg)) => assert_eq!(msg, "rate-limited: slow down"),
        other => panic!("expected publish rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn closed_connection_before_answer() {
    let client = scripted(|_, _| Vec::new());
    assert!(matches!(
        client.rank(TARGET).await,
        Err(OracleError::ConnectionClosed)
    ));
}

#[test]
fn request_is_signed_and_names_target() {
    let client = scripted(|_, _| Vec::new());
    let request = client.build_request(TARGET).unwrap();
    verify_event(&request).unwrap();
    assert_eq!(request.kind, 5312);
    assert_eq!(request.pubkey, keys().public_key_hex());
    assert_eq!(
        request.tags,
        vec![
            Tag::new(["param", "target", TARGET]),
            Tag::new(["param", "limit", "7"]),
        ]
    );
}

// ── WebSocket transport ──────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Behaviour {
    Rank(f64),
    Error(&'static str),
    Silent,
}

/// Accepts one connection and plays an oracle relay.
async fn spawn_oracle(behaviour: Behaviour) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let mut subscription_id = None;
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            match frame[0].as_str() {
                Some("REQ") => {
                    assert_eq!(frame[2]["kinds"], json!([6312, 7000]));
                    subscription_id = Some(frame[1].as_str().unwrap().to_string());
                }
                Some("EVENT") => {
                    let sub = subscription_id.clone().expect("REQ must precede EVENT");
                    let request: Event = serde_json::from_value(frame[1].clone()).unwrap();
                    verify_event(&request).unwrap();
                    ws.send(Message::Text(
                        json!(["OK", request.id, true, ""]).to_string().into(),
                    ))
                    .await
                    .unwrap();

                    let reply = match behaviour {
                        Behaviour::Rank(rank) => answer(
                            6312,
                            &request.id,
                            vec![],
                            &json!([{"pubkey": TARGET, "rank": rank}]).to_string(),
                        ),
                        Behaviour::Error(msg) => answer(
                            7000,
                            &request.id,
                            vec![Tag::new(["status", "error", msg])],
                            "",
                        ),
                        Behaviour::Silent => continue,
                    };
                    ws.send(Message::Text(
                        json!(["EVENT", sub, reply]).to_string().into(),
                    ))
                    .await
                    .unwrap();
                }
                _ => {}
            }
        }
    });

    (url, handle)
}

fn ws_client(url: String, timeout: Duration) -> OracleClient {
    OracleClient::new(keys(), OracleConfig { url, timeout })
}

#[tokio::test]
async fn websocket_rank_round_trip() {
    let (url, server) = spawn_oracle(Behaviour::Rank(0.0031)).await;
    let rank = ws_client(url, Duration::from_secs(5)).rank(TARGET).await.unwrap();
    assert_eq!(rank, 0.0031);
    server.abort();
}

#[tokio::test]
async fn websocket_job_error_is_rejection() {
    let (url, server) = spawn_oracle(Behaviour::Error("target unknown")).await;
    let err = ws_client(url, Duration::from_secs(5))
        .rank(TARGET)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::OracleRejected(ref m) if m == "target unknown"));
    server.abort();
}

#[tokio::test]
async fn silent_oracle_times_out() {
    let (url, server) = spawn_oracle(Behaviour::Silent).await;
    let err = ws_client(url, Duration::from_millis(200))
        .rank(TARGET)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::OracleTimeout));
    server.abort();
}

#[tokio::test]
async fn unreachable_relay_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = ws_client(url, Duration::from_secs(2))
        .rank(TARGET)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Transport(_)));
}

#[tokio::test]
async fn secure_urls_reach_the_tls_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("wss://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            use tokio::io::AsyncWriteExt;
            let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        }
    });

    let err = WsTransport
        .connect(&url)
        .await
        .err()
        .expect("plaintext peer must fail the TLS handshake");
    match err {
        OracleError::Transport(msg) => {
            assert!(!msg.contains("TLS support not compiled in"), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
    server.abort();
}
