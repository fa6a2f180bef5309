// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the bridge request pipeline
//!
//! These tests drive the real router end to end:
//! 1. Build state against temp storage with a known secret
//! 2. Send signed (or deliberately broken) envelopes
//! 3. Verify status codes, response bodies, and persisted side effects

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use aegis_bridge::daemon::{build_router, build_state, BridgeState};
use aegis_bridge_core::domain::config::BridgeConfig;
use aegis_bridge_core::infrastructure::auth::AuthGuard;

const SECRET: &str = "integration-test-secret";

struct TestBridge {
    router: Router,
    state: Arc<BridgeState>,
    dir: TempDir,
}

async fn bridge_with(rate_limit: u32, max_depth: usize) -> TestBridge {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BridgeConfig {
        shared_context_path: dir.path().join("shared-context"),
        audit_log_path: dir.path().join("bridge-audit.log"),
        rate_limit,
        max_delegation_depth: max_depth,
        ..BridgeConfig::default()
    };
    let state = build_state(&config, SECRET.to_string())
        .await
        .expect("state builds");
    TestBridge {
        router: build_router(state.clone()),
        state,
        dir,
    }
}

async fn bridge() -> TestBridge {
    bridge_with(60, 5).await
}

fn signed_envelope(instance_id: &str, payload: Value) -> Value {
    let timestamp = chrono::Utc::now().timestamp_millis();
    signed_envelope_at(instance_id, payload, timestamp)
}

fn signed_envelope_at(instance_id: &str, payload: Value, timestamp: i64) -> Value {
    let signature = AuthGuard::new(SECRET).sign(instance_id, timestamp, &payload);
    json!({
        "instanceId": instance_id,
        "timestamp": timestamp,
        "signature": signature,
        "payload": payload,
    })
}

fn post(path: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request builds")
}

async fn send(bridge: &TestBridge, request: Request<Body>) -> (StatusCode, Value) {
    let response = bridge
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is JSON")
    };
    (status, body)
}

// ── Envelope gates ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_post_method_rejected_405() {
    let bridge = bridge().await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&bridge, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn test_oversized_body_rejected_413_before_any_side_effect() {
    let bridge = bridge().await;
    let oversized = "a".repeat(1024 * 1024 + 1);
    let (status, body) = send(&bridge, post("/delegate", oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Request body too large");

    // Nothing was parsed or persisted.
    let delegations: Vec<_> =
        std::fs::read_dir(bridge.dir.path().join("shared-context/delegations"))
            .unwrap()
            .collect();
    assert!(delegations.is_empty());
}

#[tokio::test]
async fn test_malformed_json_rejected_400() {
    let bridge = bridge().await;
    let (status, body) = send(&bridge, post("/delegate", "{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_missing_envelope_fields_rejected_400() {
    let bridge = bridge().await;
    let body = json!({"instanceId": "claw-a", "payload": {}}).to_string();
    let (status, response) = send(&bridge, post("/delegate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Missing required fields");
}

#[tokio::test]
async fn test_stale_timestamp_rejected_401_despite_valid_signature() {
    let bridge = bridge().await;
    let stale = chrono::Utc::now().timestamp_millis() - 31_000;
    let envelope = signed_envelope_at("claw-a", json!({}), stale);
    let (status, body) = send(&bridge, post("/health", envelope.to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Request timestamp out of range");
}

#[tokio::test]
async fn test_tampered_signature_rejected_401() {
    let bridge = bridge().await;
    let mut envelope = signed_envelope("claw-a", json!({}));
    let signature = envelope["signature"].as_str().unwrap();
    let tampered = if signature.ends_with('0') {
        format!("{}1", &signature[..signature.len() - 1])
    } else {
        format!("{}0", &signature[..signature.len() - 1])
    };
    envelope["signature"] = json!(tampered);

    let (status, body) = send(&bridge, post("/health", envelope.to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid signature");
}

#[tokio::test]
async fn test_payload_mutation_after_signing_rejected_401() {
    let bridge = bridge().await;
    let mut envelope = signed_envelope("claw-a", json!({"toInstance": "b"}));
    envelope["payload"]["toInstance"] = json!("attacker");
    let (status, body) = send(&bridge, post("/delegate", envelope.to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid signature");
}

#[tokio::test]
async fn test_rate_limit_exhaustion_rejected_429() {
    let bridge = bridge_with(2, 5).await;
    for _ in 0..2 {
        let envelope = signed_envelope("claw-busy", json!({}));
        let (status, _) = send(&bridge, post("/health", envelope.to_string())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let envelope = signed_envelope("claw-busy", json!({}));
    let (status, body) = send(&bridge, post("/health", envelope.to_string())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded");

    // A different instance still has its own budget.
    let envelope = signed_envelope("claw-idle", json!({}));
    let (status, _) = send(&bridge, post("/health", envelope.to_string())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_rejected_404_after_auth() {
    let bridge = bridge().await;
    let envelope = signed_envelope("claw-a", json!({}));
    let (status, body) = send(&bridge, post("/nope", envelope.to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

// ── Routes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_returns_static_body() {
    let bridge = bridge().await;
    let envelope = signed_envelope("claw-a", json!({}));
    let (status, body) = send(&bridge, post("/health", envelope.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_delegation_accepted_and_persisted() {
    let bridge = bridge().await;
    let payload = json!({
        "fromInstance": "claw-a",
        "toInstance": "claw-b",
        "task": {"type": "review", "prompt": "check the build"},
        "delegationChain": [],
    });
    let envelope = signed_envelope("claw-a", payload);
    let (status, body) = send(&bridge, post("/delegate", envelope.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    let delegation_id = body["delegationId"].as_str().expect("generated id");

    let path = bridge
        .dir
        .path()
        .join(format!("shared-context/delegations/{delegation_id}.json"));
    let record: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(record["from"], "claw-a");
    assert_eq!(record["to"], "claw-b");
    assert_eq!(record["chain"], json!(["claw-a"]));
}

#[tokio::test]
async fn test_delegation_loop_rejected_400() {
    let bridge = bridge().await;
    let payload = json!({
        "fromInstance": "claw-b",
        "toInstance": "claw-a",
        "task": {"type": "review"},
        "delegationChain": ["claw-a", "claw-b"],
    });
    let envelope = signed_envelope("claw-b", payload);
    let (status, body) = send(&bridge, post("/delegate", envelope.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Delegation loop detected");
}

#[tokio::test]
async fn test_delegation_depth_rejected_400() {
    let bridge = bridge_with(60, 2).await;
    let payload = json!({
        "fromInstance": "claw-c",
        "toInstance": "claw-d",
        "task": {"type": "review"},
        "delegationChain": ["claw-a", "claw-b"],
    });
    let envelope = signed_envelope("claw-c", payload);
    let (status, body) = send(&bridge, post("/delegate", envelope.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum delegation depth exceeded");
}

#[tokio::test]
async fn test_context_update_roundtrip_and_overwrite() {
    let bridge = bridge().await;

    for (n, value) in ["first", "second"].iter().enumerate() {
        let payload = json!({
            "instanceId": "claw-a",
            "contextKey": "build-status",
            "value": {"phase": value},
            "signature": format!("sig-{n}"),
        });
        let envelope = signed_envelope("claw-a", payload);
        let (status, body) = send(&bridge, post("/context/update", envelope.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "updated", "key": "build-status"}));
    }

    let path = bridge
        .dir
        .path()
        .join("shared-context/context/build-status.json");
    let record: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(record["value"]["phase"], "second");
    assert_eq!(record["signature"], "sig-1");
    assert_eq!(record["updatedBy"], "claw-a");
}

#[tokio::test]
async fn test_invalid_context_key_rejected_400() {
    let bridge = bridge().await;
    let payload = json!({
        "instanceId": "claw-a",
        "contextKey": "bad key!",
        "value": 1,
    });
    let envelope = signed_envelope("claw-a", payload);
    let (status, body) = send(&bridge, post("/context/update", envelope.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid context key format");

    let entries: Vec<_> = std::fs::read_dir(bridge.dir.path().join("shared-context/context"))
        .unwrap()
        .collect();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_payload_not_matching_route_shape_rejected_400() {
    let bridge = bridge().await;
    // Authenticated envelope whose payload lacks toInstance/task.
    let envelope = signed_envelope("claw-a", json!({"fromInstance": "claw-a"}));
    let (status, body) = send(&bridge, post("/delegate", envelope.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid delegation payload");
}

// ── Audit trail ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_terminal_outcome_writes_one_audit_line() {
    let bridge = bridge().await;

    // One success, one auth rejection, one validation rejection.
    let ok = signed_envelope("claw-a", json!({}));
    send(&bridge, post("/health", ok.to_string())).await;

    let stale = signed_envelope_at(
        "claw-a",
        json!({}),
        chrono::Utc::now().timestamp_millis() - 60_000,
    );
    send(&bridge, post("/health", stale.to_string())).await;

    let looped = signed_envelope(
        "claw-b",
        json!({
            "fromInstance": "claw-b",
            "toInstance": "claw-a",
            "task": {},
            "delegationChain": ["claw-a"],
        }),
    );
    send(&bridge, post("/delegate", looped.to_string())).await;

    bridge.state.audit.flush().await;
    let log = std::fs::read_to_string(bridge.dir.path().join("bridge-audit.log")).unwrap();
    let lines: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["message"], "Health check");
    assert_eq!(lines[1]["message"], "Request timestamp out of range");
    assert_eq!(lines[2]["message"], "Delegation loop detected");
    for line in &lines {
        assert!(line["timestamp"].is_string());
        assert!(line["level"].is_string());
    }
}
