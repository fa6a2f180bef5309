// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bridge HTTP server implementation
//!
//! Every request walks the same gate sequence before routing: method check,
//! streaming body-size cap, JSON parse, envelope authentication, rate
//! admission. The gates live in one middleware so a request cannot reach a
//! handler without having passed all of them, and each terminal outcome is
//! audited exactly once on whichever branch ends the request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info};

use aegis_bridge_core::application::{ContextService, DelegationService};
use aegis_bridge_core::domain::config::BridgeConfig;
use aegis_bridge_core::domain::context::ContextUpdate;
use aegis_bridge_core::domain::delegation::DelegationRequest;
use aegis_bridge_core::domain::envelope::Envelope;
use aegis_bridge_core::domain::error::BridgeError;
use aegis_bridge_core::infrastructure::audit::{AuditLevel, AuditLog};
use aegis_bridge_core::infrastructure::auth::AuthGuard;
use aegis_bridge_core::infrastructure::rate_limiter::RateLimiter;
use aegis_bridge_core::infrastructure::store::FileStore;

/// Streaming body cap; the connection is refused past this point without
/// ever buffering the full body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long in-flight requests may drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Interval between idle rate-window sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Shared service state, constructed once at startup.
pub struct BridgeState {
    pub auth: AuthGuard,
    pub limiter: RateLimiter,
    pub delegation: DelegationService,
    pub context: ContextService,
    pub audit: Arc<AuditLog>,
}

/// Envelope fields that survive the gate sequence into handlers.
#[derive(Clone)]
struct AuthedEnvelope {
    instance_id: String,
    payload: serde_json::Value,
}

/// Initialize stores and services from configuration.
pub async fn build_state(config: &BridgeConfig, secret: String) -> Result<Arc<BridgeState>> {
    let store = Arc::new(
        FileStore::new(&config.shared_context_path)
            .await
            .context("Failed to initialize shared-context store")?,
    );
    let audit = Arc::new(
        AuditLog::open(&config.audit_log_path)
            .await
            .context("Failed to open audit log")?,
    );

    Ok(Arc::new(BridgeState {
        auth: AuthGuard::new(secret),
        limiter: RateLimiter::new(config.rate_limit as usize),
        delegation: DelegationService::new(
            store.clone(),
            audit.clone(),
            config.max_delegation_depth,
        ),
        context: ContextService::new(store, audit.clone()),
        audit,
    }))
}

/// Build the HTTP router with the envelope gate wrapped around every route,
/// the fallback included.
pub fn build_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/delegate", post(delegate_handler))
        .route("/context/update", post(context_update_handler))
        .route("/health", post(health_handler))
        .fallback(unknown_route_handler)
        .layer(middleware::from_fn_with_state(state.clone(), envelope_gate))
        .with_state(state)
}

/// Run the bridge until a shutdown signal arrives, then drain and flush.
pub async fn serve(config: BridgeConfig, secret: String) -> Result<()> {
    let state = build_state(&config, secret).await?;
    let app = build_router(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Bridge listening on {}", addr);
    state.audit.record(
        AuditLevel::Info,
        &format!("Bridge service started on port {}", config.port),
        json!({}),
    );

    // Reclaim rate windows of instances that stopped calling entirely.
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = sweeper.limiter.evict_idle();
            if evicted > 0 {
                debug!(evicted, "evicted idle rate windows");
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    state
        .audit
        .record(AuditLevel::Info, "Shutting down bridge service", json!({}));
    state.audit.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    // Bound the drain: a stuck handler must not hold the process open.
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        error!("Graceful shutdown timed out; forcing exit");
        std::process::exit(1);
    });
}

/// The gate sequence every request passes before routing.
async fn envelope_gate(
    State(state): State<Arc<BridgeState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        state.audit.record(
            AuditLevel::Warn,
            "Method not allowed",
            json!({"method": request.method().as_str(), "path": request.uri().path()}),
        );
        return reject(&BridgeError::MethodNotAllowed);
    }

    let (parts, body) = request.into_parts();

    // Read incrementally up to the cap; past it the body is abandoned
    // unparsed and the caller gets 413.
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            state.audit.record(
                AuditLevel::Warn,
                "Request body too large",
                json!({"path": parts.uri.path()}),
            );
            return reject(&BridgeError::BodyTooLarge);
        }
    };

    let value: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => {
            state.audit.record(
                AuditLevel::Warn,
                "Malformed request body",
                json!({"path": parts.uri.path()}),
            );
            return reject(&BridgeError::InvalidJson);
        }
    };

    let envelope = match Envelope::from_value(value) {
        Ok(envelope) => envelope,
        Err(err) => {
            state.audit.record(
                AuditLevel::Warn,
                "Missing envelope fields",
                json!({"path": parts.uri.path()}),
            );
            return reject(&err);
        }
    };

    if let Err(err) = state.auth.verify(
        &envelope.instance_id,
        envelope.timestamp,
        &envelope.payload,
        &envelope.signature,
    ) {
        match &err {
            BridgeError::TimestampOutOfRange { drift_ms } => state.audit.record(
                AuditLevel::Warn,
                "Request timestamp out of range",
                json!({"instanceId": envelope.instance_id, "drift": drift_ms}),
            ),
            _ => state.audit.record(
                AuditLevel::Warn,
                "Invalid signature",
                json!({"instanceId": envelope.instance_id}),
            ),
        }
        return reject(&err);
    }

    if !state.limiter.admit(&envelope.instance_id) {
        state.audit.record(
            AuditLevel::Warn,
            "Rate limit exceeded",
            json!({"instanceId": envelope.instance_id}),
        );
        return reject(&BridgeError::RateLimited);
    }

    let mut request = Request::from_parts(parts, Body::empty());
    request.extensions_mut().insert(AuthedEnvelope {
        instance_id: envelope.instance_id,
        payload: envelope.payload,
    });
    next.run(request).await
}

async fn delegate_handler(
    State(state): State<Arc<BridgeState>>,
    Extension(envelope): Extension<AuthedEnvelope>,
) -> Response {
    let request: DelegationRequest = match serde_json::from_value(envelope.payload) {
        Ok(request) => request,
        Err(err) => {
            debug!(%err, "delegation payload did not deserialize");
            state.audit.record(
                AuditLevel::Warn,
                "Invalid delegation payload",
                json!({"instanceId": envelope.instance_id}),
            );
            return reject(&BridgeError::InvalidPayload("Invalid delegation payload"));
        }
    };

    match state.delegation.delegate(request).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(err) => reject(&err),
    }
}

async fn context_update_handler(
    State(state): State<Arc<BridgeState>>,
    Extension(envelope): Extension<AuthedEnvelope>,
) -> Response {
    let update: ContextUpdate = match serde_json::from_value(envelope.payload) {
        Ok(update) => update,
        Err(err) => {
            debug!(%err, "context payload did not deserialize");
            state.audit.record(
                AuditLevel::Warn,
                "Invalid context payload",
                json!({"instanceId": envelope.instance_id}),
            );
            return reject(&BridgeError::InvalidPayload("Invalid context payload"));
        }
    };

    match state.context.update(update).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(err) => reject(&err),
    }
}

async fn health_handler(
    State(state): State<Arc<BridgeState>>,
    Extension(envelope): Extension<AuthedEnvelope>,
) -> Response {
    state.audit.record(
        AuditLevel::Info,
        "Health check",
        json!({"instanceId": envelope.instance_id}),
    );
    Json(json!({"status": "healthy"})).into_response()
}

async fn unknown_route_handler(
    State(state): State<Arc<BridgeState>>,
    Extension(envelope): Extension<AuthedEnvelope>,
    uri: Uri,
) -> Response {
    state.audit.record(
        AuditLevel::Warn,
        "Unknown route",
        json!({"instanceId": envelope.instance_id, "path": uri.path()}),
    );
    reject(&BridgeError::NotFound)
}

/// Map a pipeline outcome to its HTTP response. Bodies are always
/// `{"error": message}`; internal causes never reach the caller.
fn reject(err: &BridgeError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": err.to_string()}))).into_response()
}
