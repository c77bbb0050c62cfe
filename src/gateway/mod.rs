//! HTTP edge for opsrelay.
//!
//! Receives signed event webhooks from device agents and command callbacks
//! from the chat-bot framework, verifies and normalizes them, and feeds the
//! dispatcher through the inbound channels. No long work happens here.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{ChatCommand, Entity, InboundEvent, WireEvent};
use crate::classify::SeverityClassifier;

type HmacSha256 = Hmac<Sha256>;

/// Max webhook payload size: 1 MB.
const WEBHOOK_MAX_BODY: usize = 1_048_576;

/// Signature header the device agent sends; the generic name is accepted as
/// an alias for other webhook emitters.
const SIGNATURE_HEADERS: [&str; 2] = ["Junos-Auth", "X-Webhook-Signature"];

/// Shared state between HTTP handlers and the dispatcher.
#[derive(Clone)]
pub struct GatewayState {
    secret: Arc<str>,
    classifier: Arc<SeverityClassifier>,
    events_tx: mpsc::Sender<InboundEvent>,
    commands_tx: mpsc::Sender<ChatCommand>,
}

impl GatewayState {
    pub fn new(
        secret: String,
        classifier: Arc<SeverityClassifier>,
        events_tx: mpsc::Sender<InboundEvent>,
        commands_tx: mpsc::Sender<ChatCommand>,
    ) -> Self {
        Self {
            secret: secret.into(),
            classifier,
            events_tx,
            commands_tx,
        }
    }
}

/// Command callback body from the chat-bot framework: the raw message plus
/// the entities its extractor found.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub chat_id: String,
    pub message: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/webhook/junos", post(webhook_handler))
        .route("/api/command", post(command_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Validate an HMAC-SHA256 signature against a payload.
pub fn validate_webhook_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Support both raw hex and "sha256=..." prefix (GitHub-style)
    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    expected.as_bytes().ct_eq(sig.as_bytes()).into()
}

/// POST /webhook/junos - receive a signed event from a device agent.
///
/// An invalid or missing signature is dropped silently (403, local log
/// only): the caller is unauthenticated, so nothing goes to chat.
async fn webhook_handler(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if body.len() > WEBHOOK_MAX_BODY {
        warn!("webhook: payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE;
    }

    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok());

    let Some(signature) = signature else {
        warn!("webhook from {}: missing signature header", addr);
        return StatusCode::FORBIDDEN;
    };

    if !validate_webhook_signature(&state.secret, signature, &body) {
        warn!("webhook from {}: invalid signature", addr);
        return StatusCode::FORBIDDEN;
    }

    let wire: WireEvent = match serde_json::from_slice(&body) {
        Ok(wire) => wire,
        Err(e) => {
            // Authenticated but unparseable - log locally, no notification.
            warn!("webhook from {}: malformed event: {}", addr, e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let event = state.classifier.classify(wire.into_event(normalize_addr(addr.ip())));
    debug!(
        "webhook accepted: event={}, host={}, priority={}",
        event.event_id, event.hostname, event.priority
    );

    if let Err(e) = state.events_tx.send(event).await {
        error!("failed to queue inbound event: {}", e);
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

/// POST /api/command - operator command callback from the chat framework.
async fn command_handler(
    State(state): State<GatewayState>,
    Json(body): Json<CommandRequest>,
) -> impl IntoResponse {
    let command = ChatCommand {
        chat_id: body.chat_id,
        raw_message: body.message,
        entities: body.entities,
    };

    debug!(
        "command accepted: chat_id={}, entities={}",
        command.chat_id,
        command.entities.len()
    );

    if let Err(e) = state.commands_tx.send(command).await {
        error!("failed to queue chat command: {}", e);
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

/// GET /api/health - health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Devices behind NAT-less IPv4 report as mapped addresses when the listener
/// is dual-stack; unmap so the log sink records the real v4 source.
fn normalize_addr(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    }
}

/// Start the HTTP server. Returns the join handle of the serving task.
pub async fn start(
    host: &str,
    port: u16,
    state: GatewayState,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("gateway listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            error!("gateway server error: {}", e);
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests;
