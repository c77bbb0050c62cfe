use super::*;
use axum::body::Body;
use axum::http::Request;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tower::ServiceExt;

fn make_state() -> (
    GatewayState,
    mpsc::Receiver<InboundEvent>,
    mpsc::Receiver<ChatCommand>,
) {
    let (events_tx, events_rx) = mpsc::channel(8);
    let (commands_tx, commands_rx) = mpsc::channel(8);
    let mut priorities = HashMap::new();
    priorities.insert("UI_COMMIT".to_string(), 4);
    let state = GatewayState::new(
        "test-secret".to_string(),
        Arc::new(SeverityClassifier::new(priorities)),
        events_tx,
        commands_tx,
    );
    (state, events_rx, commands_rx)
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/junos")
        .header("Content-Type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("Junos-Auth", sig);
    }
    let mut req = builder.body(Body::from(body.to_string())).unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
        51234,
    )));
    req
}

const EVENT_BODY: &str = r#"{
    "event": "SNMP_TRAP_LINK_DOWN",
    "process": "mib2d",
    "message": "SNMP_TRAP_LINK_DOWN: ifIndex 544",
    "hostname": "r1"
}"#;

#[tokio::test]
async fn test_health_endpoint_returns_json() {
    let (state, _events, _commands) = make_state();
    let app = build_router(state);

    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], crate::VERSION);
}

#[tokio::test]
async fn test_signed_webhook_is_classified_and_queued() {
    let (state, mut events, _commands) = make_state();
    let app = build_router(state);

    let sig = sign("test-secret", EVENT_BODY.as_bytes());
    let resp = app
        .oneshot(webhook_request(EVENT_BODY, Some(&sig)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let event = events.recv().await.unwrap();
    assert_eq!(event.event_id, "SNMP_TRAP_LINK_DOWN");
    assert_eq!(event.hostname, "r1");
    // Unknown to the configured map, so fail-open priority 1.
    assert_eq!(event.priority, 1);
    assert_eq!(
        event.source_address,
        IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))
    );
    // Event id stripped from the message text.
    assert_eq!(event.message, ": ifIndex 544");
}

#[tokio::test]
async fn test_wrong_secret_rejected_silently() {
    let (state, mut events, _commands) = make_state();
    let app = build_router(state);

    let sig = sign("other-secret", EVENT_BODY.as_bytes());
    let resp = app
        .oneshot(webhook_request(EVENT_BODY, Some(&sig)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let (state, mut events, _commands) = make_state();
    let app = build_router(state);

    let resp = app.oneshot(webhook_request(EVENT_BODY, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_authenticated_malformed_body_is_bad_request() {
    let (state, mut events, _commands) = make_state();
    let app = build_router(state);

    // Signed correctly, but missing the required hostname field.
    let body = r#"{"event": "X", "process": "p", "message": "m"}"#;
    let sig = sign("test-secret", body.as_bytes());
    let resp = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_command_callback_is_queued() {
    let (state, _events, mut commands) = make_state();
    let app = build_router(state);

    let body = r#"{
        "chat_id": "ops-channel",
        "message": "reboot r1 in 10 minutes",
        "entities": [
            {"label": "DEVICE", "value": "r1"},
            {"label": "TIME", "value": "10 minutes"}
        ]
    }"#;
    let req = Request::builder()
        .method("POST")
        .uri("/api/command")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let command = commands.recv().await.unwrap();
    assert_eq!(command.chat_id, "ops-channel");
    assert_eq!(command.devices(), vec!["r1"]);
}

#[test]
fn test_validate_webhook_signature_valid() {
    let sig = sign("secret", b"hello world");
    assert!(validate_webhook_signature("secret", &sig, b"hello world"));
}

#[test]
fn test_validate_webhook_signature_with_prefix() {
    let sig = format!("sha256={}", sign("secret", b"hello world"));
    assert!(validate_webhook_signature("secret", &sig, b"hello world"));
}

#[test]
fn test_validate_webhook_signature_invalid() {
    assert!(!validate_webhook_signature("secret", "bad-signature", b"body"));
}

#[test]
fn test_normalize_addr_unmaps_v4() {
    let mapped: IpAddr = "::ffff:192.0.2.7".parse().unwrap();
    assert_eq!(
        normalize_addr(mapped),
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7))
    );
    let v6: IpAddr = "2001:db8::1".parse().unwrap();
    assert_eq!(normalize_addr(v6), v6);
}
