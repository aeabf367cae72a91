//! Authentication interceptor properties: context reset between requests,
//! header parsing rules, and audit publish guarantees.

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use credential_gateway::config::AppConfig;
use credential_gateway::secure_store::MemorySecretStore;
use credential_gateway::security::{
    AuditLogContext, AuditLogWriter, AuditOutcome, SecurityContextHandle,
    authentication_interceptor,
};
use credential_gateway::server::AppState;

/// Audit sink double recording each published batch.
#[derive(Default)]
struct RecordingAuditLogWriter {
    batches: Mutex<Vec<Vec<AuditLogContext>>>,
}

impl RecordingAuditLogWriter {
    fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    fn batches(&self) -> Vec<Vec<AuditLogContext>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuditLogWriter for RecordingAuditLogWriter {
    async fn publish(&self, events: Vec<AuditLogContext>) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(events);
        Ok(())
    }
}

/// Downstream probe reporting what it observes on the security context.
async fn probe_handler(Extension(security): Extension<SecurityContextHandle>) -> Json<Value> {
    Json(json!({
        "user_id": security.user_id(),
        "user_ip": security.user_ip(),
        "credential_value": security.credential().map(|c| c.value),
        "credential_type": security.credential().map(|c| c.credential_type.qualified_name()),
        "audit_queue_len": security.audit_queue_len(),
    }))
}

/// Downstream handler appending two audit events.
async fn append_handler(Extension(security): Extension<SecurityContextHandle>) -> StatusCode {
    security.append_audit_event(
        AuditLogContext::new("first-op", "resource-a", AuditOutcome::Success)
            .with_identity(security.user_id(), security.user_ip()),
    );
    security.append_audit_event(AuditLogContext::new(
        "second-op",
        "resource-b",
        AuditOutcome::Denied,
    ));
    StatusCode::OK
}

fn test_app(
    internal_auth_enabled: bool,
    audit_logging_enabled: bool,
) -> (Router, Arc<RecordingAuditLogWriter>) {
    let mut config = AppConfig::default();
    config.security.internal_auth_enabled = internal_auth_enabled;
    config.security.audit_logging_enabled = audit_logging_enabled;

    let writer = Arc::new(RecordingAuditLogWriter::default());
    let state = AppState::new(
        config,
        Arc::new(MemorySecretStore::new()),
        writer.clone() as Arc<dyn AuditLogWriter>,
    )
    .unwrap();

    let app = Router::new()
        .route("/probe", get(probe_handler))
        .route("/append", get(append_handler))
        .layer(axum::middleware::from_fn_with_state(
            state,
            authentication_interceptor,
        ));
    (app, writer)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn get_with_headers(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn probe(app: &Router, headers: &[(&str, &str)]) -> Value {
    let (status, body) = send(app, get_with_headers("/probe", headers)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_unknown_credential_type_is_rejected_regardless_of_mode() {
    for internal_auth_enabled in [false, true] {
        let (app, _writer) = test_app(internal_auth_enabled, true);
        let response = app
            .clone()
            .oneshot(get_with_headers("/probe", &[("authorization", "BOGUS abc")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CONNECTION).unwrap(),
            "close"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_malformed_header_is_fatal_only_with_internal_auth() {
    // Internal auth required: 401.
    let (app, _writer) = test_app(true, true);
    let (status, _) = send(&app, get_with_headers("/probe", &[("authorization", "garbled")])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Auth optional: the request proceeds without a credential.
    let (app, _writer) = test_app(false, true);
    let observed = probe(&app, &[("authorization", "garbled")]).await;
    assert_eq!(observed["credential_value"], Value::Null);
}

#[tokio::test]
async fn test_sentinel_identity_when_internal_auth_enabled() {
    let (app, _writer) = test_app(true, true);
    let observed = probe(&app, &[]).await;
    assert_eq!(observed["user_id"], json!("gateway-empty-user-id"));
    assert_eq!(observed["user_ip"], json!("gateway-empty-user-ip"));
    assert_eq!(
        observed["credential_value"],
        json!("gateway-empty-user-credential")
    );
    assert_eq!(observed["credential_type"], json!("Internal"));
}

#[tokio::test]
async fn test_headers_resolve_identity() {
    let (app, _writer) = test_app(false, true);
    let observed = probe(
        &app,
        &[
            ("x-gateway-userid", "alice"),
            ("x-gateway-userip", "10.9.8.7"),
            ("authorization", "External tok-42"),
        ],
    )
    .await;
    assert_eq!(observed["user_id"], json!("alice"));
    assert_eq!(observed["user_ip"], json!("10.9.8.7"));
    assert_eq!(observed["credential_value"], json!("tok-42"));
    assert_eq!(observed["credential_type"], json!("External"));
}

#[tokio::test]
async fn test_context_is_reset_between_requests() {
    let (app, _writer) = test_app(false, true);

    // First request resolves an identity and appends audit events.
    let (status, _) = send(
        &app,
        get_with_headers("/append", &[("x-gateway-userid", "alice")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The next request observes a fully reset context: no identity carry-over
    // and an empty audit queue before any downstream work.
    let observed = probe(&app, &[]).await;
    assert_eq!(observed["user_id"], Value::Null);
    assert_eq!(observed["credential_value"], Value::Null);
    assert_eq!(observed["user_ip"], Value::Null);
    assert_eq!(observed["audit_queue_len"], json!(0));
}

#[tokio::test]
async fn test_exactly_one_publish_per_request_with_events() {
    let (app, writer) = test_app(false, true);

    let (status, _) = send(
        &app,
        get_with_headers("/append", &[("x-gateway-userid", "alice")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let batches = writer.batches();
    assert_eq!(batches.len(), 1);
    let operations: Vec<&str> = batches[0].iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(operations, vec!["first-op", "second-op"]);
    // Events carry the identity resolved by the interceptor.
    assert_eq!(batches[0][0].user_id.as_deref(), Some("alice"));

    // A second request publishes its own batch, and only its own events.
    send(&app, get_with_headers("/append", &[])).await;
    let batches = writer.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[1][0].user_id, None);
}

#[tokio::test]
async fn test_no_publish_for_empty_queue() {
    let (app, writer) = test_app(false, true);
    let (status, _) = send(&app, get_with_headers("/probe", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(writer.batch_count(), 0);
}

#[tokio::test]
async fn test_no_publish_when_audit_logging_disabled() {
    let (app, writer) = test_app(false, false);
    let (status, _) = send(&app, get_with_headers("/append", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(writer.batch_count(), 0);
}

#[tokio::test]
async fn test_authentication_failure_still_flushes_before_401() {
    // The 401 path runs the same flush; with an empty queue that means zero
    // publishes, not a crash or a stale batch.
    let (app, writer) = test_app(true, true);
    let (status, _) = send(
        &app,
        get_with_headers("/append", &[("authorization", "garbled")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(writer.batch_count(), 0);
}
