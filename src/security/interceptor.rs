//! # Authentication interceptor
//!
//! Middleware fronting every inbound request. It derives the request's
//! security context from the identity headers, hands the context to
//! downstream handlers through the request extensions, and guarantees that
//! the context's audit queue reaches the audit sink on every exit path:
//! normal response, error response, or abrupt termination of the request
//! future.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::security::audit::{AuditLogContext, AuditLogWriter};
use crate::security::context::{
    Credential, CredentialType, EMPTY_USER_ID, EMPTY_USER_IP, RequestIdentity,
    SecurityContextHandle,
};
use crate::server::AppState;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-gateway-userid";
/// Header carrying the caller's origin address.
pub const USER_IP_HEADER: &str = "x-gateway-userip";

/// Authentication failure that terminates a request with a 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    /// The authorization header had no `<type> <value>` separator
    #[error("invalid authorization header format")]
    MalformedAuthorizationHeader,
    /// The authorization header named a type outside the known set
    #[error("unknown credential type in authorization header: {0}")]
    UnknownCredentialType(String),
}

/// Resolve the request identity from the inbound headers.
///
/// With internal auth enabled the identity starts from the well-known
/// sentinels, so downstream code always observes an explicit "no credential"
/// state rather than an absent one. Identity headers then override the
/// sentinels. A present-but-malformed authorization header is fatal when
/// internal auth is required; a header naming an unknown credential type is
/// fatal unconditionally, since it indicates a broken client rather than a
/// missing credential.
pub fn parse_request_identity(
    headers: &HeaderMap,
    internal_auth_enabled: bool,
) -> Result<RequestIdentity, AuthenticationError> {
    let mut identity = RequestIdentity::default();

    if internal_auth_enabled {
        identity.user_id = Some(EMPTY_USER_ID.to_string());
        identity.credential = Some(Credential::empty());
        identity.user_ip = Some(EMPTY_USER_IP.to_string());
    }

    if let Some(user_id) = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
        identity.user_id = Some(user_id.to_string());
    }
    if let Some(user_ip) = headers.get(USER_IP_HEADER).and_then(|v| v.to_str().ok()) {
        identity.user_ip = Some(user_ip.to_string());
    }

    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let auth_header = auth_header.trim();
        match auth_header.find(' ') {
            None => {
                tracing::error!(
                    user_id = ?identity.user_id,
                    user_ip = ?identity.user_ip,
                    "invalid authorization header format"
                );
                if internal_auth_enabled {
                    return Err(AuthenticationError::MalformedAuthorizationHeader);
                }
            }
            Some(idx) => {
                let credential_type: CredentialType =
                    auth_header[..idx].parse().map_err(|_| {
                        tracing::error!(
                            credential_type = %&auth_header[..idx],
                            "unknown credential type in authorization header"
                        );
                        AuthenticationError::UnknownCredentialType(auth_header[..idx].to_string())
                    })?;
                let value = auth_header[idx + 1..].trim();
                identity.credential = Some(Credential::new(value, credential_type));
            }
        }
    }

    Ok(identity)
}

/// Per-connection holder of the most recently completed request's audit
/// queue, between "request processed" and "queue published".
///
/// The attachment is the only owner of the drained queue, publishes it at
/// most once (take-and-clear), and — through its `Drop` implementation —
/// publishes leftovers when the request future is torn down before the
/// normal flush, so an abrupt connection close cannot lose events.
pub struct ChannelAuditAttachment {
    context: SecurityContextHandle,
    writer: Arc<dyn AuditLogWriter>,
    enabled: bool,
    pending: Option<VecDeque<AuditLogContext>>,
    published: bool,
}

impl ChannelAuditAttachment {
    /// Create an attachment bound to one request's security context.
    pub fn new(
        context: SecurityContextHandle,
        writer: Arc<dyn AuditLogWriter>,
        enabled: bool,
    ) -> Self {
        Self {
            context,
            writer,
            enabled,
            pending: None,
            published: false,
        }
    }

    /// Move the request's audit queue out of the security context and onto
    /// the attachment, clearing the context's queue.
    pub fn attach_from_context(&mut self) {
        if self.pending.is_none() {
            let queue = self.context.drain_audit_queue();
            if !queue.is_empty() {
                self.pending = Some(queue);
            }
        }
    }

    /// Publish the attached queue and clear it. Subsequent calls are no-ops.
    pub async fn publish(&mut self) {
        if self.published {
            return;
        }
        self.published = true;
        let Some(queue) = self.pending.take() else {
            return;
        };
        if !self.enabled {
            return;
        }
        if let Err(err) = self.writer.publish(queue.into_iter().collect()).await {
            tracing::error!(error = %err, "failed to publish audit log queue");
        }
    }
}

impl Drop for ChannelAuditAttachment {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        self.attach_from_context();
        let Some(queue) = self.pending.take() else {
            return;
        };
        if !self.enabled {
            return;
        }
        let events: Vec<AuditLogContext> = queue.into_iter().collect();
        // The request future was dropped before the normal flush; hand the
        // batch to the runtime so delivery still happens.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let writer = Arc::clone(&self.writer);
            handle.spawn(async move {
                if let Err(err) = writer.publish(events).await {
                    tracing::error!(error = %err, "failed to publish audit log queue on teardown");
                }
            });
        } else {
            tracing::error!(
                dropped_events = events.len(),
                "audit queue dropped outside a runtime"
            );
        }
    }
}

/// Authentication middleware.
///
/// A fresh security context per request is the reset contract: no state can
/// leak from request N into request N+1, on the same connection or across
/// connections. The audit flush for a request is sequenced strictly after
/// its downstream processing and before the response is handed back to the
/// connection.
pub async fn authentication_interceptor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let security = SecurityContextHandle::new();
    let mut attachment = ChannelAuditAttachment::new(
        security.clone(),
        state.audit_writer(),
        state.config().security.audit_logging_enabled,
    );

    let internal_auth_enabled = state.config().security.internal_auth_enabled;
    match parse_request_identity(request.headers(), internal_auth_enabled) {
        Ok(identity) => {
            tracing::trace!(
                %request_id,
                user_id = ?identity.user_id,
                user_ip = ?identity.user_ip,
                "resolved request identity"
            );
            security.set_identity(identity);
        }
        Err(err) => {
            tracing::error!(%request_id, error = %err, "request failed authentication");
            // Partial audit state is still flushed before the 401 goes out.
            attachment.attach_from_context();
            attachment.publish().await;
            return unauthenticated_response();
        }
    }

    request.extensions_mut().insert(security.clone());
    let response = next.run(request).await;

    attachment.attach_from_context();
    attachment.publish().await;
    response
}

/// 401 with an empty body and connection-close semantics.
fn unauthenticated_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
