//! # Audit events and delivery
//!
//! Audit events record authorization-relevant decisions made while a request
//! is processed. They accumulate on the request's security context and are
//! published in one batch once the request terminates, whatever the exit
//! path. Delivery is at-least-once; the sink is expected to tolerate the
//! occasional duplicate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded on an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    /// The operation completed
    Success,
    /// The operation failed
    Failure,
    /// The operation was refused by policy
    Denied,
}

/// One audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogContext {
    /// Event id
    pub event_id: Uuid,
    /// Acting user id, if one was resolved
    pub user_id: Option<String>,
    /// Origin address, if one was resolved
    pub user_ip: Option<String>,
    /// Operation that was decided, e.g. `put_oauth_provider`
    pub operation: String,
    /// Resource the operation acted on
    pub resource: String,
    /// Decision outcome
    pub outcome: AuditOutcome,
    /// When the decision was made
    pub occurred_at: DateTime<Utc>,
}

impl AuditLogContext {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new<O: Into<String>, R: Into<String>>(
        operation: O,
        resource: R,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id: None,
            user_ip: None,
            operation: operation.into(),
            resource: resource.into(),
            outcome,
            occurred_at: Utc::now(),
        }
    }

    /// Attach the acting identity.
    #[must_use]
    pub fn with_identity(mut self, user_id: Option<String>, user_ip: Option<String>) -> Self {
        self.user_id = user_id;
        self.user_ip = user_ip;
        self
    }
}

/// External audit sink.
///
/// The transport behind this trait (messaging system, RPC, …) is out of
/// scope for the gateway; implementations only promise at-least-once
/// delivery of the batch.
#[async_trait]
pub trait AuditLogWriter: Send + Sync {
    /// Publish a batch of audit events.
    async fn publish(&self, events: Vec<AuditLogContext>) -> anyhow::Result<()>;
}

/// Audit sink that emits each event as structured JSON under the `audit`
/// tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogWriter;

#[async_trait]
impl AuditLogWriter for TracingAuditLogWriter {
    async fn publish(&self, events: Vec<AuditLogContext>) -> anyhow::Result<()> {
        for event in events {
            let payload = serde_json::to_string(&event)?;
            tracing::info!(target: "audit", %payload, "audit event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_construction() {
        let event = AuditLogContext::new("get_oauth_credential", "provider/sf", AuditOutcome::Success)
            .with_identity(Some("alice".to_string()), Some("10.1.2.3".to_string()));
        assert_eq!(event.operation, "get_oauth_credential");
        assert_eq!(event.resource, "provider/sf");
        assert_eq!(event.user_id.as_deref(), Some("alice"));
        assert_eq!(event.outcome, AuditOutcome::Success);
    }

    #[test]
    fn test_event_serializes_outcome_tag() {
        let event = AuditLogContext::new("op", "res", AuditOutcome::Denied);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "DENIED");
        assert_eq!(json["operation"], "op");
    }

    #[tokio::test]
    async fn test_tracing_writer_accepts_batch() {
        let writer = TracingAuditLogWriter;
        let events = vec![AuditLogContext::new("op", "res", AuditOutcome::Success)];
        writer.publish(events).await.unwrap();
    }
}
