//! # Security context
//!
//! Request-scoped holder of the caller's identity, credential, origin
//! address and the accumulating audit-event queue. A fresh context is
//! created for every inbound request and handed to downstream code through
//! the request extensions; it is never shared between two in-flight
//! requests.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::security::audit::AuditLogContext;

/// Sentinel user id meaning "no user id header was present".
pub const EMPTY_USER_ID: &str = "gateway-empty-user-id";
/// Sentinel credential value meaning "no credential was presented".
pub const EMPTY_USER_CREDENTIAL: &str = "gateway-empty-user-credential";
/// Sentinel origin address meaning "no origin header was present".
pub const EMPTY_USER_IP: &str = "gateway-empty-user-ip";

/// Credential classification carried in the authorization header.
///
/// The set is closed: an authorization header naming anything else is a
/// client bug and fails authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CredentialType {
    /// System-to-system credential minted inside the platform
    Internal,
    /// End-user bearer credential obtained from an external identity source
    External,
}

impl CredentialType {
    /// Wire name used as the `<type>` half of the authorization header.
    #[must_use]
    pub const fn qualified_name(self) -> &'static str {
        match self {
            Self::Internal => "Internal",
            Self::External => "External",
        }
    }
}

/// Error returned when an authorization header names an unknown type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown credential type: {0}")]
pub struct UnknownCredentialType(pub String);

impl FromStr for CredentialType {
    type Err = UnknownCredentialType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Internal" => Ok(Self::Internal),
            "External" => Ok(Self::External),
            other => Err(UnknownCredentialType(other.to_string())),
        }
    }
}

/// A caller credential: the raw value plus its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Raw credential value
    pub value: String,
    /// Credential classification
    pub credential_type: CredentialType,
}

impl Credential {
    /// Create a credential
    pub fn new<S: Into<String>>(value: S, credential_type: CredentialType) -> Self {
        Self {
            value: value.into(),
            credential_type,
        }
    }

    /// The sentinel credential distinguishing "no credential presented" from
    /// "not yet evaluated".
    #[must_use]
    pub fn empty() -> Self {
        Self::new(EMPTY_USER_CREDENTIAL, CredentialType::Internal)
    }
}

/// Identity resolved from the request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    /// User id, if resolved
    pub user_id: Option<String>,
    /// Credential, if resolved
    pub credential: Option<Credential>,
    /// Origin address, if resolved
    pub user_ip: Option<String>,
}

/// Mutable request-scoped security state.
///
/// Contract: the owning request task sets the identity exactly once between
/// resets, and drains the audit queue at most once, after downstream
/// processing has finished.
#[derive(Debug, Default)]
pub struct SecurityContext {
    user_id: Option<String>,
    credential: Option<Credential>,
    user_ip: Option<String>,
    audit_queue: VecDeque<AuditLogContext>,
}

impl SecurityContext {
    /// Clear all fields to their unset state and empty the audit queue.
    pub fn reset(&mut self) {
        self.user_id = None;
        self.credential = None;
        self.user_ip = None;
        self.audit_queue.clear();
    }

    /// Install the resolved identity.
    pub fn set_identity(&mut self, identity: RequestIdentity) {
        self.user_id = identity.user_id;
        self.credential = identity.credential;
        self.user_ip = identity.user_ip;
    }

    /// Append an audit event to the request's queue.
    pub fn append_audit_event(&mut self, event: AuditLogContext) {
        self.audit_queue.push_back(event);
    }

    /// Return the queued audit events, leaving the queue empty.
    pub fn drain_audit_queue(&mut self) -> VecDeque<AuditLogContext> {
        std::mem::take(&mut self.audit_queue)
    }

    /// Resolved user id, if any
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Resolved credential, if any
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Resolved origin address, if any
    #[must_use]
    pub fn user_ip(&self) -> Option<&str> {
        self.user_ip.as_deref()
    }

    /// Number of queued audit events
    #[must_use]
    pub fn audit_queue_len(&self) -> usize {
        self.audit_queue.len()
    }
}

/// Cloneable handle to the current request's [`SecurityContext`].
///
/// One handle is created per request by the authentication interceptor and
/// injected into the request extensions. The handle is confined to the task
/// processing that request; the mutex only exists to satisfy the extension
/// bounds, it is never contended across requests.
#[derive(Debug, Clone, Default)]
pub struct SecurityContextHandle {
    inner: Arc<Mutex<SecurityContext>>,
}

impl SecurityContextHandle {
    /// Create a handle around a freshly reset context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`SecurityContext::reset`].
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// See [`SecurityContext::set_identity`].
    pub fn set_identity(&self, identity: RequestIdentity) {
        self.lock().set_identity(identity);
    }

    /// See [`SecurityContext::append_audit_event`].
    pub fn append_audit_event(&self, event: AuditLogContext) {
        self.lock().append_audit_event(event);
    }

    /// See [`SecurityContext::drain_audit_queue`].
    #[must_use]
    pub fn drain_audit_queue(&self) -> VecDeque<AuditLogContext> {
        self.lock().drain_audit_queue()
    }

    /// Resolved user id, if any
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.lock().user_id().map(str::to_string)
    }

    /// Resolved credential, if any
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential().cloned()
    }

    /// Resolved origin address, if any
    #[must_use]
    pub fn user_ip(&self) -> Option<String> {
        self.lock().user_ip().map(str::to_string)
    }

    /// Number of queued audit events
    #[must_use]
    pub fn audit_queue_len(&self) -> usize {
        self.lock().audit_queue_len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SecurityContext> {
        // A poisoned mutex means a panic mid-update on the same request task;
        // the context contents are still the best record we have for audit.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
