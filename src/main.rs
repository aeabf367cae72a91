//! # Credential Gateway
//!
//! Request-security gateway: authenticates every inbound request, guarantees
//! audit delivery, and brokers OAuth credentials for registered providers.

use std::sync::Arc;

use credential_gateway::secure_store::MemorySecretStore;
use credential_gateway::security::TracingAuditLogWriter;
use credential_gateway::server::{AppState, GatewayServer};
use credential_gateway::{AppConfig, Result, logging};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging(None);

    let config = AppConfig::load()?;
    tracing::info!(
        internal_auth_enabled = config.security.internal_auth_enabled,
        audit_logging_enabled = config.security.audit_logging_enabled,
        "configuration loaded"
    );

    let secret_store = Arc::new(MemorySecretStore::new());
    let audit_writer = Arc::new(TracingAuditLogWriter);
    let state = AppState::new(config.clone(), secret_store, audit_writer)?;

    let server = GatewayServer::new(config, state);
    if let Err(e) = server.serve().await {
        tracing::error!(error = %e, "gateway terminated with error");
        return Err(e);
    }

    tracing::info!("gateway shut down");
    Ok(())
}
