//! # Gateway server
//!
//! Axum HTTP server wiring: application state, router assembly and the
//! middleware stack. The authentication interceptor is layered outermost so
//! that every request — the OAuth facade, health probes, anything mounted
//! later — passes through it.

use axum::Router;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::oauth::{OAuthClient, OAuthStore};
use crate::secure_store::SecretStore;
use crate::security::{AuditLogWriter, authentication_interceptor};

/// Shared application context
pub struct AppContext {
    config: AppConfig,
    oauth_store: OAuthStore,
    oauth_client: OAuthClient,
    audit_writer: Arc<dyn AuditLogWriter>,
}

/// Cloneable application state handed to routers and middleware
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    /// Build the application state from its collaborators.
    pub fn new(
        config: AppConfig,
        secret_store: Arc<dyn SecretStore>,
        audit_writer: Arc<dyn AuditLogWriter>,
    ) -> Result<Self> {
        let oauth_client = OAuthClient::new(Duration::from_secs(
            config.oauth.token_exchange_timeout_secs,
        ))?;
        let oauth_store = OAuthStore::new(secret_store);
        Ok(Self {
            context: Arc::new(AppContext {
                config,
                oauth_store,
                oauth_client,
                audit_writer,
            }),
        })
    }

    /// Application configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    /// OAuth provider/token registry
    #[must_use]
    pub fn oauth_store(&self) -> &OAuthStore {
        &self.context.oauth_store
    }

    /// OAuth token broker
    #[must_use]
    pub fn oauth_client(&self) -> &OAuthClient {
        &self.context.oauth_client
    }

    /// Audit sink
    #[must_use]
    pub fn audit_writer(&self) -> Arc<dyn AuditLogWriter> {
        Arc::clone(&self.context.audit_writer)
    }
}

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    let enable_cors = state.config().server.enable_cors;

    let mut app = Router::new()
        .nest("/v1/oauth", crate::oauth::routes::oauth_routes())
        .route("/ping", get(ping_handler))
        .with_state(state.clone());

    let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    if enable_cors {
        let cors_layer = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::PUT,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
            .allow_origin(Any);
        app = app.layer(service_builder.layer(cors_layer));
    } else {
        app = app.layer(service_builder);
    }

    // Outermost: every request is authenticated and audited.
    app.layer(axum::middleware::from_fn_with_state(
        state,
        authentication_interceptor,
    ))
}

/// Liveness probe
async fn ping_handler() -> &'static str {
    "pong"
}

/// The gateway HTTP server
pub struct GatewayServer {
    config: AppConfig,
    router: Router,
}

impl GatewayServer {
    /// Create a server from configuration and state.
    pub fn new(config: AppConfig, state: AppState) -> Self {
        let router = create_router(state);
        Self { config, router }
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        let bind_address = &self.config.server.bind_address;
        let ip = bind_address
            .parse::<std::net::IpAddr>()
            .map_err(|e| GatewayError::config(format!("invalid bind address '{bind_address}': {e}")))?;
        let addr = SocketAddr::new(ip, self.config.server.port);

        tracing::info!(%addr, "starting credential gateway");
        let listener = TcpListener::bind(&addr).await?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| GatewayError::Network {
                message: format!("server error: {e}"),
                source: Some(e.into()),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_store::MemorySecretStore;
    use crate::security::TracingAuditLogWriter;

    #[test]
    fn test_state_construction() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemorySecretStore::new()),
            Arc::new(TracingAuditLogWriter),
        )
        .unwrap();
        assert!(state.config().security.audit_logging_enabled);
        let _router = create_router(state);
    }
}
