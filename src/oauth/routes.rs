//! # OAuth route configuration

use axum::Router;
use axum::routing::{get, put};

use crate::server::AppState;

/// Routes of the credential service facade, mounted under `/v1/oauth`.
pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/provider", get(super::handlers::list_oauth_providers))
        .route(
            "/provider/{provider}/authurl",
            get(super::handlers::get_auth_url),
        )
        .route(
            "/provider/{provider}",
            put(super::handlers::put_oauth_provider),
        )
        .route(
            "/provider/{provider}/credential/{credential}",
            put(super::handlers::put_oauth_credential)
                .get(super::handlers::get_oauth_credential),
        )
        .route(
            "/provider/{provider}/credential/{credential}/valid",
            get(super::handlers::get_oauth_credential_validity),
        )
}
