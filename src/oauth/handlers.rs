//! # Credential service facade
//!
//! The externally reachable OAuth operation surface. Handlers compose the
//! registry and the token broker and are the only callers of either; every
//! failure is mapped to the [`OAuthServiceError`] taxonomy before a response
//! leaves the facade.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::oauth::error::OAuthServiceError;
use crate::oauth::provider::{
    CredentialIsValidResponse, GetAccessTokenResponse, OAuthProvider, OAuthRefreshToken,
    PutOAuthCredentialRequest, PutOAuthProviderRequest,
};
use crate::security::{AuditLogContext, AuditOutcome, SecurityContextHandle};
use crate::server::AppState;

/// Query parameters of the authorize-URL operation.
#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    /// Redirect URI to embed in the authorization URL
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Deprecated spelling kept for older callers
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Query parameters of the provider write operation.
#[derive(Debug, Deserialize)]
pub struct PutProviderQuery {
    /// Keep the previously stored client credentials instead of the body's
    #[serde(default)]
    pub reuse_client_credentials: bool,
}

/// `GET /v1/oauth/provider/{provider}/authurl`
///
/// Responds with the constructed authorization URL as plain text.
pub async fn get_auth_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<AuthUrlQuery>,
) -> Result<String, OAuthServiceError> {
    let provider = load_provider(&state, &provider).await?;

    // Older callers send redirect_url; the current spelling wins when both
    // are present.
    let redirect_uri = query
        .redirect_uri
        .filter(|uri| !uri.is_empty())
        .or(query.redirect_url)
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| OAuthServiceError::bad_request("missing redirect URI"))?;

    let url = state
        .oauth_client()
        .authorization_url(&provider, &redirect_uri)?;
    Ok(url)
}

/// `PUT /v1/oauth/provider/{provider}`
pub async fn put_oauth_provider(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(query): Query<PutProviderQuery>,
    Extension(security): Extension<SecurityContextHandle>,
    payload: Result<Json<PutOAuthProviderRequest>, JsonRejection>,
) -> Result<StatusCode, OAuthServiceError> {
    let Json(request) = payload
        .map_err(|rejection| OAuthServiceError::bad_request(format!("invalid JSON: {rejection}")))?;

    // Both endpoint URLs must parse as absolute URLs before anything is
    // persisted.
    for (field, value) in [
        ("loginURL", &request.login_url),
        ("tokenRefreshURL", &request.token_refresh_url),
    ] {
        Url::parse(value)
            .map_err(|e| OAuthServiceError::bad_request(format!("invalid {field}: {e}")))?;
    }

    let client_credentials = if query.reuse_client_credentials {
        None
    } else {
        match (request.client_id, request.client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(crate::oauth::provider::OAuthClientCredentials {
                    client_id,
                    client_secret,
                })
            }
            _ => {
                return Err(OAuthServiceError::bad_request(
                    "missing client id or client secret",
                ));
            }
        }
    };

    tracing::info!(
        provider = %provider_name,
        reuse_client_credentials = query.reuse_client_credentials,
        "writing OAuth provider"
    );

    let record = OAuthProvider {
        name: provider_name.clone(),
        login_url: request.login_url,
        token_refresh_url: request.token_refresh_url,
        client_credentials,
    };
    state
        .oauth_store()
        .write_provider(record, query.reuse_client_credentials)
        .await?;

    record_audit(
        &security,
        "put_oauth_provider",
        format!("provider/{provider_name}"),
    );
    Ok(StatusCode::OK)
}

/// `PUT /v1/oauth/provider/{provider}/credential/{credential}`
///
/// Exchanges the one-time code for a refresh token and persists it under the
/// `(provider, credential id)` pair. The token is only written after a fully
/// successful exchange.
pub async fn put_oauth_credential(
    State(state): State<AppState>,
    Path((provider_name, credential_id)): Path<(String, String)>,
    Extension(security): Extension<SecurityContextHandle>,
    payload: Result<Json<PutOAuthCredentialRequest>, JsonRejection>,
) -> Result<StatusCode, OAuthServiceError> {
    let Json(request) = payload
        .map_err(|rejection| OAuthServiceError::bad_request(format!("invalid JSON: {rejection}")))?;

    let one_time_code = request
        .one_time_code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthServiceError::bad_request("invalid request: missing one-time code"))?;
    let redirect_uri = request
        .redirect_uri
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| OAuthServiceError::bad_request("invalid request: missing redirect URI"))?;

    let provider = load_provider(&state, &provider_name).await?;
    let refresh_token = state
        .oauth_client()
        .exchange_code_for_refresh_token(&provider, &one_time_code, &redirect_uri)
        .await?;

    let record = OAuthRefreshToken {
        refresh_token,
        redirect_uri,
    };
    state
        .oauth_store()
        .write_refresh_token(&provider_name, &credential_id, &record)
        .await?;

    record_audit(
        &security,
        "put_oauth_credential",
        format!("provider/{provider_name}/credential/{credential_id}"),
    );
    Ok(StatusCode::OK)
}

/// `GET /v1/oauth/provider/{provider}/credential/{credential}`
///
/// Mints a short-lived access token from the stored refresh token. Nothing
/// is persisted.
pub async fn get_oauth_credential(
    State(state): State<AppState>,
    Path((provider_name, credential_id)): Path<(String, String)>,
    Extension(security): Extension<SecurityContextHandle>,
) -> Result<Json<GetAccessTokenResponse>, OAuthServiceError> {
    let provider = load_provider(&state, &provider_name).await?;
    let refresh_token = load_refresh_token(&state, &provider_name, &credential_id).await?;

    let result = state
        .oauth_client()
        .exchange_refresh_token_for_access_token(&provider, &refresh_token.refresh_token)
        .await?;

    record_audit(
        &security,
        "get_oauth_credential",
        format!("provider/{provider_name}/credential/{credential_id}"),
    );
    Ok(Json(result.into()))
}

/// `GET /v1/oauth/provider/{provider}/credential/{credential}/valid`
pub async fn get_oauth_credential_validity(
    State(state): State<AppState>,
    Path((provider_name, credential_id)): Path<(String, String)>,
) -> Result<Json<CredentialIsValidResponse>, OAuthServiceError> {
    let provider = load_provider(&state, &provider_name).await?;
    let refresh_token = load_refresh_token(&state, &provider_name, &credential_id).await?;

    let valid = state
        .oauth_client()
        .check_credential_validity(&provider, &refresh_token.refresh_token)
        .await?;
    Ok(Json(CredentialIsValidResponse { valid }))
}

/// `GET /v1/oauth/provider`
///
/// Names only; stored records (and their secrets) are never exposed.
pub async fn list_oauth_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, OAuthServiceError> {
    let providers = state.oauth_store().list_providers().await?;
    Ok(Json(providers))
}

async fn load_provider(
    state: &AppState,
    name: &str,
) -> Result<OAuthProvider, OAuthServiceError> {
    state
        .oauth_store()
        .get_provider(name)
        .await?
        .ok_or_else(|| OAuthServiceError::not_found(format!("unknown OAuth provider: {name}")))
}

async fn load_refresh_token(
    state: &AppState,
    provider: &str,
    credential_id: &str,
) -> Result<OAuthRefreshToken, OAuthServiceError> {
    state
        .oauth_store()
        .get_refresh_token(provider, credential_id)
        .await?
        .ok_or_else(|| {
            OAuthServiceError::not_found(format!("unknown OAuth credential: {credential_id}"))
        })
}

fn record_audit(security: &SecurityContextHandle, operation: &str, resource: String) {
    let event = AuditLogContext::new(operation, resource, AuditOutcome::Success)
        .with_identity(security.user_id(), security.user_ip());
    security.append_audit_event(event);
}
