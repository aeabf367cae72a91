//! # OAuth token broker
//!
//! Builds authorization redirect URLs and performs the two token-endpoint
//! exchanges: authorization code for a refresh token, and refresh token for
//! a short-lived access token. The broker never persists anything; storing
//! exchanged tokens is the caller's responsibility.

use std::time::Duration;
use thiserror::Error;

use crate::error::{GatewayError, Result};
use crate::oauth::provider::{
    AccessTokenResult, OAuthClientCredentials, OAuthProvider, TokenResponse,
};

/// Errors surfaced by the broker.
#[derive(Debug, Error)]
pub enum OAuthClientError {
    /// The provider record carries no client credentials
    #[error("provider '{0}' has no client credentials")]
    MissingClientCredentials(String),

    /// The token endpoint could not be reached (includes timeouts)
    #[error("error reaching token endpoint: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint answered with a non-200 status
    #[error("token endpoint returned {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// A 200 response whose body failed to parse as JSON
    #[error("failed to parse token endpoint response: {source}")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },

    /// A 200 response lacking the token field the grant requires
    #[error("token endpoint response did not contain {0}")]
    MissingTokenField(&'static str),
}

/// HTTP client for a provider's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    /// Create a broker whose exchanges are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::ServerInit {
                message: "failed to build token exchange HTTP client".to_string(),
                source: Some(e.into()),
            })?;
        Ok(Self { http })
    }

    /// Build the authorization redirect URL for a provider.
    ///
    /// `client_id` and `redirect_uri` are appended to the provider's login
    /// URL, joining with `?` or `&` depending on whether the login URL
    /// already carries a query string.
    pub fn authorization_url(
        &self,
        provider: &OAuthProvider,
        redirect_uri: &str,
    ) -> std::result::Result<String, OAuthClientError> {
        let credentials = client_credentials(provider)?;
        let login_url = &provider.login_url;

        let separator = if !login_url.contains('?') {
            "?"
        } else if !login_url.ends_with('&') {
            "&"
        } else {
            ""
        };

        Ok(format!(
            "{login_url}{separator}client_id={}&redirect_uri={}",
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(redirect_uri),
        ))
    }

    /// Exchange a one-time authorization code for a refresh token.
    pub async fn exchange_code_for_refresh_token(
        &self,
        provider: &OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> std::result::Result<String, OAuthClientError> {
        let credentials = client_credentials(provider)?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self.execute_token_request(provider, &form).await?;
        response
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(OAuthClientError::MissingTokenField("refresh token"))
    }

    /// Exchange a refresh token for a short-lived access token.
    pub async fn exchange_refresh_token_for_access_token(
        &self,
        provider: &OAuthProvider,
        refresh_token: &str,
    ) -> std::result::Result<AccessTokenResult, OAuthClientError> {
        let credentials = client_credentials(provider)?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self.execute_token_request(provider, &form).await?;
        let access_token = response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(OAuthClientError::MissingTokenField("access token"))?;
        Ok(AccessTokenResult {
            access_token,
            instance_url: response.instance_url,
        })
    }

    /// Probe whether a refresh token still mints access tokens.
    ///
    /// Remote failures — transport errors, timeouts, non-200 statuses — all
    /// report `false`; only a 200 response with a corrupted body is an
    /// error.
    pub async fn check_credential_validity(
        &self,
        provider: &OAuthProvider,
        refresh_token: &str,
    ) -> std::result::Result<bool, OAuthClientError> {
        let credentials = client_credentials(provider)?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = match self
            .http
            .post(&provider.token_refresh_url)
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(provider = %provider.name, error = %err, "validity probe failed to reach token endpoint");
                return Ok(false);
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            return Ok(false);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(provider = %provider.name, error = %err, "validity probe failed to read response body");
                return Ok(false);
            }
        };
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|source| OAuthClientError::InvalidResponse { source })?;

        Ok(parsed
            .access_token
            .is_some_and(|token| !token.is_empty()))
    }

    /// POST the form to the provider's token endpoint and parse a 200
    /// response body.
    async fn execute_token_request(
        &self,
        provider: &OAuthProvider,
        form: &[(&str, &str)],
    ) -> std::result::Result<TokenResponse, OAuthClientError> {
        let response = self
            .http
            .post(&provider.token_refresh_url)
            .form(form)
            .send()
            .await
            .map_err(|source| OAuthClientError::Transport { source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| OAuthClientError::Transport { source })?;

        if status != reqwest::StatusCode::OK {
            return Err(OAuthClientError::Upstream {
                status: status.as_u16(),
                detail: body,
            });
        }

        serde_json::from_str(&body).map_err(|source| OAuthClientError::InvalidResponse { source })
    }
}

fn client_credentials(
    provider: &OAuthProvider,
) -> std::result::Result<&OAuthClientCredentials, OAuthClientError> {
    provider
        .client_credentials
        .as_ref()
        .ok_or_else(|| OAuthClientError::MissingClientCredentials(provider.name.clone()))
}
