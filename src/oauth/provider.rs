//! # OAuth data model
//!
//! Provider descriptors, persisted refresh tokens and the wire DTOs of the
//! credential service facade.

use serde::{Deserialize, Serialize};

/// Client id/secret pair registered with an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
}

/// A configured OAuth provider.
///
/// `client_credentials` is only absent transiently, while a
/// reuse-credentials write resolves the previously stored pair; persisted
/// records always carry credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProvider {
    /// Unique provider name
    pub name: String,
    /// Interactive login / authorization page URL
    pub login_url: String,
    /// Token endpoint URL used for both grant exchanges
    pub token_refresh_url: String,
    /// Registered client credentials
    pub client_credentials: Option<OAuthClientCredentials>,
}

/// A refresh token persisted for a `(provider, credential id)` pair.
///
/// Never returned to callers after creation; only used internally to mint
/// access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthRefreshToken {
    /// The refresh token issued by the provider
    pub refresh_token: String,
    /// Redirect URI the token was issued against
    pub redirect_uri: String,
}

/// Ephemeral result of a refresh-token grant. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenResult {
    /// Short-lived access token
    pub access_token: String,
    /// Instance URL some providers scope their tokens to
    pub instance_url: Option<String>,
}

/// Body of `PUT /v1/oauth/provider/{provider}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PutOAuthProviderRequest {
    /// Login page URL
    #[serde(rename = "loginURL")]
    pub login_url: String,
    /// Token endpoint URL
    #[serde(rename = "tokenRefreshURL")]
    pub token_refresh_url: String,
    /// Client id; may be omitted when reusing stored credentials
    #[serde(rename = "clientId", default)]
    pub client_id: Option<String>,
    /// Client secret; may be omitted when reusing stored credentials
    #[serde(rename = "clientSecret", default)]
    pub client_secret: Option<String>,
}

/// Body of `PUT /v1/oauth/provider/{provider}/credential/{credential}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PutOAuthCredentialRequest {
    /// One-time authorization code to exchange
    #[serde(rename = "oneTimeCode", default)]
    pub one_time_code: Option<String>,
    /// Redirect URI the code was issued against
    #[serde(rename = "redirectURI", default)]
    pub redirect_uri: Option<String>,
}

/// Token endpoint response body, for either grant.
///
/// Which field is required depends on the grant that was exchanged; the
/// broker enforces it per call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Access token, present on refresh-token grants
    #[serde(default)]
    pub access_token: Option<String>,
    /// Refresh token, present on authorization-code grants
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Instance URL, provider-specific
    #[serde(default)]
    pub instance_url: Option<String>,
}

/// Body of `GET /v1/oauth/provider/{provider}/credential/{credential}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetAccessTokenResponse {
    /// Short-lived access token
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Instance URL, when the provider scopes tokens to one
    #[serde(rename = "instanceURL", skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
}

impl From<AccessTokenResult> for GetAccessTokenResponse {
    fn from(result: AccessTokenResult) -> Self {
        Self {
            access_token: result.access_token,
            instance_url: result.instance_url,
        }
    }
}

/// Body of `GET /v1/oauth/provider/{provider}/credential/{credential}/valid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialIsValidResponse {
    /// Whether the stored refresh token still mints access tokens
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_provider_request_field_names() {
        let raw = r#"{
            "loginURL": "https://p.example/auth",
            "tokenRefreshURL": "https://p.example/token",
            "clientId": "id-1",
            "clientSecret": "sec-1"
        }"#;
        let request: PutOAuthProviderRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.login_url, "https://p.example/auth");
        assert_eq!(request.token_refresh_url, "https://p.example/token");
        assert_eq!(request.client_id.as_deref(), Some("id-1"));
        assert_eq!(request.client_secret.as_deref(), Some("sec-1"));
    }

    #[test]
    fn test_put_provider_request_credentials_optional() {
        let raw = r#"{"loginURL": "https://a", "tokenRefreshURL": "https://b"}"#;
        let request: PutOAuthProviderRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.client_id, None);
        assert_eq!(request.client_secret, None);
    }

    #[test]
    fn test_token_response_tolerates_extra_fields() {
        let raw = r#"{
            "access_token": "at",
            "instance_url": "https://x",
            "token_type": "Bearer",
            "expires_in": 3600
        }"#;
        let response: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("at"));
        assert_eq!(response.instance_url.as_deref(), Some("https://x"));
        assert_eq!(response.refresh_token, None);
    }

    #[test]
    fn test_access_token_response_serialization() {
        let response = GetAccessTokenResponse {
            access_token: "at1".to_string(),
            instance_url: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "at1");
        // Absent instance URL is omitted entirely.
        assert!(json.get("instanceURL").is_none());
    }
}
