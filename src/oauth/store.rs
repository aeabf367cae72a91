//! # OAuth registry
//!
//! CRUD over provider descriptors and per-`(provider, credential id)`
//! refresh tokens, persisted as JSON in the external secure store. Each
//! write is a single-key upsert; concurrent writes to the same key are
//! last-writer-wins.

use std::sync::Arc;
use thiserror::Error;

use crate::oauth::provider::{OAuthProvider, OAuthRefreshToken};
use crate::secure_store::{SecretStore, SecretStoreError};

const PROVIDER_KEY_PREFIX: &str = "oauth/provider/";
const REFRESH_TOKEN_KEY_PREFIX: &str = "oauth/credential/";

/// Errors surfaced by the registry.
#[derive(Debug, Error)]
pub enum OAuthStoreError {
    /// The secure store failed
    #[error("secure store failure: {0}")]
    Store(#[from] SecretStoreError),

    /// A persisted record failed to (de)serialize
    #[error("corrupted record under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A reuse-credentials write found nothing to reuse
    #[error("no stored client credentials to reuse for provider '{0}'")]
    NoStoredCredentials(String),
}

/// Provider + refresh-token registry over a [`SecretStore`].
#[derive(Clone)]
pub struct OAuthStore {
    store: Arc<dyn SecretStore>,
}

impl OAuthStore {
    /// Create a registry over the given secure store.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Persist a provider descriptor.
    ///
    /// With `reuse_client_credentials` set, the write keeps the client
    /// credentials already stored for this provider name instead of the
    /// (absent) ones on `provider`; if no prior credentials exist the write
    /// fails rather than persisting a provider that could never complete a
    /// token exchange.
    pub async fn write_provider(
        &self,
        mut provider: OAuthProvider,
        reuse_client_credentials: bool,
    ) -> Result<(), OAuthStoreError> {
        if reuse_client_credentials {
            let existing = self
                .get_provider(&provider.name)
                .await?
                .and_then(|record| record.client_credentials);
            match existing {
                Some(credentials) => provider.client_credentials = Some(credentials),
                None => return Err(OAuthStoreError::NoStoredCredentials(provider.name)),
            }
        }

        let key = provider_key(&provider.name);
        let value = serde_json::to_vec(&provider).map_err(|source| OAuthStoreError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.store.put(&key, value).await?;
        Ok(())
    }

    /// Fetch a provider descriptor by name.
    pub async fn get_provider(&self, name: &str) -> Result<Option<OAuthProvider>, OAuthStoreError> {
        let key = provider_key(name);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let provider =
            serde_json::from_slice(&raw).map_err(|source| OAuthStoreError::Corrupt { key, source })?;
        Ok(Some(provider))
    }

    /// List the names of all registered providers.
    pub async fn list_providers(&self) -> Result<Vec<String>, OAuthStoreError> {
        let keys = self.store.list(PROVIDER_KEY_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(PROVIDER_KEY_PREFIX)
                    .map(ToString::to_string)
            })
            .collect())
    }

    /// Upsert the refresh token for a `(provider, credential id)` pair.
    pub async fn write_refresh_token(
        &self,
        provider: &str,
        credential_id: &str,
        token: &OAuthRefreshToken,
    ) -> Result<(), OAuthStoreError> {
        let key = refresh_token_key(provider, credential_id);
        let value = serde_json::to_vec(token).map_err(|source| OAuthStoreError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.store.put(&key, value).await?;
        Ok(())
    }

    /// Fetch the refresh token for a `(provider, credential id)` pair.
    pub async fn get_refresh_token(
        &self,
        provider: &str,
        credential_id: &str,
    ) -> Result<Option<OAuthRefreshToken>, OAuthStoreError> {
        let key = refresh_token_key(provider, credential_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let token =
            serde_json::from_slice(&raw).map_err(|source| OAuthStoreError::Corrupt { key, source })?;
        Ok(Some(token))
    }
}

fn provider_key(name: &str) -> String {
    format!("{PROVIDER_KEY_PREFIX}{name}")
}

fn refresh_token_key(provider: &str, credential_id: &str) -> String {
    format!("{REFRESH_TOKEN_KEY_PREFIX}{provider}/{credential_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::provider::OAuthClientCredentials;
    use crate::secure_store::MemorySecretStore;
    use pretty_assertions::assert_eq;

    fn registry() -> OAuthStore {
        OAuthStore::new(Arc::new(MemorySecretStore::new()))
    }

    fn provider(name: &str, credentials: Option<OAuthClientCredentials>) -> OAuthProvider {
        OAuthProvider {
            name: name.to_string(),
            login_url: "https://p.example/auth".to_string(),
            token_refresh_url: "https://p.example/token".to_string(),
            client_credentials: credentials,
        }
    }

    fn credentials(id: &str, secret: &str) -> OAuthClientCredentials {
        OAuthClientCredentials {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        }
    }

    #[tokio::test]
    async fn test_provider_roundtrip() {
        let store = registry();
        assert!(store.get_provider("salesforce").await.unwrap().is_none());

        let record = provider("salesforce", Some(credentials("x", "y")));
        store.write_provider(record.clone(), false).await.unwrap();
        assert_eq!(store.get_provider("salesforce").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_reuse_preserves_stored_credentials() {
        let store = registry();
        store
            .write_provider(provider("salesforce", Some(credentials("x", "y"))), false)
            .await
            .unwrap();

        // Second write carries no credentials but asks to reuse.
        store
            .write_provider(provider("salesforce", None), true)
            .await
            .unwrap();

        let stored = store.get_provider("salesforce").await.unwrap().unwrap();
        assert_eq!(stored.client_credentials, Some(credentials("x", "y")));
    }

    #[tokio::test]
    async fn test_reuse_without_prior_credentials_fails() {
        let store = registry();
        let err = store
            .write_provider(provider("salesforce", None), true)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthStoreError::NoStoredCredentials(name) if name == "salesforce"));
        // Nothing was persisted.
        assert!(store.get_provider("salesforce").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_upsert_by_pair() {
        let store = registry();
        let token = OAuthRefreshToken {
            refresh_token: "rt1".to_string(),
            redirect_uri: "https://app.example/cb".to_string(),
        };
        store
            .write_refresh_token("salesforce", "user-1", &token)
            .await
            .unwrap();

        assert_eq!(
            store
                .get_refresh_token("salesforce", "user-1")
                .await
                .unwrap(),
            Some(token.clone())
        );
        // Distinct credential id under the same provider is a distinct key.
        assert!(
            store
                .get_refresh_token("salesforce", "user-2")
                .await
                .unwrap()
                .is_none()
        );

        // Full overwrite on re-registration.
        let newer = OAuthRefreshToken {
            refresh_token: "rt2".to_string(),
            redirect_uri: "https://app.example/cb".to_string(),
        };
        store
            .write_refresh_token("salesforce", "user-1", &newer)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_refresh_token("salesforce", "user-1")
                .await
                .unwrap(),
            Some(newer)
        );
    }

    #[tokio::test]
    async fn test_list_providers() {
        let store = registry();
        store
            .write_provider(provider("salesforce", Some(credentials("a", "b"))), false)
            .await
            .unwrap();
        store
            .write_provider(provider("github", Some(credentials("c", "d"))), false)
            .await
            .unwrap();

        assert_eq!(
            store.list_providers().await.unwrap(),
            vec!["github".to_string(), "salesforce".to_string()]
        );
    }
}
