//! # OAuth credential broker
//!
//! Provider registry, token broker and the externally reachable credential
//! service facade.

pub mod client;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod routes;
pub mod store;

pub use client::OAuthClient;
pub use error::OAuthServiceError;
pub use provider::{AccessTokenResult, OAuthClientCredentials, OAuthProvider, OAuthRefreshToken};
pub use store::OAuthStore;
