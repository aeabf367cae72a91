//! # Configuration module

pub mod app_config;

pub use app_config::{AppConfig, OAuthConfig, SecurityConfig, ServerConfig};
