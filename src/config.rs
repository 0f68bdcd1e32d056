// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use sha2::{Digest, Sha256};
use std::env;
use std::time::Duration;

/// Signing secret used when `JWT_SECRET` is unset. Anyone who knows it can
/// forge sessions; startup logs a warning when it is in use.
pub const INSECURE_DEFAULT_SECRET: &str = "your-secret-key-change-in-production";

/// Default timeout for every outbound provider call.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Google OAuth ---
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,

    // --- Microsoft OAuth ---
    pub microsoft_client_id: String,
    pub microsoft_client_secret: String,
    pub microsoft_redirect_uri: String,
    /// Identity platform tenant segment (`common`, `consumers`, or a tenant ID)
    pub microsoft_tenant: String,

    // --- Sessions ---
    /// HS256 key for session tokens (raw bytes)
    pub jwt_secret: Vec<u8>,
    /// True when `jwt_secret` is [`INSECURE_DEFAULT_SECRET`]
    pub jwt_secret_is_default: bool,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    // --- Database ---
    /// GCP project hosting Firestore
    pub gcp_project_id: String,
    /// Firestore database name
    pub firestore_database: String,

    // --- Server ---
    /// Public base URL of the app, used for redirects
    pub app_url: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every provider HTTP call
    pub provider_timeout: Duration,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        let jwt_secret = b"test_jwt_key_32_bytes_minimum!!".to_vec();
        Self {
            google_client_id: "google_client_id".to_string(),
            google_client_secret: "google_secret".to_string(),
            google_redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
            microsoft_client_id: "microsoft_client_id".to_string(),
            microsoft_client_secret: "microsoft_secret".to_string(),
            microsoft_redirect_uri: "http://localhost:3000/auth/microsoft/callback".to_string(),
            microsoft_tenant: "common".to_string(),
            oauth_state_key: derive_state_key(&jwt_secret),
            jwt_secret,
            jwt_secret_is_default: false,
            gcp_project_id: "test-project".to_string(),
            firestore_database: crate::db::firestore::DEFAULT_DATABASE.to_string(),
            app_url: "http://localhost:3000".to_string(),
            port: 8080,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let app_url = env::var("APP_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let (jwt_secret, jwt_secret_is_default) = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => (secret.trim().as_bytes().to_vec(), false),
            _ => (INSECURE_DEFAULT_SECRET.as_bytes().to_vec(), true),
        };

        let oauth_state_key = env::var("OAUTH_STATE_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|| derive_state_key(&jwt_secret));

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{}/auth/google/callback", app_url)),
            microsoft_client_id: required("MICROSOFT_CLIENT_ID")?,
            microsoft_client_secret: required("MICROSOFT_CLIENT_SECRET")?,
            microsoft_redirect_uri: env::var("MICROSOFT_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{}/auth/microsoft/callback", app_url)),
            microsoft_tenant: env::var("MICROSOFT_TENANT").unwrap_or_else(|_| "common".to_string()),
            jwt_secret,
            jwt_secret_is_default,
            oauth_state_key,
            gcp_project_id: required("GCP_PROJECT_ID")?,
            firestore_database: env::var("FIRESTORE_DATABASE")
                .unwrap_or_else(|_| crate::db::firestore::DEFAULT_DATABASE.to_string()),
            app_url,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            provider_timeout: Duration::from_secs(
                env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ),
        })
    }

    /// Cookies are marked `Secure` when the app is served over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.app_url.starts_with("https://")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Separate key for OAuth state so a state signature is never a valid
/// session signature.
fn derive_state_key(jwt_secret: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(jwt_secret);
    hasher.update(b"|oauth-state");
    hasher.finalize().to_vec()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so parallel tests never race on process env.
    #[test]
    fn test_config_from_env() {
        env::set_var("GOOGLE_CLIENT_ID", "g_id");
        env::set_var("GOOGLE_CLIENT_SECRET", "g_secret");
        env::set_var("MICROSOFT_CLIENT_ID", "m_id");
        env::set_var("MICROSOFT_CLIENT_SECRET", "m_secret");
        env::set_var("APP_URL", "https://nook.example.com/");
        env::remove_var("JWT_SECRET");
        env::remove_var("GCP_PROJECT_ID");
        env::set_var("OAUTH_STATE_SECRET", "  ");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GCP_PROJECT_ID")));

        env::set_var("GCP_PROJECT_ID", "nook-project");
        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google_client_id, "g_id");
        assert_eq!(
            config.google_redirect_uri,
            "https://nook.example.com/auth/google/callback"
        );
        assert_eq!(config.microsoft_tenant, "common");
        assert!(config.jwt_secret_is_default);
        assert_eq!(config.jwt_secret, INSECURE_DEFAULT_SECRET.as_bytes());
        assert_ne!(config.oauth_state_key, config.jwt_secret);
        // A blank state secret falls back to the derived key
        assert_eq!(config.oauth_state_key, derive_state_key(&config.jwt_secret));
        assert!(config.secure_cookies());
        assert_eq!(config.provider_timeout, Duration::from_secs(10));

        env::set_var("OAUTH_STATE_SECRET", "state-secret");
        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.oauth_state_key, b"state-secret");
        env::remove_var("OAUTH_STATE_SECRET");
    }
}
