// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 exchange client for Google and Microsoft.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization-code exchange (fails hard)
//! - Identity lookup with the new access token
//! - Refresh-token exchange (fails soft: `None`)
//!
//! Every request is bounded by the configured provider timeout.

use crate::config::Config;
use crate::models::{Provider, ProviderTokens};
use crate::services::oauth_state::OAuthStateSigner;
use serde::Deserialize;
use std::time::Duration;

/// OAuth exchange errors.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token_exchange_failed: HTTP {status}")]
    TokenExchangeFailed { status: u16 },

    #[error("user_info_failed: HTTP {status}")]
    UserInfoFailed { status: u16 },

    #[error("Provider request timed out")]
    ProviderTimeout,

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for OAuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OAuthError::ProviderTimeout
        } else {
            OAuthError::ProviderUnavailable(err.to_string())
        }
    }
}

/// Endpoints and credentials for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Provider-specific authorization query parameters
    pub extra_authorize_params: Vec<(&'static str, &'static str)>,
    /// Whether refresh requests must repeat the scope list
    pub scope_on_refresh: bool,
}

impl ProviderConfig {
    pub fn google(config: &Config) -> Self {
        Self {
            provider: Provider::Google,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            scopes: [
                "openid",
                "email",
                "profile",
                "https://www.googleapis.com/auth/gmail.readonly",
                "https://www.googleapis.com/auth/drive.readonly",
                "https://www.googleapis.com/auth/photoslibrary.readonly",
                "https://www.googleapis.com/auth/photoslibrary",
            ]
            .map(String::from)
            .to_vec(),
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            extra_authorize_params: vec![
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
            ],
            scope_on_refresh: false,
        }
    }

    pub fn microsoft(config: &Config) -> Self {
        let base = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0",
            config.microsoft_tenant
        );
        Self {
            provider: Provider::Microsoft,
            client_id: config.microsoft_client_id.clone(),
            client_secret: config.microsoft_client_secret.clone(),
            redirect_uri: config.microsoft_redirect_uri.clone(),
            scopes: [
                "openid",
                "email",
                "profile",
                "offline_access",
                "User.Read",
                "Files.Read.All",
            ]
            .map(String::from)
            .to_vec(),
            authorize_url: format!("{}/authorize", base),
            token_url: format!("{}/token", base),
            userinfo_url: "https://graph.microsoft.com/v1.0/me".to_string(),
            extra_authorize_params: vec![("response_mode", "query")],
            scope_on_refresh: true,
        }
    }

    fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Tokens granted by an authorization-code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    pub fn into_tokens(self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Identity of the account that granted consent.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Google `oauth2/v2/userinfo` response.
#[derive(Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Microsoft Graph `/me` response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMe {
    mail: Option<String>,
    user_principal_name: Option<String>,
    display_name: Option<String>,
}

/// Refresh response; only the access token is used.
#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// OAuth client for one provider.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl OAuthClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Consent-screen URL. `linking` is carried through the signed `state`.
    pub fn build_authorization_url(&self, linking: bool, signer: &OAuthStateSigner) -> String {
        let state = signer.encode(linking);
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope()),
            urlencoding::encode(&state),
        );
        for (key, value) in &self.config.extra_authorize_params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }
        url
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.config.provider,
                status = %status,
                body = %body,
                "Token exchange failed"
            );
            return Err(OAuthError::TokenExchangeFailed {
                status: status.as_u16(),
            });
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(format!("token response: {}", e)))?;

        tracing::info!(
            provider = %self.config.provider,
            has_refresh_token = grant.refresh_token.is_some(),
            expires_in = ?grant.expires_in,
            "Token exchange successful"
        );
        Ok(grant)
    }

    /// Fetch the identity behind an access token.
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity, OAuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.config.provider,
                status = %status,
                body = %body,
                "User info request failed"
            );
            return Err(OAuthError::UserInfoFailed {
                status: status.as_u16(),
            });
        }

        let identity = match self.config.provider {
            Provider::Google => {
                let info: GoogleUserInfo = response
                    .json()
                    .await
                    .map_err(|e| OAuthError::InvalidResponse(format!("userinfo: {}", e)))?;
                info.email.map(|email| Identity {
                    email,
                    name: info.name,
                    picture: info.picture,
                })
            }
            Provider::Microsoft => {
                let me: GraphMe = response
                    .json()
                    .await
                    .map_err(|e| OAuthError::InvalidResponse(format!("graph me: {}", e)))?;
                me.mail.or(me.user_principal_name).map(|email| Identity {
                    email,
                    name: me.display_name,
                    picture: None,
                })
            }
        };

        identity
            .filter(|identity| !identity.email.is_empty())
            .ok_or_else(|| OAuthError::InvalidResponse("identity has no email".to_string()))
    }

    /// Mint a new access token. Any failure returns `None`; callers keep
    /// using the last known access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Option<String> {
        if refresh_token.is_empty() {
            return None;
        }

        let scope = self.config.scope();
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if self.config.scope_on_refresh {
            form.push(("scope", scope.as_str()));
        }

        let response = match self.http.post(&self.config.token_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    provider = %self.config.provider,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Token refresh request failed"
                );
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.config.provider,
                status = %status,
                body = %body,
                "Token refresh rejected"
            );
            return None;
        }

        match response.json::<RefreshResponse>().await {
            Ok(refreshed) if !refreshed.access_token.is_empty() => {
                tracing::debug!(provider = %self.config.provider, "Access token refreshed");
                Some(refreshed.access_token)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    provider = %self.config.provider,
                    error = %e,
                    "Token refresh response unreadable"
                );
                None
            }
        }
    }
}
