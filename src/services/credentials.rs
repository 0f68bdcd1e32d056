// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider credential lifecycle for authenticated requests.
//!
//! Every request that needs provider data refreshes the access token first
//! when a refresh token is stored. Refresh is best-effort: on failure the
//! stored token is used and the downstream call fails naturally if it is
//! really expired. Concurrent refreshes for one user are allowed; the last
//! write wins.

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{CredentialChange, Provider, User, UserPatch};
use crate::services::oauth::OAuthClient;
use std::sync::Arc;

/// Resolves live provider access tokens for a user.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    google: OAuthClient,
    microsoft: OAuthClient,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>, google: OAuthClient, microsoft: OAuthClient) -> Self {
        Self {
            store,
            google,
            microsoft,
        }
    }

    /// OAuth client for a provider.
    pub fn oauth(&self, provider: Provider) -> &OAuthClient {
        match provider {
            Provider::Google => &self.google,
            Provider::Microsoft => &self.microsoft,
        }
    }

    /// Access token to hand to a provider API on behalf of `user`.
    ///
    /// Fails with [`AppError::ProviderNotConnected`] if the provider is not
    /// linked. Never fails because a refresh failed.
    pub async fn live_access_token(
        &self,
        user: &User,
        provider: Provider,
    ) -> Result<String, AppError> {
        let stored = match user.access_token(provider) {
            Some(token) if user.is_connected(provider) => token.to_string(),
            _ => return Err(AppError::ProviderNotConnected(provider)),
        };

        let Some(refresh_token) = user.refresh_token(provider) else {
            return Ok(stored);
        };

        let Some(fresh) = self.oauth(provider).refresh_access_token(refresh_token).await else {
            tracing::warn!(
                user_id = %user.id,
                provider = %provider,
                "Token refresh failed, using stored access token"
            );
            return Ok(stored);
        };

        let patch = UserPatch::credentials(provider, CredentialChange::RefreshAccess(fresh.clone()));
        if let Err(e) = self.store.update(&user.id, patch).await {
            tracing::warn!(
                user_id = %user.id,
                provider = %provider,
                error = %e,
                "Failed to persist refreshed token, continuing anyway"
            );
        }

        Ok(fresh)
    }
}
