// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Neuron Nook: one dashboard for Google and Microsoft accounts.
//!
//! This crate provides the backend session and credential lifecycle: OAuth
//! login and account linking for both providers, stateless session cookies,
//! and refresh-before-use access tokens handed to provider API calls.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::UserStore;
use error::AppError;
use services::{
    CredentialService, OAuthClient, OAuthStateSigner, ProviderApi, ProviderConfig, SessionCodec,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
    pub sessions: SessionCodec,
    pub state_signer: OAuthStateSigner,
    pub credentials: CredentialService,
    pub provider_api: ProviderApi,
}

impl AppState {
    /// Wire up every service against the real provider endpoints.
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Result<Self, AppError> {
        let google = ProviderConfig::google(&config);
        let microsoft = ProviderConfig::microsoft(&config);
        let provider_api = ProviderApi::new(config.provider_timeout)?;
        Self::with_providers(config, store, google, microsoft, provider_api)
    }

    /// Wire up with explicit provider endpoints.
    pub fn with_providers(
        config: Config,
        store: Arc<dyn UserStore>,
        google: ProviderConfig,
        microsoft: ProviderConfig,
        provider_api: ProviderApi,
    ) -> Result<Self, AppError> {
        let google = OAuthClient::new(google, config.provider_timeout)?;
        let microsoft = OAuthClient::new(microsoft, config.provider_timeout)?;
        let state_signer = OAuthStateSigner::new(&config.oauth_state_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid OAuth state key: {}", e)))?;

        Ok(Self {
            sessions: SessionCodec::new(&config.jwt_secret),
            state_signer,
            credentials: CredentialService::new(store.clone(), google, microsoft),
            provider_api,
            store,
            config,
        })
    }
}
