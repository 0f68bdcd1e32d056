// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CredentialChange, Provider, PublicUser, UserPatch};
use crate::services::provider_api::{analyze_google_scopes, DEFAULT_PAGE_SIZE};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// API routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_me))
        .route("/auth/tokeninfo", get(token_info))
        .route("/auth/clear-tokens", post(clear_tokens))
        .route("/onedrive", get(onedrive_files))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile, provider tokens stripped.
async fn get_me(Extension(auth): Extension<AuthUser>) -> Json<PublicUser> {
    Json(PublicUser::from(&auth.user))
}

// ─── Google Token Diagnostics ────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfoResponse {
    pub token_info: Value,
    pub analysis: Value,
}

/// Show which scopes the live Google access token actually carries.
async fn token_info(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TokenInfoResponse>> {
    let access_token = state
        .credentials
        .live_access_token(&auth.user, Provider::Google)
        .await?;

    let token_info = state.provider_api.google_token_info(&access_token).await?;
    let analysis = analyze_google_scopes(&token_info);

    Ok(Json(TokenInfoResponse {
        token_info,
        analysis,
    }))
}

// ─── Disconnect ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct ClearTokensResponse {
    pub success: bool,
    pub message: String,
}

/// Disconnect both providers so the user can consent again from scratch.
async fn clear_tokens(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ClearTokensResponse>> {
    let mut patch = UserPatch {
        email: Some(auth.user.email.clone()),
        ..Default::default()
    };
    for provider in Provider::ALL {
        patch.set_credentials(provider, CredentialChange::Disconnect);
    }
    state.store.update(&auth.user.id, patch).await?;

    tracing::info!(user_id = %auth.user.id, "Provider tokens cleared");

    Ok(Json(ClearTokensResponse {
        success: true,
        message: "Tokens cleared. Sign in again to grant access.".to_string(),
    }))
}

// ─── OneDrive ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneDriveParams {
    #[serde(default)]
    top: Option<u32>,
    #[serde(default)]
    skip_token: Option<String>,
}

/// One page of the user's OneDrive root folder, as Graph returns it.
async fn onedrive_files(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Query(params), _): WithRejection<Query<OneDriveParams>, AppError>,
) -> Result<Json<Value>> {
    let access_token = state
        .credentials
        .live_access_token(&auth.user, Provider::Microsoft)
        .await?;

    let page = state
        .provider_api
        .onedrive_root_children(
            &access_token,
            params.top.unwrap_or(DEFAULT_PAGE_SIZE),
            params.skip_token.as_deref(),
        )
        .await?;

    Ok(Json(page))
}
