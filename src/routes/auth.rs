// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login, account linking and logout routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::{removal_cookie, session_cookie, SESSION_COOKIE};
use crate::models::Provider;
use crate::services::login::{complete_callback, CallbackOutcome};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/{provider}", get(auth_start))
        .route("/auth/{provider}/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// `true` to link the provider to the signed-in user instead of logging in.
    #[serde(default)]
    link: Option<String>,
}

/// Start OAuth flow - redirect to the provider's consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(provider), _): WithRejection<Path<Provider>, AppError>,
    Query(params): Query<AuthStartParams>,
) -> Response {
    let linking = params.link.as_deref() == Some("true");
    let auth_url = state
        .credentials
        .oauth(provider)
        .build_authorization_url(linking, &state.state_signer);

    tracing::info!(provider = %provider, linking, "Starting OAuth flow");

    found(&auth_url)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code, then log in or link, then redirect.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(provider), _): WithRejection<Path<Provider>, AppError>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    if let Some(error) = &params.error {
        tracing::warn!(provider = %provider, error = %error, "OAuth error from provider");
    }

    let session_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let outcome = complete_callback(
        &state,
        provider,
        params.code.as_deref(),
        params.state.as_deref(),
        session_token.as_deref(),
    )
    .await;

    let app_url = state.config.app_url.trim_end_matches('/');
    match outcome {
        CallbackOutcome::SessionIssued { token, .. } => {
            let jar = jar.add(session_cookie(token, state.config.secure_cookies()));
            (jar, found(&format!("{}/dashboard", app_url))).into_response()
        }
        CallbackOutcome::Linked(provider) => {
            found(&format!("{}/dashboard?linked={}", app_url, provider))
        }
        CallbackOutcome::Failed(failure) => {
            found(&format!("{}/?error={}", app_url, failure.as_str()))
        }
    }
}

/// Logout - clear the session cookie. Sessions are stateless, so the token
/// itself stays valid until it expires.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(state.config.secure_cookies()));
    (StatusCode::NO_CONTENT, jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryUserStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::new(Config::test_default(), Arc::new(MemoryUserStore::new())).unwrap();
        routes().with_state(Arc::new(state))
    }

    async fn get(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_start_redirects_to_google() {
        let response = get("/auth/google").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    }

    #[tokio::test]
    async fn test_start_link_flag_is_signed_into_state() {
        let response = get("/auth/microsoft?link=true").await;
        let url = location(&response);
        let state_param = url
            .split('&')
            .find_map(|kv| kv.strip_prefix("state="))
            .unwrap();
        let state_value = urlencoding::decode(state_param).unwrap();

        let signer = crate::services::OAuthStateSigner::new(&Config::test_default().oauth_state_key)
            .unwrap();
        assert_eq!(signer.decode(&state_value), Some(true));
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let response = get("/auth/google/callback?error=access_denied").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "http://localhost:3000/?error=no_code");
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        assert_eq!(get("/auth/dropbox").await.status(), StatusCode::BAD_REQUEST);

        let response = get("/auth/dropbox/callback?code=c").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
