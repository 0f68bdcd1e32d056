// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod auth;

use crate::middleware::auth::require_session;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

#[derive(Serialize)]
pub struct DbHealthResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Database connectivity check. The first call opens the connection.
async fn db_health_check(State(state): State<Arc<AppState>>) -> Response {
    match state.store.ping().await {
        Ok(database) => Json(DbHealthResponse {
            ok: true,
            database: Some(database),
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DbHealthResponse {
                    ok: false,
                    database: None,
                    error: Some("database_unavailable".to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Request span with the path only. Query strings carry OAuth codes and
/// state, which must stay out of the logs.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> tracing::Span {
    tracing::span!(
        Level::INFO,
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow the app origin and localhost (for dev), with cookies
    let app_url = state.config.app_url.trim_end_matches('/').to_string();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == app_url
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .merge(auth::routes());

    // Protected routes (session required)
    let protected_routes = api::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
