// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Neuron Nook API Server
//!
//! Signs users in with Google or Microsoft, links the other provider to the
//! same account, and serves provider data with refreshed access tokens.

use neuron_nook::{config::Config, db::FirestoreUserStore, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Neuron Nook API");

    if config.jwt_secret_is_default {
        tracing::warn!(
            "JWT_SECRET is not set; sessions are signed with a publicly known default secret"
        );
    }

    // Credential store; the Firestore connection opens on first use
    let store = Arc::new(FirestoreUserStore::new(
        &config.gcp_project_id,
        &config.firestore_database,
    ));
    tracing::info!(
        project = %config.gcp_project_id,
        database = %config.firestore_database,
        "Credential store configured"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store)?);

    // Build router
    let app = neuron_nook::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("neuron_nook=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
