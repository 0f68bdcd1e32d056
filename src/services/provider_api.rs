// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider resource APIs called with a live access token.
//!
//! Responses are passed through as raw JSON; non-2xx answers become
//! [`AppError::Upstream`] with the provider's status code preserved.

use crate::error::AppError;
use axum::http::StatusCode;
use serde_json::Value;
use std::time::Duration;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Fields requested for each OneDrive item.
const DRIVE_ITEM_FIELDS: &str = "id,name,size,lastModifiedDateTime,webUrl,file";

/// Default OneDrive page size.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// HTTP client for Google and Microsoft resource APIs.
#[derive(Clone)]
pub struct ProviderApi {
    http: reqwest::Client,
    google_tokeninfo_url: String,
    graph_base_url: String,
}

impl ProviderApi {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            google_tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
            graph_base_url: GRAPH_BASE_URL.to_string(),
        })
    }

    /// Point both APIs at another base URL (used by tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.google_tokeninfo_url = format!("{}/tokeninfo", base);
        self.graph_base_url = base.to_string();
        self
    }

    /// Google's description of an access token: audience, expiry, scopes.
    pub async fn google_token_info(&self, access_token: &str) -> Result<Value, AppError> {
        let response = self
            .http
            .get(&self.google_tokeninfo_url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(request_error)?;

        read_json(response, "Failed to get token info").await
    }

    /// One page of the signed-in user's OneDrive root folder.
    pub async fn onedrive_root_children(
        &self,
        access_token: &str,
        top: u32,
        skip_token: Option<&str>,
    ) -> Result<Value, AppError> {
        let mut query = vec![
            ("$top", top.to_string()),
            ("$select", DRIVE_ITEM_FIELDS.to_string()),
        ];
        if let Some(skip_token) = skip_token.filter(|t| !t.is_empty()) {
            query.push(("$skiptoken", skip_token.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/me/drive/root/children", self.graph_base_url))
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(request_error)?;

        read_json(response, "Failed to fetch files").await
    }
}

fn request_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ProviderTimeout
    } else {
        AppError::ProviderUnavailable(err.to_string())
    }
}

async fn read_json(response: reqwest::Response, fallback: &str) -> Result<Value, AppError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| AppError::ProviderUnavailable(format!("unreadable response: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, body = %body, "Provider API error");

    Err(AppError::Upstream {
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        message: upstream_message(&body).unwrap_or_else(|| fallback.to_string()),
    })
}

/// Best human-readable message in a provider error body.
fn upstream_message(body: &str) -> Option<String> {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Some(body.trim().to_string()).filter(|s| !s.is_empty());
    };

    json.pointer("/error/message")
        .or_else(|| json.get("error_description"))
        .or_else(|| json.get("error").filter(|e| e.is_string()))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Scope analysis of a Google tokeninfo response.
pub fn analyze_google_scopes(token_info: &Value) -> Value {
    let scopes: Vec<&str> = token_info
        .get("scope")
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default();

    let has = |scope: &str| {
        scopes
            .iter()
            .any(|s| *s == format!("https://www.googleapis.com/auth/{}", scope))
    };
    let photos_readonly = has("photoslibrary.readonly");
    let photos = has("photoslibrary");

    let verdict = if photos_readonly || photos {
        "Token has Google Photos scope"
    } else {
        "Token is missing Google Photos scope, re-authenticate"
    };

    serde_json::json!({
        "totalScopes": scopes.len(),
        "scopes": scopes,
        "hasRequiredScopes": {
            "photoslibrary.readonly": photos_readonly,
            "photoslibrary": photos,
            "gmail.readonly": has("gmail.readonly"),
            "drive.readonly": has("drive.readonly"),
        },
        "verdict": verdict,
    })
}
