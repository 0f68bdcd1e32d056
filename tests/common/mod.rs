// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use neuron_nook::config::Config;
use neuron_nook::db::{FirestoreUserStore, MemoryUserStore, UserStore};
use neuron_nook::models::{NewUser, ProviderTokens, User};
use neuron_nook::routes::create_router;
use neuron_nook::services::{ProviderApi, ProviderConfig};
use neuron_nook::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Firestore store pointed at the emulator.
#[allow(dead_code)]
pub fn test_store() -> FirestoreUserStore {
    FirestoreUserStore::new("test-project", neuron_nook::db::firestore::DEFAULT_DATABASE)
}

/// Email unique to this test run.
#[allow(dead_code)]
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

/// Router over an in-memory store, with both providers and their APIs
/// served by one mock server.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryUserStore>,
    pub provider: MockServer,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(Config::test_default()).await
    }

    pub async fn spawn_with_config(mut config: Config) -> Self {
        let provider = MockServer::start().await;
        let base = provider.uri();
        config.provider_timeout = Duration::from_secs(2);

        let mut google = ProviderConfig::google(&config);
        google.token_url = format!("{}/google/token", base);
        google.userinfo_url = format!("{}/google/userinfo", base);
        let mut microsoft = ProviderConfig::microsoft(&config);
        microsoft.token_url = format!("{}/microsoft/token", base);
        microsoft.userinfo_url = format!("{}/microsoft/me", base);

        let provider_api = ProviderApi::new(config.provider_timeout)
            .unwrap()
            .with_base_url(&base);

        let store = Arc::new(MemoryUserStore::new());
        let state = Arc::new(
            AppState::with_providers(config, store.clone(), google, microsoft, provider_api)
                .unwrap(),
        );

        Self {
            router: create_router(state.clone()),
            state,
            store,
            provider,
        }
    }

    /// Send a request; `cookie` is the raw `Cookie` header value.
    pub async fn send(&self, method: &str, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send("GET", uri, cookie).await
    }

    /// `session=<token>` for a stored user.
    pub fn session_cookie_for(&self, user: &User) -> String {
        format!("session={}", self.state.sessions.issue(user).unwrap())
    }

    /// Signed `state` value, URL-encoded for a query string.
    pub fn state_param(&self, linking: bool) -> String {
        urlencoding::encode(&self.state.state_signer.encode(linking)).into_owned()
    }

    /// Store a user connected to Google.
    pub async fn google_user(&self, email: &str, access: &str, refresh: Option<&str>) -> User {
        self.store
            .create(NewUser {
                email: email.to_string(),
                name: Some("Test User".to_string()),
                google: Some(ProviderTokens {
                    access_token: access.to_string(),
                    refresh_token: refresh.map(str::to_string),
                }),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// Code exchange and profile lookup for a Google login.
    pub async fn mock_google_login(&self, email: &str, access: &str, refresh: &str) {
        mock_token_exchange(&self.provider, "/google/token", access, refresh).await;
        Mock::given(method("GET"))
            .and(path("/google/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": email,
                "name": "Alice",
                "picture": "https://example.com/alice.png"
            })))
            .mount(&self.provider)
            .await;
    }

    /// Code exchange and Graph `/me` lookup for a Microsoft login.
    pub async fn mock_microsoft_login(&self, email: &str, access: &str, refresh: &str) {
        mock_token_exchange(&self.provider, "/microsoft/token", access, refresh).await;
        Mock::given(method("GET"))
            .and(path("/microsoft/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mail": email,
                "displayName": "Alice"
            })))
            .mount(&self.provider)
            .await;
    }
}

#[allow(dead_code)]
async fn mock_token_exchange(server: &MockServer, token_path: &str, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path(token_path))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 3599
        })))
        .mount(server)
        .await;
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Redirect target of a response.
#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// All `Set-Cookie` header values.
#[allow(dead_code)]
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}
