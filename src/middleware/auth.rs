// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session middleware and cookie helpers.

use crate::error::AppError;
use crate::models::User;
use crate::services::session::{Session, SESSION_TTL_SECS};
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Authenticated user, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: Session,
}

/// Middleware that requires a valid session and a stored user.
///
/// Provider tokens are not resolved here; handlers ask
/// [`crate::services::CredentialService`] for the provider they need.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AppError::Unauthenticated)?;

    let session = state
        .sessions
        .verify(&token)
        .ok_or(AppError::InvalidSession)?;

    let user = state
        .store
        .find_by_email(&session.email)
        .await?
        .ok_or(AppError::UserNotFound)?;

    request.extensions_mut().insert(AuthUser { user, session });

    Ok(next.run(request).await)
}

/// Session cookie carrying `token`, valid for the session lifetime.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

/// Cookie that clears the session, with the same attributes it was set with.
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}
