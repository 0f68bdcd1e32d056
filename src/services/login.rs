// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth callback handling: login, signup and account linking.
//!
//! A callback exchanges the code, fetches the identity, then either links the
//! provider to the signed-in user or upserts a user by email and issues a
//! session. Every failure ends in a [`CallbackFailure`] that the route turns
//! into an `error` query parameter.

use crate::db::StoreError;
use crate::models::{CredentialChange, NewUser, Provider, ProviderTokens, User, UserPatch};
use crate::services::oauth::Identity;
use crate::AppState;

/// Terminal callback errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFailure {
    NoCode,
    TokenExchangeFailed,
    UserInfoFailed,
    NotAuthenticated,
    InvalidSession,
    CallbackFailed,
}

impl CallbackFailure {
    /// Value of the `error` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackFailure::NoCode => "no_code",
            CallbackFailure::TokenExchangeFailed => "token_exchange_failed",
            CallbackFailure::UserInfoFailed => "user_info_failed",
            CallbackFailure::NotAuthenticated => "not_authenticated",
            CallbackFailure::InvalidSession => "invalid_session",
            CallbackFailure::CallbackFailed => "callback_failed",
        }
    }
}

impl From<StoreError> for CallbackFailure {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Credential store failure during callback");
        CallbackFailure::CallbackFailed
    }
}

/// How a callback ended.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Login or signup finished; the token goes into the session cookie.
    SessionIssued { user: User, token: String },
    /// Provider attached to the signed-in user. No new session.
    Linked(Provider),
    Failed(CallbackFailure),
}

/// Run one provider callback to completion.
///
/// `oauth_state` is the raw `state` parameter; `session_token` is the
/// caller's session cookie, only consulted when linking.
pub async fn complete_callback(
    state: &AppState,
    provider: Provider,
    code: Option<&str>,
    oauth_state: Option<&str>,
    session_token: Option<&str>,
) -> CallbackOutcome {
    match run(state, provider, code, oauth_state, session_token).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            tracing::warn!(provider = %provider, reason = failure.as_str(), "OAuth callback failed");
            CallbackOutcome::Failed(failure)
        }
    }
}

async fn run(
    state: &AppState,
    provider: Provider,
    code: Option<&str>,
    oauth_state: Option<&str>,
    session_token: Option<&str>,
) -> Result<CallbackOutcome, CallbackFailure> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or(CallbackFailure::NoCode)?;
    let linking = state.state_signer.is_linking(oauth_state);
    let client = state.credentials.oauth(provider);

    tracing::debug!(provider = %provider, linking, "Exchanging authorization code");
    let grant = client
        .exchange_code(code)
        .await
        .map_err(|_| CallbackFailure::TokenExchangeFailed)?;

    tracing::debug!(provider = %provider, "Fetching identity");
    let identity = client
        .fetch_identity(&grant.access_token)
        .await
        .map_err(|_| CallbackFailure::UserInfoFailed)?;

    let tokens = grant.into_tokens();
    if linking {
        link(state, provider, tokens, session_token).await
    } else {
        upsert(state, provider, tokens, identity).await
    }
}

/// Attach provider credentials to the user behind `session_token`.
async fn link(
    state: &AppState,
    provider: Provider,
    tokens: ProviderTokens,
    session_token: Option<&str>,
) -> Result<CallbackOutcome, CallbackFailure> {
    let token = session_token.ok_or(CallbackFailure::NotAuthenticated)?;
    let session = state
        .sessions
        .verify(token)
        .ok_or(CallbackFailure::InvalidSession)?;

    let Some(user) = state.store.find_by_email(&session.email).await? else {
        tracing::warn!(user_id = %session.user_id, "Session user no longer exists");
        return Err(CallbackFailure::InvalidSession);
    };

    let mut patch = UserPatch::credentials(provider, CredentialChange::Connect(tokens));
    patch.email = Some(user.email.clone());
    state.store.update(&user.id, patch).await?;

    tracing::info!(user_id = %user.id, provider = %provider, "Provider linked");
    Ok(CallbackOutcome::Linked(provider))
}

/// Create or update the user for `identity`, then issue a session.
async fn upsert(
    state: &AppState,
    provider: Provider,
    tokens: ProviderTokens,
    identity: Identity,
) -> Result<CallbackOutcome, CallbackFailure> {
    let user = match state.store.find_by_email(&identity.email).await? {
        Some(existing) => {
            tracing::debug!(user_id = %existing.id, provider = %provider, "Updating existing user");
            let mut patch = UserPatch::credentials(provider, CredentialChange::Connect(tokens))
                .with_image(identity.picture);
            patch.email = Some(existing.email.clone());
            state.store.update(&existing.id, patch).await?
        }
        None => {
            tracing::debug!(provider = %provider, "Creating new user");
            let mut new_user = NewUser {
                email: identity.email,
                name: identity.name,
                image: identity.picture,
                ..Default::default()
            };
            match provider {
                Provider::Google => new_user.google = Some(tokens),
                Provider::Microsoft => new_user.microsoft = Some(tokens),
            }
            state.store.create(new_user).await?
        }
    };

    let token = state.sessions.issue(&user).map_err(|e| {
        tracing::error!(error = %e, "Failed to issue session token");
        CallbackFailure::CallbackFailed
    })?;

    tracing::info!(user_id = %user.id, provider = %provider, "Login complete");
    Ok(CallbackOutcome::SessionIssued { user, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        let codes: Vec<&str> = [
            CallbackFailure::NoCode,
            CallbackFailure::TokenExchangeFailed,
            CallbackFailure::UserInfoFailed,
            CallbackFailure::NotAuthenticated,
            CallbackFailure::InvalidSession,
            CallbackFailure::CallbackFailed,
        ]
        .iter()
        .map(CallbackFailure::as_str)
        .collect();

        assert_eq!(
            codes,
            [
                "no_code",
                "token_exchange_failed",
                "user_info_failed",
                "not_authenticated",
                "invalid_session",
                "callback_failed"
            ]
        );
    }

    #[test]
    fn test_store_errors_become_callback_failed() {
        let failure: CallbackFailure = StoreError::DuplicateKey("alice@x.com".to_string()).into();
        assert_eq!(failure, CallbackFailure::CallbackFailed);
    }
}
