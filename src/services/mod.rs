// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod login;
pub mod oauth;
pub mod oauth_state;
pub mod provider_api;
pub mod session;

pub use credentials::CredentialService;
pub use login::{complete_callback, CallbackFailure, CallbackOutcome};
pub use oauth::{OAuthClient, OAuthError, ProviderConfig};
pub use oauth_state::OAuthStateSigner;
pub use provider_api::ProviderApi;
pub use session::{Session, SessionCodec};
