// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod provider;
pub mod user;

pub use provider::Provider;
pub use user::{CredentialChange, NewUser, ProviderTokens, PublicUser, User, UserPatch};
