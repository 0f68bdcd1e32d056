// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: persistence of users and their provider tokens.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreUserStore;
pub use memory::MemoryUserStore;

use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Users, keyed by email
    pub const USERS: &str = "users";
}

/// Credential store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User with email {0} already exists")]
    DuplicateKey(String),

    #[error("Failed to update user {0}")]
    UpdateFailed(String),

    #[error("Database error: {0}")]
    Backend(String),
}

/// Durable storage of [`User`] records, keyed by email and by ID.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up by ID. Accepts any UUID spelling or an opaque string.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::DuplicateKey`] if the email
    /// is taken; never merges.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Apply a patch to the user matching `id`, or failing that the user
    /// matching `patch.email`. Returns `None` when the write touched nothing.
    async fn write_patch(&self, id: &str, patch: &UserPatch) -> Result<Option<User>, StoreError>;

    /// Check connectivity; returns the database name.
    async fn ping(&self) -> Result<String, StoreError>;

    /// Partially update a user and return the fresh record.
    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        if let Some(user) = self.write_patch(id, &patch).await? {
            return Ok(user);
        }

        tracing::warn!(user_id = id, "Update returned no user, re-reading by id");
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::UpdateFailed(id.to_string()))
    }
}

/// Canonical form of a user ID: hyphenated lowercase if it parses as a
/// UUID, otherwise the trimmed string.
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    match uuid::Uuid::parse_str(id) {
        Ok(uuid) => uuid.hyphenated().to_string(),
        Err(_) => id.to_string(),
    }
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fresh user ID.
pub fn new_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
