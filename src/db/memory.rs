// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process user store for tests and offline mode.

use super::{new_user_id, normalize_email, normalize_id, StoreError, UserStore};
use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// `DashMap`-backed store. A user's shard lock is held for the whole patch,
/// so concurrent writes to one user are serialized.
#[derive(Default)]
pub struct MemoryUserStore {
    by_email: DashMap<String, User>,
    email_by_id: DashMap<String, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }

    fn email_for_id(&self, id: &str) -> Option<String> {
        self.email_by_id
            .get(&normalize_id(id))
            .map(|email| email.value().clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .by_email
            .get(&normalize_email(email))
            .map(|user| user.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        match self.email_for_id(id) {
            Some(email) => self.find_by_email(&email).await,
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let email = normalize_email(&new_user.email);
        let user = NewUser {
            email: email.clone(),
            ..new_user
        }
        .into_user(new_user_id(), chrono::Utc::now());

        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(email)),
            Entry::Vacant(slot) => {
                self.email_by_id.insert(user.id.clone(), email);
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn write_patch(&self, id: &str, patch: &UserPatch) -> Result<Option<User>, StoreError> {
        let email = match (self.email_for_id(id), &patch.email) {
            (Some(email), _) => email,
            (None, Some(hint)) => normalize_email(hint),
            (None, None) => return Ok(None),
        };

        Ok(self.by_email.get_mut(&email).map(|mut user| {
            patch.apply(user.value_mut(), chrono::Utc::now());
            user.value().clone()
        }))
    }

    async fn ping(&self) -> Result<String, StoreError> {
        Ok("memory".to_string())
    }
}
