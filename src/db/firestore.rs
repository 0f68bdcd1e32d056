// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed user store.
//!
//! Users live in one collection keyed by their (URL-encoded) email, so the
//! create precondition enforces one user per email. The user ID is a field
//! used for secondary lookups.
//!
//! The client is opened lazily on first use and shared for the life of the
//! process.

use super::{collections, new_user_id, normalize_email, normalize_id, StoreError, UserStore};
use crate::models::{NewUser, User, UserPatch};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use tokio::sync::OnceCell;

/// Firestore database id used when none is configured.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Firestore user store.
pub struct FirestoreUserStore {
    project_id: String,
    database_id: String,
    client: OnceCell<firestore::FirestoreDb>,
}

impl FirestoreUserStore {
    /// Create a store for the given project and database. No connection is
    /// made until the first operation.
    pub fn new(project_id: &str, database_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            database_id: database_id.to_string(),
            client: OnceCell::new(),
        }
    }

    /// Get the shared client, connecting on first call. Concurrent first
    /// callers wait on the same connection attempt.
    async fn db(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .get_or_try_init(|| connect(&self.project_id, &self.database_id))
            .await
    }
}

/// Open a Firestore client.
///
/// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
async fn connect(project_id: &str, database_id: &str) -> Result<firestore::FirestoreDb, StoreError> {
    let options = firestore::FirestoreDbOptions::new(project_id.to_string())
        .with_database_id(database_id.to_string());

    // If the emulator environment variable is set, use unauthenticated connection
    // to avoid local credential warnings and leakage.
    if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            database = database_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );
        return Ok(client);
    }

    let client = firestore::FirestoreDb::with_options(options)
        .await
        .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

    tracing::info!(
        project = project_id,
        database = database_id,
        "Connected to Firestore"
    );
    Ok(client)
}

impl FirestoreUserStore {
    /// One attempt at a transactional partial update of `doc_id`.
    async fn patch_in_transaction(
        &self,
        doc_id: &str,
        patch: &UserPatch,
    ) -> Result<Option<User>, StoreError> {
        let db = self.db().await?;

        let mut transaction = db
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        // Read through the transaction so the document is locked until commit
        let tx_db = db.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let current: Option<User> = tx_db
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read user in transaction: {}", e)))?;

        let Some(mut user) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        patch.apply(&mut user, chrono::Utc::now());

        db.fluent()
            .update()
            .fields(patch.changed_fields())
            .in_col(collections::USERS)
            .document_id(doc_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| StoreError::Backend(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| StoreError::Backend(format!("Transaction commit failed: {}", e)))?;

        Ok(Some(user))
    }
}

/// Transactions aborted by a concurrent writer are retried this many times.
const MAX_PATCH_ATTEMPTS: u32 = 3;

/// Document ID for a user. Emails may contain characters Firestore reserves.
fn document_id(email: &str) -> String {
    urlencoding::encode(&normalize_email(email)).into_owned()
}

#[async_trait]
impl UserStore for FirestoreUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.db()
            .await?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&document_id(email))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let id = normalize_id(id);

        let users: Vec<User> = self
            .db()
            .await?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("id").eq(id.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let email = normalize_email(&new_user.email);
        let user = NewUser {
            email: email.clone(),
            ..new_user
        }
        .into_user(new_user_id(), chrono::Utc::now());

        let result: Result<User, FirestoreError> = self
            .db()
            .await?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(document_id(&email))
            .object(&user)
            .execute()
            .await;

        match result {
            Ok(created) => {
                tracing::info!(user_id = %created.id, "User created");
                Ok(created)
            }
            Err(FirestoreError::DataConflictError(_)) => Err(StoreError::DuplicateKey(email)),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    /// Read, patch and write back inside one transaction, writing only the
    /// fields the patch names. A concurrent write to the same user aborts
    /// the commit and the patch is retried on fresh data.
    async fn write_patch(&self, id: &str, patch: &UserPatch) -> Result<Option<User>, StoreError> {
        // The document ID derives from the email, which never changes.
        let existing = match self.find_by_id(id).await? {
            Some(user) => Some(user),
            None => match &patch.email {
                Some(email) => self.find_by_email(email).await?,
                None => None,
            },
        };
        let Some(existing) = existing else {
            return Ok(None);
        };
        let doc_id = document_id(&existing.email);

        let mut attempt = 1;
        loop {
            match self.patch_in_transaction(&doc_id, patch).await {
                Err(StoreError::Backend(e)) if attempt < MAX_PATCH_ATTEMPTS => {
                    tracing::warn!(user_id = id, attempt, error = %e, "Patch transaction failed, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn ping(&self) -> Result<String, StoreError> {
        let _: Option<User> = self
            .db()
            .await?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one("__health__")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(self.database_id.clone())
    }
}
