// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stateless session tokens (HS256 JWT carrying user ID and email).

use crate::models::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Session lifetime: 7 days.
pub const SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Identity proven by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

/// Mints and verifies session tokens with one process-wide secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a session token for a user, expiring 7 days from now.
    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        self.issue_at(user, now)
    }

    /// Create a session token as if issued at `issued_at`.
    pub fn issue_at(&self, user: &User, issued_at: u64) -> anyhow::Result<String> {
        let claims = SessionClaims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECS,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify a token. Bad signature, other algorithms, expiry and malformed
    /// input all yield `None`.
    pub fn verify(&self, token: &str) -> Option<Session> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).ok()?;
        Some(Session {
            user_id: data.claims.user_id,
            email: data.claims.email,
        })
    }
}
