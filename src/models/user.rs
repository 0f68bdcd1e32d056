//! User model for storage and API.

use crate::models::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile and provider credentials stored in Firestore.
///
/// The `*_connected` flags are never written directly; they are derived from
/// the access token whenever credentials change (see [`UserPatch`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque unique ID (UUID v4), stable for the user's lifetime
    pub id: String,
    /// Natural key, unique across users
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub google_connected: bool,
    #[serde(default)]
    pub microsoft_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsoft_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsoft_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_connected(&self, provider: Provider) -> bool {
        match provider {
            Provider::Google => self.google_connected,
            Provider::Microsoft => self.microsoft_connected,
        }
    }

    pub fn access_token(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_access_token.as_deref(),
            Provider::Microsoft => self.microsoft_access_token.as_deref(),
        }
        .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_refresh_token.as_deref(),
            Provider::Microsoft => self.microsoft_refresh_token.as_deref(),
        }
        .filter(|t| !t.is_empty())
    }

    /// Set a provider's tokens and keep its connected flag in step with the
    /// access token.
    fn set_credentials(
        &mut self,
        provider: Provider,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) {
        let access_token = access_token.filter(|t| !t.is_empty());
        let connected = access_token.is_some();
        let (flag, access, refresh) = match provider {
            Provider::Google => (
                &mut self.google_connected,
                &mut self.google_access_token,
                &mut self.google_refresh_token,
            ),
            Provider::Microsoft => (
                &mut self.microsoft_connected,
                &mut self.microsoft_access_token,
                &mut self.microsoft_refresh_token,
            ),
        };
        *flag = connected;
        *access = access_token;
        *refresh = refresh_token;
    }

    fn apply_change(&mut self, provider: Provider, change: &CredentialChange) {
        match change {
            CredentialChange::Connect(tokens) => {
                // Providers omit the refresh token when consent was already granted.
                let refresh = tokens
                    .refresh_token
                    .clone()
                    .or_else(|| self.refresh_token(provider).map(str::to_string));
                self.set_credentials(provider, Some(tokens.access_token.clone()), refresh);
            }
            CredentialChange::RefreshAccess(access_token) => {
                let refresh = self.refresh_token(provider).map(str::to_string);
                self.set_credentials(provider, Some(access_token.clone()), refresh);
            }
            CredentialChange::Disconnect => self.set_credentials(provider, None, None),
        }
    }
}

/// Tokens returned by a provider for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Fields for a brand new user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub google: Option<ProviderTokens>,
    pub microsoft: Option<ProviderTokens>,
}

impl NewUser {
    /// Build the stored record. Providers without tokens start disconnected.
    pub fn into_user(self, id: String, now: DateTime<Utc>) -> User {
        let mut user = User {
            id,
            email: self.email,
            name: self.name,
            image: self.image,
            google_connected: false,
            microsoft_connected: false,
            google_access_token: None,
            google_refresh_token: None,
            microsoft_access_token: None,
            microsoft_refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        if let Some(tokens) = self.google {
            user.set_credentials(Provider::Google, Some(tokens.access_token), tokens.refresh_token);
        }
        if let Some(tokens) = self.microsoft {
            user.set_credentials(
                Provider::Microsoft,
                Some(tokens.access_token),
                tokens.refresh_token,
            );
        }
        user
    }
}

/// Change to one provider's credentials. The connected flag and the access
/// token always move together.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialChange {
    /// Newly granted tokens from a login or link.
    Connect(ProviderTokens),
    /// A refreshed access token; the refresh token is kept.
    RefreshAccess(String),
    /// Drop both tokens.
    Disconnect,
}

/// Partial update of a user.
///
/// `email` is only a match hint: when no user has the given ID the store may
/// fall back to the user with this email. The email itself is immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub google: Option<CredentialChange>,
    pub microsoft: Option<CredentialChange>,
}

impl UserPatch {
    pub fn credentials(provider: Provider, change: CredentialChange) -> Self {
        let mut patch = Self::default();
        patch.set_credentials(provider, change);
        patch
    }

    pub fn set_credentials(&mut self, provider: Provider, change: CredentialChange) {
        match provider {
            Provider::Google => self.google = Some(change),
            Provider::Microsoft => self.microsoft = Some(change),
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// Stored field names this patch writes, `updatedAt` included.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["updatedAt"];
        if self.name.is_some() {
            fields.push("name");
        }
        if self.image.is_some() {
            fields.push("image");
        }
        if self.google.is_some() {
            fields.extend(["googleConnected", "googleAccessToken", "googleRefreshToken"]);
        }
        if self.microsoft.is_some() {
            fields.extend([
                "microsoftConnected",
                "microsoftAccessToken",
                "microsoftRefreshToken",
            ]);
        }
        fields
    }

    /// Apply the patch to a stored record and stamp `updated_at`.
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            user.name = Some(name.clone());
        }
        if let Some(image) = &self.image {
            user.image = Some(image.clone());
        }
        if let Some(change) = &self.google {
            user.apply_change(Provider::Google, change);
        }
        if let Some(change) = &self.microsoft {
            user.apply_change(Provider::Microsoft, change);
        }
        user.updated_at = now;
    }
}

/// User profile returned to the browser (tokens stripped).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub google_connected: bool,
    pub microsoft_connected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            google_connected: user.google_connected,
            microsoft_connected: user.microsoft_connected,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(access: &str, refresh: Option<&str>) -> ProviderTokens {
        ProviderTokens {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    fn google_user() -> User {
        NewUser {
            email: "alice@x.com".to_string(),
            google: Some(tokens("g-access", Some("g-refresh"))),
            ..Default::default()
        }
        .into_user("id-1".to_string(), Utc::now())
    }

    #[test]
    fn test_new_user_defaults_to_disconnected() {
        let user = NewUser {
            email: "bob@x.com".to_string(),
            ..Default::default()
        }
        .into_user("id-2".to_string(), Utc::now());

        assert!(!user.google_connected);
        assert!(!user.microsoft_connected);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_new_user_with_tokens_is_connected() {
        let user = google_user();
        assert!(user.google_connected);
        assert_eq!(user.access_token(Provider::Google), Some("g-access"));
        assert!(!user.microsoft_connected);
    }

    #[test]
    fn test_empty_access_token_is_not_connected() {
        let user = NewUser {
            email: "carol@x.com".to_string(),
            microsoft: Some(tokens("", Some("r"))),
            ..Default::default()
        }
        .into_user("id-3".to_string(), Utc::now());

        assert!(!user.microsoft_connected);
        assert_eq!(user.access_token(Provider::Microsoft), None);
    }

    #[test]
    fn test_refresh_keeps_refresh_token() {
        let mut user = google_user();
        let later = user.updated_at + chrono::Duration::seconds(5);

        UserPatch::credentials(
            Provider::Google,
            CredentialChange::RefreshAccess("g-new".to_string()),
        )
        .apply(&mut user, later);

        assert_eq!(user.access_token(Provider::Google), Some("g-new"));
        assert_eq!(user.refresh_token(Provider::Google), Some("g-refresh"));
        assert!(user.google_connected);
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn test_reconnect_without_refresh_token_keeps_old_one() {
        let mut user = google_user();

        UserPatch::credentials(
            Provider::Google,
            CredentialChange::Connect(tokens("g-second", None)),
        )
        .apply(&mut user, Utc::now());

        assert_eq!(user.refresh_token(Provider::Google), Some("g-refresh"));
        assert_eq!(user.access_token(Provider::Google), Some("g-second"));
    }

    #[test]
    fn test_disconnect_clears_flag_and_tokens_together() {
        let mut user = google_user();

        UserPatch::credentials(Provider::Google, CredentialChange::Disconnect)
            .apply(&mut user, Utc::now());

        assert!(!user.google_connected);
        assert_eq!(user.access_token(Provider::Google), None);
        assert_eq!(user.refresh_token(Provider::Google), None);
    }

    #[test]
    fn test_changed_fields_only_name_the_patched_provider() {
        let patch = UserPatch::credentials(
            Provider::Google,
            CredentialChange::RefreshAccess("g-new".to_string()),
        );

        let fields = patch.changed_fields();
        assert_eq!(
            fields,
            vec!["updatedAt", "googleConnected", "googleAccessToken", "googleRefreshToken"]
        );

        // Every name is a real stored field
        let stored = serde_json::to_value(google_user()).unwrap();
        for field in fields {
            assert!(stored.get(field).is_some(), "{field} is not a stored field");
        }
    }

    #[test]
    fn test_changed_fields_for_profile_patch() {
        let patch = UserPatch::default().with_image(Some("https://example.com/a.png".to_string()));
        assert_eq!(patch.changed_fields(), vec!["updatedAt", "image"]);
    }

    #[test]
    fn test_public_user_has_no_tokens() {
        let json = serde_json::to_value(PublicUser::from(&google_user())).unwrap();
        let text = json.to_string();

        assert!(!text.contains("g-access"));
        assert!(!text.contains("g-refresh"));
        assert_eq!(json["googleConnected"], true);
        assert_eq!(json["email"], "alice@x.com");
    }
}
