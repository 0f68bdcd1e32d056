// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed OAuth `state` parameter.
//!
//! Format: `base64url(json({"link": bool})) "." hex(hmac_sha256(payload))`.
//! Anything that fails to decode or verify is read as a plain login, never
//! as a link request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct StatePayload {
    link: bool,
}

/// Encodes and verifies the `state` parameter.
#[derive(Clone)]
pub struct OAuthStateSigner {
    keyed_mac: HmacSha256,
}

impl OAuthStateSigner {
    pub fn new(key: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            keyed_mac: HmacSha256::new_from_slice(key)?,
        })
    }

    fn mac(&self) -> HmacSha256 {
        self.keyed_mac.clone()
    }

    /// Build a signed state value.
    pub fn encode(&self, linking: bool) -> String {
        let json = serde_json::json!({ "link": linking }).to_string();
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{}.{}", payload, signature)
    }

    /// Decode the `link` flag, or `None` if the state is malformed or its
    /// signature does not verify.
    pub fn decode(&self, state: &str) -> Option<bool> {
        let (payload, signature_hex) = state.split_once('.')?;
        let signature = hex::decode(signature_hex).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            tracing::warn!("OAuth state signature mismatch");
            return None;
        }

        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let parsed: StatePayload = serde_json::from_slice(&bytes).ok()?;
        Some(parsed.link)
    }

    /// Whether the callback is a link request. Missing or bad state means no.
    pub fn is_linking(&self, state: Option<&str>) -> bool {
        state.and_then(|s| self.decode(s)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let signer = OAuthStateSigner::new(b"secret_key").unwrap();
        assert_eq!(signer.decode(&signer.encode(true)), Some(true));
        assert_eq!(signer.decode(&signer.encode(false)), Some(false));
    }

    #[test]
    fn test_state_payload_is_base64_json() {
        let signer = OAuthStateSigner::new(b"secret_key").unwrap();
        let state = signer.encode(true);
        let (payload, _) = state.split_once('.').unwrap();

        let json = URL_SAFE_NO_PAD.decode(payload).unwrap();
        assert_eq!(json, br#"{"link":true}"#);
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = OAuthStateSigner::new(b"secret_key").unwrap().encode(true);
        let other = OAuthStateSigner::new(b"wrong_key").unwrap();

        assert_eq!(other.decode(&state), None);
        assert!(!other.is_linking(Some(&state)));
    }

    #[test]
    fn test_forged_link_flag_rejected() {
        let signer = OAuthStateSigner::new(b"secret_key").unwrap();
        let state = signer.encode(false);
        let (_, signature) = state.split_once('.').unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"link":true}"#);
        let forged = format!("{}.{}", forged_payload, signature);

        assert!(!signer.is_linking(Some(&forged)));
    }

    #[test]
    fn test_unsigned_state_is_not_linking() {
        let signer = OAuthStateSigner::new(b"secret_key").unwrap();
        let unsigned = URL_SAFE_NO_PAD.encode(br#"{"link":true}"#);

        assert!(!signer.is_linking(Some(&unsigned)));
    }

    #[test]
    fn test_malformed_state_is_not_linking() {
        let signer = OAuthStateSigner::new(b"secret_key").unwrap();

        assert!(!signer.is_linking(None));
        assert!(!signer.is_linking(Some("")));
        assert!(!signer.is_linking(Some("not-valid-base64!!!.zz")));
        assert!(!signer.is_linking(Some("invalid|format")));
    }
}
