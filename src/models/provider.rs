// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External OAuth identity/resource providers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An OAuth2 provider a user can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::Microsoft];

    /// Lowercase name used in URLs, cookies and error codes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_path_segment_deserializes() {
        let provider: Provider = serde_json::from_str("\"microsoft\"").unwrap();
        assert_eq!(provider, Provider::Microsoft);
        assert!(serde_json::from_str::<Provider>("\"dropbox\"").is_err());
    }
}
