use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Values shipped in sample env files. Treated the same as an unset key.
const PLACEHOLDER_KEYS: &[&str] = &[
    "your-internal-api-key",
    "your_internal_api_key",
    "internal-api-key",
    "changeme",
    "change-me",
    "replace-me",
    "secret",
];

/// The bearer secret shared between the bridge and the internal routes.
/// Never printed; `Debug` and logs only ever see the fingerprint.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// `None` for blank or placeholder values.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_placeholder(trimmed) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// First 12 hex chars of the SHA-256 digest; enough to tell keys apart in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSecret").field(&self.fingerprint()).finish()
    }
}

pub fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    PLACEHOLDER_KEYS.contains(&lowered.as_str()) || (lowered.starts_with('<') && lowered.ends_with('>'))
}
