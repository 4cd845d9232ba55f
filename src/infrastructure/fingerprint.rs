use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::fmt;

/// One-way digest of a platform credential.
///
/// Used to bind a verification result to the exact token that was checked and
/// to refer to a token in logs without exposing it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenFingerprint([u8; 32]);

impl TokenFingerprint {
    pub fn of(token: &str) -> Self {
        let digest = Sha256::digest(token.trim().as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn matches(&self, token: &str) -> bool {
        *self == Self::of(token)
    }

    /// Short printable prefix, enough to correlate log lines.
    pub fn short(&self) -> String {
        let mut encoded = BASE64.encode(self.0);
        encoded.truncate(12);
        encoded
    }
}

impl fmt::Debug for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenFingerprint({})", self.short())
    }
}

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}
