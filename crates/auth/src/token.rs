//! Remember tokens: the opaque credential carried by the remember cookie.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use tollgate_core::ValueObject;

/// Number of random bytes in a freshly minted token (40 hex characters).
const TOKEN_BYTES: usize = 20;

/// Opaque persistent credential identifying a principal across requests.
///
/// `Debug` is redacted so tokens don't end up in logs by accident; use
/// [`RememberToken::as_str`] when the raw value is actually needed (cookie
/// writes, store indexes).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RememberToken(String);

impl RememberToken {
    /// Mint a new random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty token never establishes a session.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl ValueObject for RememberToken {}

impl core::fmt::Debug for RememberToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            f.write_str("RememberToken(<empty>)")
        } else {
            f.write_str("RememberToken(<redacted>)")
        }
    }
}

impl From<String> for RememberToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RememberToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_forty_hex_chars() {
        let token = RememberToken::generate();
        assert_eq!(token.as_str().len(), 40);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_decode_to_token_bytes() {
        let token = RememberToken::generate();
        let bytes = hex::decode(token.as_str()).unwrap();
        assert_eq!(bytes.len(), TOKEN_BYTES);
        assert_eq!(token.as_str(), token.as_str().to_ascii_lowercase());
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(RememberToken::generate(), RememberToken::generate());
    }

    #[test]
    fn debug_does_not_leak_the_value() {
        let token = RememberToken::new("abc123");
        assert!(!format!("{token:?}").contains("abc123"));
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        assert!(RememberToken::new("").is_empty());
        assert!(RememberToken::new("  ").is_empty());
        assert!(!RememberToken::new("abc").is_empty());
    }
}
