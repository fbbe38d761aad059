//! Signing key derivation

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::AuthError;

/// Minimum key length for HS256
pub const MIN_KEY_BYTES: usize = 32;

/// Secret used in lenient mode when none is configured
const DEVELOPMENT_SECRET: &str = "todo-app-development-signing-secret-change-me";

/// Startup behavior when no signing secret is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Refuse to start
    Strict,
    /// Fall back to the development secret and log a warning
    #[default]
    Lenient,
}

/// Process-wide HMAC secret
///
/// Derived once at startup and shared read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    bytes: Vec<u8>,
    fallback: bool,
}

impl SigningKey {
    /// Derive the key from an optional configured secret
    ///
    /// A blank secret counts as absent.
    pub fn derive(secret: Option<&str>, mode: KeyMode) -> Result<Self, AuthError> {
        match secret.filter(|s| !s.trim().is_empty()) {
            Some(secret) => {
                if secret.len() < MIN_KEY_BYTES {
                    warn!(
                        "Configured signing secret is {} bytes, lengthening to at least {}",
                        secret.len(),
                        MIN_KEY_BYTES
                    );
                }
                Ok(Self {
                    bytes: lengthen(secret.as_bytes()),
                    fallback: false,
                })
            }
            None => match mode {
                KeyMode::Strict => Err(AuthError::KeyInitialization(
                    "no signing secret configured".to_string(),
                )),
                KeyMode::Lenient => {
                    warn!("No signing secret configured, using the development secret");
                    Ok(Self::development())
                }
            },
        }
    }

    /// The fixed development key
    pub fn development() -> Self {
        info!("Deriving development signing key");
        Self {
            bytes: lengthen(DEVELOPMENT_SECRET.as_bytes()),
            fallback: true,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether this key is the development fallback
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.bytes.len())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Repeat the secret whole until it reaches [`MIN_KEY_BYTES`]
fn lengthen(secret: &[u8]) -> Vec<u8> {
    if secret.is_empty() || secret.len() >= MIN_KEY_BYTES {
        return secret.to_vec();
    }
    secret.repeat(MIN_KEY_BYTES.div_ceil(secret.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_secret_used_verbatim() {
        let secret = "testing_jwt_secret_must_be_long_enough_12345";
        let key = SigningKey::derive(Some(secret), KeyMode::Strict).unwrap();

        assert_eq!(key.as_bytes(), secret.as_bytes());
        assert!(!key.is_fallback());
    }

    #[test]
    fn test_short_secret_lengthened_by_repetition() {
        let key = SigningKey::derive(Some("abc"), KeyMode::Strict).unwrap();

        assert_eq!(key.as_bytes().len(), 33);
        assert!(key.as_bytes().starts_with(b"abcabc"));
        assert_eq!(key, SigningKey::derive(Some("abc"), KeyMode::Lenient).unwrap());
    }

    #[test]
    fn test_missing_secret_strict_fails() {
        assert!(matches!(
            SigningKey::derive(None, KeyMode::Strict),
            Err(AuthError::KeyInitialization(_))
        ));
        assert!(matches!(
            SigningKey::derive(Some("   "), KeyMode::Strict),
            Err(AuthError::KeyInitialization(_))
        ));
    }

    #[test]
    fn test_missing_secret_lenient_falls_back() {
        let key = SigningKey::derive(None, KeyMode::Lenient).unwrap();

        assert!(key.is_fallback());
        assert!(key.as_bytes().len() >= MIN_KEY_BYTES);
        assert_eq!(key, SigningKey::development());
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = SigningKey::derive(Some("super-secret-value"), KeyMode::Strict).unwrap();
        assert!(!format!("{:?}", key).contains("super-secret"));
    }
}
