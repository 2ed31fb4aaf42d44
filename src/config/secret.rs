//! Secure handling of key material using the secrecy crate
//!
//! The organisational base key and every derived context key are held as
//! [`SecretString`]: zeroized when dropped and redacted in `Debug` output.
//! Code must call `expose_secret()` to read the value.
//!
//! # Example
//!
//! ```rust
//! use custodian::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let base_key = secret_string("org-secret".to_string());
//! assert_eq!(base_key.expose_secret().as_ref(), "org-secret");
//!
//! // Debug output is redacted
//! assert!(!format!("{base_key:?}").contains("org-secret"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the secret in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
///
/// This wraps a `SecretValue` in a `Secret` container that:
/// - Zeros the memory when dropped
/// - Prevents accidental logging via Debug
/// - Requires explicit `expose_secret()` to access
pub type SecretString = Secret<SecretValue>;

/// Helper function to create a SecretString from a String
///
/// # Example
///
/// ```rust
/// use custodian::config::secret_string;
///
/// let base_key = secret_string("org-secret".to_string());
/// ```
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("base-key".to_string());
        assert_eq!(secret.expose_secret(), "base-key");
        assert_eq!(secret.expose_secret().len(), 8);
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-data".to_string());
        let debug_output = format!("{secret:?}");

        assert!(!debug_output.contains("sensitive-data"));
        assert!(debug_output.contains("REDACTED") || debug_output.contains("Secret"));
    }

    #[test]
    fn test_secret_from_toml() {
        #[derive(Deserialize)]
        struct EncryptionSection {
            base_key: SecretString,
        }

        let section: EncryptionSection = toml::from_str(r#"base_key = "k3y""#).unwrap();
        assert_eq!(section.base_key.expose_secret(), "k3y");
        assert!(!section.base_key.expose_secret().is_empty());
    }
}
