//! Encrypted value codec
//!
//! Deterministic keyed polyalphabetic substitution used by the reversible field
//! transforms. Every anonymize/deanonymize call works under one [`EncryptionContext`]:
//! a caller-held base key combined with a per-operation salt. The derived key is
//! never persisted; only whoever holds the base key and knows the salt (for
//! sweep-triggered scrubs, the legal reason id) can reverse a scrub.
//!
//! # Examples
//!
//! ```
//! use custodian::anonymization::encryption::{decrypt_message, encrypt_message, LETTERS};
//!
//! let cipher = encrypt_message("3fa9", "Jane Doe", LETTERS);
//! assert_ne!(cipher, "Jane Doe");
//! assert_eq!(decrypt_message("3fa9", &cipher, LETTERS), "Jane Doe");
//! ```

use crate::config::{secret_string, SecretString};
use crate::domain::errors::CustodianError;
use crate::domain::legal_reason::LegalReason;
use crate::domain::result::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::fmt;

/// Printable ASCII alphabet shifted by text transforms
pub const LETTERS: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Characters allowed unquoted in the local part of an email address
pub const EMAIL_LOCAL_LETTERS: &str =
    "!#$%&'*+-/0123456789=?ABCDEFGHIJKLMNOPQRSTUVWXYZ^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Host name characters (RFC 952 / RFC 1123)
pub const DOMAIN_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz1234567890";

/// Separator between base key and salt in key derivation
const KEY_SALT_SEPARATOR: u8 = 0x1f;

/// Hex digits of a context fingerprint
const FINGERPRINT_LEN: usize = 16;

/// Key derived for one anonymization operation
///
/// Lowercase hex SHA-256 digest; zeroized on drop and redacted in debug output.
#[derive(Clone)]
pub struct ContextKey(SecretString);

impl ContextKey {
    /// Exposes the key material to the codec
    pub fn expose(&self) -> &str {
        self.0.expose_secret().as_ref()
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContextKey([REDACTED])")
    }
}

/// Effective encryption context of one anonymize/deanonymize call
///
/// The same context is handed unchanged to every record reached through the
/// relation tree, so one consent's whole object graph shares one derivable key.
#[derive(Clone)]
pub struct EncryptionContext {
    key: ContextKey,
    salt: String,
}

impl EncryptionContext {
    /// Derives a context from a base key and a per-operation salt
    ///
    /// # Arguments
    ///
    /// * `base_key` - Organisational secret
    /// * `salt` - Per-operation salt; distinct salts give unlinkable ciphertexts
    pub fn new(base_key: &SecretString, salt: impl Into<String>) -> Self {
        let salt = salt.into();
        let base: &str = base_key.expose_secret().as_ref();

        let mut hasher = Sha256::new();
        hasher.update(base.as_bytes());
        hasher.update([KEY_SALT_SEPARATOR]);
        hasher.update(salt.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self {
            key: ContextKey(secret_string(digest)),
            salt,
        }
    }

    /// Context used when a legal reason expires
    ///
    /// The legal reason id is the salt, so the scrub can be reversed later from
    /// the base key and the ledger's back-reference alone.
    pub fn for_legal_reason(base_key: &SecretString, legal_reason: &LegalReason) -> Self {
        Self::new(base_key, legal_reason.id.to_string())
    }

    /// Context with a random base key and salt that are never stored
    ///
    /// Values encrypted under it cannot be decrypted by anyone.
    pub fn ephemeral() -> Self {
        let base = secret_string(random_token(48));
        Self::new(&base, random_token(16))
    }

    /// Salt this context was derived with
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Derived key material
    pub fn key(&self) -> &str {
        self.key.expose()
    }

    /// Short digest identifying the derived key without revealing it
    ///
    /// Stored on ledger rows so a reversal under another context is refused.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"fingerprint");
        hasher.update([KEY_SALT_SEPARATOR]);
        hasher.update(self.key().as_bytes());
        format!("{:x}", hasher.finalize())
            .chars()
            .take(FINGERPRINT_LEN)
            .collect()
    }

    /// Numeric form of the derived key, see [`numerize_key`]
    pub fn numeric_key(&self) -> u128 {
        numerize_key(self.key())
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("key", &self.key)
            .field("salt", &self.salt)
            .finish()
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Shifts every symbol of `message` found in `letters` by the matching key symbol
///
/// The key position only advances on symbols that were shifted; anything outside
/// the alphabet passes through unchanged.
fn translate_message(key: &str, message: &str, encrypt: bool, letters: &str) -> String {
    let alphabet: Vec<char> = letters.chars().collect();
    let key: Vec<char> = key.chars().collect();
    if key.is_empty() || alphabet.is_empty() {
        return message.to_string();
    }

    let len = alphabet.len() as i64;
    let position = |c: char| alphabet.iter().position(|&a| a == c);

    let mut key_index = 0;
    message
        .chars()
        .map(|symbol| match position(symbol) {
            Some(num) => {
                let shift = position(key[key_index]).map_or(-1, |s| s as i64);
                let shifted = if encrypt {
                    num as i64 + shift
                } else {
                    num as i64 - shift
                };
                key_index = (key_index + 1) % key.len();
                alphabet[shifted.rem_euclid(len) as usize]
            }
            None => symbol,
        })
        .collect()
}

/// Encrypts `message` over the given alphabet
pub fn encrypt_message(key: &str, message: &str, letters: &str) -> String {
    translate_message(key, message, true, letters)
}

/// Reverses [`encrypt_message`]
pub fn decrypt_message(key: &str, message: &str, letters: &str) -> String {
    translate_message(key, message, false, letters)
}

fn translate_email(key: &str, email: &str, encrypt: bool) -> Result<String> {
    let (local, domain_tld) = email
        .split_once('@')
        .filter(|(_, rest)| !rest.contains('@'))
        .ok_or_else(|| CustodianError::Encryption(format!("Not an email address: '{email}'")))?;
    let (domain, tld) = domain_tld.rsplit_once('.').ok_or_else(|| {
        CustodianError::Encryption(format!("Email address '{email}' has no top-level domain"))
    })?;

    Ok(format!(
        "{}@{}.{}",
        translate_message(key, local, encrypt, EMAIL_LOCAL_LETTERS),
        translate_message(key, domain, encrypt, DOMAIN_LETTERS),
        tld
    ))
}

/// Encrypts an email address, keeping it syntactically valid
///
/// The local part and the domain label are shifted over their own alphabets;
/// the top-level domain is kept.
///
/// # Errors
///
/// Returns [`CustodianError::Encryption`] if the value is not `local@domain.tld`.
pub fn encrypt_email(key: &str, email: &str) -> Result<String> {
    translate_email(key, email, true)
}

/// Reverses [`encrypt_email`]
pub fn decrypt_email(key: &str, email: &str) -> Result<String> {
    translate_email(key, email, false)
}

/// Country code and check digits kept in clear by the IBAN cipher
const IBAN_PREFIX_LEN: usize = 4;

/// Shifts one IBAN symbol within its own class (digit, upper or lower letter)
fn shift_iban_symbol(symbol: char, key_symbol: char, encrypt: bool) -> Option<char> {
    let (base, len) = match symbol {
        '0'..='9' => (b'0', 10u8),
        'A'..='Z' => (b'A', 26u8),
        'a'..='z' => (b'a', 26u8),
        _ => return None,
    };
    let shift = (key_symbol as u32 % u32::from(len)) as u8;
    let position = symbol as u8 - base;
    let shifted = if encrypt {
        (position + shift) % len
    } else {
        (position + len - shift) % len
    };
    Some(char::from(base + shifted))
}

fn translate_iban(key: &str, iban: &str, encrypt: bool) -> Result<String> {
    let valid_prefix = iban
        .chars()
        .take(IBAN_PREFIX_LEN)
        .enumerate()
        .all(|(i, c)| if i < 2 { c.is_ascii_alphabetic() } else { c.is_ascii_digit() });
    let split = iban
        .char_indices()
        .nth(IBAN_PREFIX_LEN)
        .map(|(i, _)| i)
        .filter(|_| valid_prefix)
        .ok_or_else(|| CustodianError::Encryption(format!("Not an IBAN: '{iban}'")))?;
    let (prefix, account) = iban.split_at(split);

    let key: Vec<char> = key.chars().collect();
    if key.is_empty() {
        return Ok(iban.to_string());
    }

    let mut key_index = 0;
    let translated: String = account
        .chars()
        .map(|symbol| match shift_iban_symbol(symbol, key[key_index], encrypt) {
            Some(shifted) => {
                key_index = (key_index + 1) % key.len();
                shifted
            }
            None => symbol,
        })
        .collect();
    Ok(format!("{prefix}{translated}"))
}

/// Encrypts an International Bank Account Number
///
/// Country code and check digits are kept; digits stay digits and letters stay
/// letters of the same case, so grouping spaces and length survive.
///
/// # Errors
///
/// Returns [`CustodianError::Encryption`] if the value does not start with a
/// country code and two check digits followed by an account part.
pub fn encrypt_iban(key: &str, iban: &str) -> Result<String> {
    translate_iban(key, iban, true)
}

/// Reverses [`encrypt_iban`]
pub fn decrypt_iban(key: &str, iban: &str) -> Result<String> {
    translate_iban(key, iban, false)
}

/// Folds a key into a number: `Σ ord(key[i]) · 12^(i+1)`, wrapping at 128 bits
pub fn numerize_key(key: &str) -> u128 {
    key.chars().enumerate().fold(0u128, |acc, (i, c)| {
        let weight = 12u128.wrapping_pow(i as u32 + 1);
        acc.wrapping_add((c as u128).wrapping_mul(weight))
    })
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(value: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value);
    format!("{:x}", hasher.finalize())
}

/// One-way scramble: SHA-256 hex digest truncated to the original length
pub fn hash_text(value: &str) -> String {
    let len = value.chars().count();
    sha256_hex(value.as_bytes()).chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "LoremIpsumDolorSitAmet";

    #[test]
    fn test_message_roundtrip() {
        let message = "Hello, World! 1234 {x}";
        let encrypted = encrypt_message(KEY, message, LETTERS);
        assert_ne!(encrypted, message);
        assert_eq!(encrypted.len(), message.len());
        assert_eq!(decrypt_message(KEY, &encrypted, LETTERS), message);
    }

    #[test]
    fn test_unknown_symbols_pass_through() {
        let encrypted = encrypt_message(KEY, "Žluťoučký kůň", LETTERS);
        assert!(encrypted.contains('Ž'));
        assert!(encrypted.contains('ů'));
        assert_eq!(decrypt_message(KEY, &encrypted, LETTERS), "Žluťoučký kůň");
    }

    #[test]
    fn test_email_keeps_tld_and_shape() {
        let encrypted = encrypt_email(KEY, "jane.doe@example.com").unwrap();
        assert!(encrypted.ends_with(".com"));
        assert_eq!(encrypted.matches('@').count(), 1);
        assert_ne!(encrypted, "jane.doe@example.com");
        assert_eq!(decrypt_email(KEY, &encrypted).unwrap(), "jane.doe@example.com");
    }

    #[test]
    fn test_email_subdomain_roundtrip() {
        let encrypted = encrypt_email(KEY, "info@mail.example.co").unwrap();
        assert!(encrypted.ends_with(".co"));
        assert_eq!(decrypt_email(KEY, &encrypted).unwrap(), "info@mail.example.co");
    }

    #[test]
    fn test_invalid_email() {
        assert!(encrypt_email(KEY, "not-an-email").is_err());
        assert!(encrypt_email(KEY, "a@b@c.com").is_err());
        assert!(encrypt_email(KEY, "user@localhost").is_err());
    }

    #[test]
    fn test_iban_roundtrip_keeps_shape() {
        for iban in [
            "CZ65 0800 0000 1920 0014 5399",
            "AZ21 NABZ 0000 0000 1370 1000 1944",
            "BR1800360305000010009795493C1",
            "GB29nwbk60161331926819",
        ] {
            let encrypted = encrypt_iban(KEY, iban).unwrap();
            assert_ne!(encrypted, iban);
            assert_eq!(&encrypted[..4], &iban[..4]);
            assert_eq!(encrypted.len(), iban.len());
            for (a, b) in encrypted.chars().zip(iban.chars()) {
                assert_eq!(a.is_ascii_digit(), b.is_ascii_digit());
                assert_eq!(a.is_ascii_uppercase(), b.is_ascii_uppercase());
                assert_eq!(a == ' ', b == ' ');
            }
            assert_eq!(decrypt_iban(KEY, &encrypted).unwrap(), iban);
        }
    }

    #[test]
    fn test_invalid_iban() {
        assert!(encrypt_iban(KEY, "CZ65").is_err());
        assert!(encrypt_iban(KEY, "1234 5678").is_err());
        assert!(encrypt_iban(KEY, "").is_err());
    }

    #[test]
    fn test_numerize_key() {
        assert_eq!(numerize_key(""), 0);
        assert_eq!(numerize_key("a"), 97 * 12);
        assert_eq!(numerize_key("ab"), 97 * 12 + 98 * 144);
    }

    #[test]
    fn test_numerize_long_key_does_not_overflow() {
        let key = "f".repeat(64);
        let _ = numerize_key(&key);
    }

    #[test]
    fn test_hash_text_truncates() {
        assert_eq!(hash_text("secret").len(), 6);
        assert_eq!(hash_text(""), "");
        assert_eq!(hash_text("secret"), hash_text("secret"));
        assert_eq!(hash_text(&"x".repeat(80)).len(), 64);
    }

    #[test]
    fn test_context_is_deterministic_per_salt() {
        let base = secret_string("organisation-secret".to_string());
        let a = EncryptionContext::new(&base, "salt-1");
        let b = EncryptionContext::new(&base, "salt-1");
        let c = EncryptionContext::new(&base, "salt-2");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(a.key().len(), 64);
    }

    #[test]
    fn test_context_debug_is_redacted() {
        let base = secret_string("organisation-secret".to_string());
        let context = EncryptionContext::new(&base, "salt-1");
        let debug = format!("{context:?}");
        assert!(!debug.contains(context.key()));
        assert!(!debug.contains("organisation-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_fingerprint_identifies_context() {
        let base = secret_string("organisation-secret".to_string());
        let a = EncryptionContext::new(&base, "salt-1");
        let c = EncryptionContext::new(&base, "salt-2");
        assert_eq!(a.fingerprint(), EncryptionContext::new(&base, "salt-1").fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_ephemeral_contexts_differ() {
        assert_ne!(
            EncryptionContext::ephemeral().key(),
            EncryptionContext::ephemeral().key()
        );
    }
}
