//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for record type discriminators and
//! purpose slugs, plus [`RecordRef`], the polymorphic reference used wherever a
//! legal reason, ledger row or relation points at an arbitrary record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a purpose slug
pub const MAX_PURPOSE_SLUG_LEN: usize = 100;

/// Record type discriminator newtype wrapper
///
/// Identifies the kind of a stored record (`customer`, `payment`, ...). Used as the
/// key of the anonymizer registry and as the type half of a [`RecordRef`].
///
/// # Examples
///
/// ```
/// use custodian::domain::ids::RecordType;
/// use std::str::FromStr;
///
/// let record_type = RecordType::from_str("customer").unwrap();
/// assert_eq!(record_type.as_str(), "customer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordType(String);

impl RecordType {
    /// Creates a new RecordType from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(RecordType)` if the name is valid, `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Record type cannot be empty".to_string());
        }
        if name.contains(':') {
            return Err(format!("Record type '{name}' cannot contain ':'"));
        }
        Ok(Self(name))
    }

    /// Returns the record type as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RecordType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Polymorphic record reference (type discriminator + opaque id)
///
/// Resolved through the record store rather than through any type hierarchy,
/// so unrelated record types can be referenced uniformly.
///
/// # Examples
///
/// ```
/// use custodian::domain::ids::{RecordRef, RecordType};
///
/// let customer = RecordRef::new(RecordType::new("customer").unwrap(), "42");
/// assert_eq!(customer.to_string(), "customer:42");
/// assert_eq!("customer:42".parse::<RecordRef>().unwrap(), customer);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    /// Type discriminator
    pub record_type: RecordType,

    /// Opaque identifier, unique within the record type
    pub id: String,
}

impl RecordRef {
    /// Creates a new record reference
    pub fn new(record_type: RecordType, id: impl Into<String>) -> Self {
        Self {
            record_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.id)
    }
}

impl FromStr for RecordRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (record_type, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid record reference '{s}'. Expected format: type:id"))?;
        if id.is_empty() {
            return Err(format!("Record reference '{s}' has an empty id"));
        }
        Ok(Self::new(RecordType::new(record_type)?, id))
    }
}

/// Purpose slug newtype wrapper
///
/// Key into the purpose registry. Slugs are at most 100 characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PurposeSlug(String);

impl PurposeSlug {
    /// Creates a new PurposeSlug from a string
    pub fn new(slug: impl Into<String>) -> Result<Self, String> {
        let slug = slug.into();
        if slug.trim().is_empty() {
            return Err("Purpose slug cannot be empty".to_string());
        }
        if slug.len() > MAX_PURPOSE_SLUG_LEN {
            return Err(format!(
                "Purpose slug '{slug}' exceeds {MAX_PURPOSE_SLUG_LEN} characters"
            ));
        }
        Ok(Self(slug))
    }

    /// Returns the slug as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PurposeSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PurposeSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PurposeSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_empty_fails() {
        assert!(RecordType::new("").is_err());
        assert!(RecordType::new("   ").is_err());
        assert!(RecordType::new("a:b").is_err());
    }

    #[test]
    fn test_record_ref_parse() {
        let r: RecordRef = "payment:2f1c".parse().unwrap();
        assert_eq!(r.record_type.as_str(), "payment");
        assert_eq!(r.id, "2f1c");
    }

    #[test]
    fn test_record_ref_parse_keeps_colons_in_id() {
        let r: RecordRef = "note:a:b".parse().unwrap();
        assert_eq!(r.id, "a:b");
    }

    #[test]
    fn test_record_ref_invalid() {
        assert!("customer".parse::<RecordRef>().is_err());
        assert!("customer:".parse::<RecordRef>().is_err());
        assert!(":42".parse::<RecordRef>().is_err());
    }

    #[test]
    fn test_purpose_slug_length() {
        assert!(PurposeSlug::new("FNL").is_ok());
        assert!(PurposeSlug::new("x".repeat(MAX_PURPOSE_SLUG_LEN)).is_ok());
        assert!(PurposeSlug::new("x".repeat(MAX_PURPOSE_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn test_record_ref_serialization() {
        let r = RecordRef::new(RecordType::new("customer").unwrap(), "1");
        let json = serde_json::to_string(&r).unwrap();
        let back: RecordRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
