//! Record domain model
//!
//! A [`Record`] is one row of application data as seen through the record store:
//! a polymorphic reference plus a map of field values.

use super::ids::{RecordRef, RecordType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored application record holding (possibly) personal data
///
/// # Examples
///
/// ```
/// use custodian::domain::record::Record;
/// use custodian::domain::ids::{RecordRef, RecordType};
/// use serde_json::json;
///
/// let customer = Record::new(RecordRef::new(RecordType::new("customer").unwrap(), "1"))
///     .with_field("first_name", json!("Ada"))
///     .with_field("last_name", json!("Lovelace"));
///
/// assert_eq!(customer.get("first_name"), Some(&json!("Ada")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Reference identifying this record
    pub reference: RecordRef,

    /// Field values
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record
    pub fn new(reference: RecordRef) -> Self {
        Self {
            reference,
            fields: Map::new(),
        }
    }

    /// Sets a field value, builder style
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Record type of this record
    pub fn record_type(&self) -> &RecordType {
        &self.reference.record_type
    }

    /// Returns a field value, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field value, treating a missing field as `null`
    pub fn value_or_null(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Returns a field rendered as a reference id
    ///
    /// Foreign keys may be stored as strings or numbers; both map to the same id.
    pub fn get_id(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
