//! Relations between record types
//!
//! A [`Relation`] tells the engine how to find the records related to a given
//! record. Every enumeration re-queries the record store.

use crate::adapters::store::{FieldFilter, RecordStore};
use crate::domain::errors::CustodianError;
use crate::domain::ids::{RecordRef, RecordType};
use crate::domain::record::Record;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_type_field() -> String {
    "object_type".to_string()
}

fn default_id_field() -> String {
    "object_id".to_string()
}

/// How related records are located
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// This record holds the target's id in `field` (many-to-one)
    Forward {
        /// Foreign key field on this record
        field: String,
    },

    /// Targets hold this record's id in `field` (one-to-many)
    Reverse {
        /// Foreign key field on the target
        field: String,
    },

    /// This record points at an arbitrary record through a type and an id field;
    /// followed only when the type field names the relation target
    Generic {
        /// Type discriminator field on this record
        #[serde(default = "default_type_field")]
        type_field: String,
        /// Id field on this record
        #[serde(default = "default_id_field")]
        id_field: String,
    },

    /// Targets point back at this record through a type and an id field
    /// (e.g. notes attached to any kind of record)
    ReverseGeneric {
        /// Type discriminator field on the target
        #[serde(default = "default_type_field")]
        type_field: String,
        /// Id field on the target
        #[serde(default = "default_id_field")]
        id_field: String,
    },
}

/// Named relation from one record type to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation name used in field matrices
    pub name: String,

    /// Related record type
    pub target: RecordType,

    /// Lookup strategy
    pub kind: RelationKind,
}

impl Relation {
    /// Creates a relation
    pub fn new(name: impl Into<String>, target: RecordType, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            target,
            kind,
        }
    }

    /// Enumerates the records related to `record`
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::NotFound`] if a forward or generic reference
    /// points at a record that does not exist.
    pub async fn related_records(&self, store: &dyn RecordStore, record: &Record) -> Result<Vec<Record>> {
        match &self.kind {
            RelationKind::Forward { field } => match record.get_id(field) {
                Some(id) => self.resolve(store, RecordRef::new(self.target.clone(), id)).await,
                None => Ok(Vec::new()),
            },
            RelationKind::Reverse { field } => {
                store
                    .find_records(
                        &self.target,
                        &[FieldFilter::equals(field.clone(), record.reference.id.clone())],
                    )
                    .await
            }
            RelationKind::Generic {
                type_field,
                id_field,
            } => {
                let points_at_target =
                    record.get(type_field).and_then(Value::as_str) == Some(self.target.as_str());
                match record.get_id(id_field) {
                    Some(id) if points_at_target => {
                        self.resolve(store, RecordRef::new(self.target.clone(), id)).await
                    }
                    _ => Ok(Vec::new()),
                }
            }
            RelationKind::ReverseGeneric {
                type_field,
                id_field,
            } => {
                store
                    .find_records(
                        &self.target,
                        &[
                            FieldFilter::equals(
                                type_field.clone(),
                                record.record_type().as_str().to_string(),
                            ),
                            FieldFilter::equals(id_field.clone(), record.reference.id.clone()),
                        ],
                    )
                    .await
            }
        }
    }

    async fn resolve(&self, store: &dyn RecordStore, reference: RecordRef) -> Result<Vec<Record>> {
        match store.get_record(&reference).await? {
            Some(related) => Ok(vec![related]),
            None => Err(CustodianError::NotFound(format!(
                "record {reference} referenced through relation '{}' does not exist",
                self.name
            ))),
        }
    }
}
