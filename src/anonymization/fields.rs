//! Field matrix grammar and resolver
//!
//! A [`FieldMatrix`] is the literal, caller-authored description of which fields
//! are personal data: the wildcard `"__ALL__"`, a single field name, or a list
//! mixing field names and `["relation", nested-matrix]` pairs. Resolving it
//! against a record type yields a [`FieldSpec`] tree that separates local fields
//! from relations to follow.
//!
//! ```
//! use custodian::anonymization::fields::FieldMatrix;
//!
//! let matrix: FieldMatrix = serde_json::from_str(
//!     r#"["first_name", ["accounts", ["number", "owner", ["payments", ["value", "date"]]]]]"#,
//! )
//! .unwrap();
//! assert!(!matrix.is_all());
//! ```
//!
//! Wildcards stay symbolic in the resolved tree and are expanded against the
//! anonymizer's declared field list only when the tree is walked.

use crate::anonymization::anonymizer::ModelAnonymizer;
use crate::anonymization::registry::AnonymizerRegistry;
use crate::domain::errors::CustodianError;
use crate::domain::ids::RecordType;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wildcard marker meaning "every declared field"
pub const ALL_FIELDS: &str = "__ALL__";

/// Literal field matrix as written in configuration or by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMatrix {
    /// `"__ALL__"` or a single field/relation name
    Name(String),
    /// Sequence of entries
    List(Vec<FieldEntry>),
}

/// One entry of a [`FieldMatrix`] list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    /// Field name, relation name (meaning the whole relation) or `"__ALL__"`
    Name(String),
    /// `["relation", nested-matrix]`
    Relation(String, FieldMatrix),
}

impl FieldMatrix {
    /// The wildcard matrix
    pub fn all() -> Self {
        FieldMatrix::Name(ALL_FIELDS.to_string())
    }

    /// Matrix naming local fields only
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldMatrix::List(names.into_iter().map(|n| FieldEntry::Name(n.into())).collect())
    }

    /// Appends a `[relation, nested]` entry
    pub fn with_relation(self, relation: impl Into<String>, nested: FieldMatrix) -> Self {
        let mut entries = match self {
            FieldMatrix::Name(name) => vec![FieldEntry::Name(name)],
            FieldMatrix::List(entries) => entries,
        };
        entries.push(FieldEntry::Relation(relation.into(), nested));
        FieldMatrix::List(entries)
    }

    /// Whether this is exactly the wildcard
    pub fn is_all(&self) -> bool {
        matches!(self, FieldMatrix::Name(name) if name == ALL_FIELDS)
    }
}

impl From<&str> for FieldMatrix {
    fn from(name: &str) -> Self {
        FieldMatrix::Name(name.to_string())
    }
}

/// Local fields of one [`FieldSpec`] node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalFields {
    /// Wildcard, expanded against the anonymizer's declared fields
    All,
    /// Explicitly named fields
    Named(BTreeSet<String>),
}

impl LocalFields {
    fn empty() -> Self {
        LocalFields::Named(BTreeSet::new())
    }

    fn is_empty(&self) -> bool {
        matches!(self, LocalFields::Named(names) if names.is_empty())
    }

    fn insert(&mut self, name: String) {
        if let LocalFields::Named(names) = self {
            names.insert(name);
        }
    }

    fn union(&mut self, other: LocalFields) {
        match other {
            LocalFields::All => *self = LocalFields::All,
            LocalFields::Named(names) => {
                if let LocalFields::Named(own) = self {
                    own.extend(names);
                }
            }
        }
    }
}

/// Resolved field specification tree
///
/// Immutable once built; a relation name appears at most once per node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Record type this node is bound to
    pub record_type: RecordType,

    /// Fields of the bound record
    pub local: LocalFields,

    /// Relations to follow, with the spec for the related records
    pub related: BTreeMap<String, FieldSpec>,
}

impl FieldSpec {
    fn empty(record_type: RecordType) -> Self {
        Self {
            record_type,
            local: LocalFields::empty(),
            related: BTreeMap::new(),
        }
    }

    /// Wildcard spec for a record type, without relations
    pub fn all(record_type: RecordType) -> Self {
        Self {
            record_type,
            local: LocalFields::All,
            related: BTreeMap::new(),
        }
    }

    /// Resolves a literal matrix against `record_type`
    ///
    /// A bare relation name resolves to that relation with the wildcard. Duplicate
    /// relation entries are merged.
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unregistered record types and
    /// for names that are neither a declared field nor a declared relation.
    pub fn resolve(
        matrix: &FieldMatrix,
        record_type: &RecordType,
        registry: &AnonymizerRegistry,
    ) -> Result<Self> {
        let anonymizer = registry.get(record_type)?;
        let mut spec = Self::empty(record_type.clone());

        match matrix {
            FieldMatrix::Name(name) => spec.add_name(name, anonymizer.as_ref(), registry)?,
            FieldMatrix::List(entries) => {
                for entry in entries {
                    match entry {
                        FieldEntry::Name(name) => spec.add_name(name, anonymizer.as_ref(), registry)?,
                        FieldEntry::Relation(name, nested) => {
                            spec.add_relation(name, nested, anonymizer.as_ref(), registry)?
                        }
                    }
                }
            }
        }

        Ok(spec)
    }

    fn add_name(
        &mut self,
        name: &str,
        anonymizer: &dyn ModelAnonymizer,
        registry: &AnonymizerRegistry,
    ) -> Result<()> {
        if name == ALL_FIELDS {
            self.local = LocalFields::All;
        } else if anonymizer.fields().contains_key(name) {
            self.local.insert(name.to_string());
        } else if anonymizer.relation(name).is_some() {
            self.add_relation(name, &FieldMatrix::all(), anonymizer, registry)?;
        } else {
            return Err(CustodianError::Configuration(format!(
                "'{name}' is neither an anonymizable field nor a relation of '{}'",
                self.record_type
            )));
        }
        Ok(())
    }

    fn add_relation(
        &mut self,
        name: &str,
        nested: &FieldMatrix,
        anonymizer: &dyn ModelAnonymizer,
        registry: &AnonymizerRegistry,
    ) -> Result<()> {
        let relation = anonymizer.relation(name).ok_or_else(|| {
            CustodianError::Configuration(format!(
                "Unknown relation '{name}' on '{}'",
                self.record_type
            ))
        })?;
        let resolved = Self::resolve(nested, &relation.target, registry)?;
        match self.related.get_mut(name) {
            Some(existing) => existing.merge(resolved),
            None => {
                self.related.insert(name.to_string(), resolved);
            }
        }
        Ok(())
    }

    fn merge(&mut self, other: FieldSpec) {
        self.local.union(other.local);
        for (name, spec) in other.related {
            match self.related.get_mut(&name) {
                Some(existing) => existing.merge(spec),
                None => {
                    self.related.insert(name, spec);
                }
            }
        }
    }

    /// Local field names after wildcard expansion against `anonymizer`
    pub fn local_field_names(&self, anonymizer: &dyn ModelAnonymizer) -> BTreeSet<String> {
        match &self.local {
            LocalFields::All => anonymizer.fields().keys().cloned().collect(),
            LocalFields::Named(names) => names.clone(),
        }
    }

    /// Whether the spec selects nothing at all
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.related.values().all(FieldSpec::is_empty)
    }

    /// Removes everything also selected by `other`
    ///
    /// Local fields are compared after wildcard expansion; shared relations are
    /// subtracted recursively and dropped once empty. Specs bound to different
    /// record types are left unchanged. A node whose anonymizer deletes records
    /// is removed entirely as soon as `other` reaches it.
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] if a record type in either tree
    /// has no anonymizer.
    pub fn subtract(&self, other: &FieldSpec, registry: &AnonymizerRegistry) -> Result<FieldSpec> {
        if self.record_type != other.record_type {
            return Ok(self.clone());
        }

        let anonymizer = registry.get(&self.record_type)?;
        if anonymizer.deletes_records() {
            return Ok(FieldSpec::empty(self.record_type.clone()));
        }

        let local = match (&self.local, &other.local) {
            (_, LocalFields::All) => LocalFields::empty(),
            (own, LocalFields::Named(removed)) => {
                let own = match own {
                    LocalFields::All => anonymizer.fields().keys().cloned().collect(),
                    LocalFields::Named(names) => names.clone(),
                };
                LocalFields::Named(own.difference(removed).cloned().collect())
            }
        };

        let mut related = BTreeMap::new();
        for (name, spec) in &self.related {
            let remaining = match other.related.get(name) {
                Some(removed) => spec.subtract(removed, registry)?,
                None => spec.clone(),
            };
            if !remaining.is_empty() {
                related.insert(name.clone(), remaining);
            }
        }

        Ok(FieldSpec {
            record_type: self.record_type.clone(),
            local,
            related,
        })
    }

    /// Renders the tree back into a literal matrix
    pub fn to_matrix(&self) -> FieldMatrix {
        let mut entries = match &self.local {
            LocalFields::All => vec![FieldEntry::Name(ALL_FIELDS.to_string())],
            LocalFields::Named(names) => names.iter().cloned().map(FieldEntry::Name).collect(),
        };
        entries.extend(
            self.related
                .iter()
                .map(|(name, spec)| FieldEntry::Relation(name.clone(), spec.to_matrix())),
        );
        FieldMatrix::List(entries)
    }
}
