//! Schema definition and snapshot validation.
//!
//! The document shape — field names, field kinds, and the id attribute of
//! each collection — is a configuration contract between the engine and its
//! collaborators, enumerated once per document type in use.

use crate::{
    document::{item_id, Document, FieldValue},
    error::Result,
    AttrName, CollectionName, Error, FieldName, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Field kinds supported in document schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// A plain scalar value.
    Scalar,
    /// A scalar carrying a timestamp, defaulted to "now" for new documents.
    Timestamp,
    /// A sub-record of attribute name to scalar value.
    Object,
    /// An ordered sequence of items keyed by the given id attribute.
    Collection { id_attr: AttrName },
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Object => "object",
            FieldKind::Collection { .. } => "collection",
        }
    }
}

/// Definition of one document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Field name
    pub name: FieldName,
    /// Field kind
    pub kind: FieldKind,
}

/// Shape contract for one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSchema {
    /// Document type name (e.g. "bulletin")
    pub name: String,
    /// Field definitions, in declaration order
    pub fields: Vec<FieldSpec>,
}

impl DocumentSchema {
    /// Create a schema with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a scalar field.
    pub fn with_scalar(mut self, name: impl Into<FieldName>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Scalar,
        });
        self
    }

    /// Add a timestamp field.
    pub fn with_timestamp(mut self, name: impl Into<FieldName>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Timestamp,
        });
        self
    }

    /// Add an object-valued field.
    pub fn with_object(mut self, name: impl Into<FieldName>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Object,
        });
        self
    }

    /// Add a keyed collection field.
    pub fn with_collection(
        mut self,
        name: impl Into<FieldName>,
        id_attr: impl Into<AttrName>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Collection {
                id_attr: id_attr.into(),
            },
        });
        self
    }

    /// Look up a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve the id attribute of a collection field.
    pub fn id_attr(&self, collection: &str) -> Result<&str> {
        match self.field(collection) {
            Some(FieldSpec {
                kind: FieldKind::Collection { id_attr },
                ..
            }) => Ok(id_attr),
            Some(other) => Err(Error::KindMismatch {
                field: collection.to_string(),
                expected: "collection",
                got: other.kind.name(),
            }),
            None => Err(Error::CollectionNotFound(collection.to_string())),
        }
    }

    /// Names of all collection fields, in declaration order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionName> {
        self.fields.iter().filter_map(|f| match f.kind {
            FieldKind::Collection { .. } => Some(&f.name),
            _ => None,
        })
    }

    /// The default shape for a brand-new, unsaved document: null scalars,
    /// empty objects, empty collections, timestamp fields set to `now_ms`.
    pub fn empty_document(&self, now_ms: Timestamp) -> Document {
        let mut doc = Document::new();
        for field in &self.fields {
            let value = match &field.kind {
                FieldKind::Scalar => FieldValue::Scalar(Value::Null),
                FieldKind::Timestamp => FieldValue::Scalar(json!(now_ms)),
                FieldKind::Object => FieldValue::Object(Default::default()),
                FieldKind::Collection { .. } => FieldValue::Collection(Vec::new()),
            };
            doc.set_field(field.name.clone(), value);
        }
        doc
    }

    /// Check a pushed snapshot against the expected shape.
    ///
    /// Every schema field must be present with a matching kind, no unknown
    /// fields may appear, and every collection item must carry its id
    /// attribute. Any violation is fatal for the receiving session; no
    /// partial merge is attempted.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        for field in &self.fields {
            let value = doc.field(&field.name).ok_or_else(|| {
                Error::MalformedSnapshot(format!("missing field '{}'", field.name))
            })?;

            match (&field.kind, value) {
                (FieldKind::Scalar | FieldKind::Timestamp, FieldValue::Scalar(_)) => {}
                (FieldKind::Object, FieldValue::Object(_)) => {}
                (FieldKind::Collection { id_attr }, FieldValue::Collection(items)) => {
                    for item in items {
                        if item_id(item, id_attr).is_none() {
                            return Err(Error::MalformedSnapshot(format!(
                                "item in collection '{}' has no usable '{}' attribute",
                                field.name, id_attr
                            )));
                        }
                    }
                }
                (kind, value) => {
                    return Err(Error::MalformedSnapshot(format!(
                        "field '{}' should be a {}, got a {}",
                        field.name,
                        kind.name(),
                        value.kind_name()
                    )));
                }
            }
        }

        if let Some(unknown) = doc.fields.keys().find(|name| self.field(name).is_none()) {
            return Err(Error::MalformedSnapshot(format!(
                "unknown field '{unknown}'"
            )));
        }

        Ok(())
    }
}
