//! Document types: fields, items, and the edit operations on them.

use crate::{error::Result, AttrName, DocumentId, Error, FieldName, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An attribute map: the value of an object-valued field, or a single item
/// of a keyed collection. BTreeMap for deterministic serialization order.
pub type Attrs = BTreeMap<AttrName, Value>;

/// Extract an item's stable identifier, normalized to a string.
///
/// Ids are assigned at creation and never recomputed from content. String
/// and integer ids are both accepted on the wire; anything else means the
/// item has no usable identifier.
pub fn item_id(attrs: &Attrs, id_attr: &str) -> Option<ItemId> {
    match attrs.get(id_attr)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The value of one document field.
///
/// Untagged: on the wire a document is plain JSON, so the shape of the value
/// decides the variant — arrays of objects are collections, objects are
/// object-valued fields, everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// An ordered sequence of keyed items.
    Collection(Vec<Attrs>),
    /// A sub-record of attribute name to scalar value.
    Object(Attrs),
    /// A plain scalar value.
    Scalar(Value),
}

impl FieldValue {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Collection(_) => "collection",
            FieldValue::Object(_) => "object",
            FieldValue::Scalar(_) => "scalar",
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Attrs> {
        match self {
            FieldValue::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Attrs]> {
        match self {
            FieldValue::Collection(items) => Some(items),
            _ => None,
        }
    }
}

/// A structured document: the unit of collaborative editing.
///
/// Identity is the server-assigned reference; `None` until the document has
/// been persisted for the first time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Server-assigned identity, absent for an unsaved document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    /// Field values by name.
    pub fields: BTreeMap<FieldName, FieldValue>,
}

impl Document {
    /// Create an empty, unsaved document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment, mostly for tests and fixtures.
    pub fn with_field(mut self, name: impl Into<FieldName>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Replace a field value wholesale.
    pub fn set_field(&mut self, name: impl Into<FieldName>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Set a scalar field.
    pub fn set_scalar(&mut self, name: impl Into<FieldName>, value: Value) {
        self.fields.insert(name.into(), FieldValue::Scalar(value));
    }

    /// Get the items of a collection field.
    pub fn collection(&self, name: &str) -> Result<&[Attrs]> {
        match self.fields.get(name) {
            Some(FieldValue::Collection(items)) => Ok(items),
            Some(other) => Err(Error::KindMismatch {
                field: name.to_string(),
                expected: "collection",
                got: other.kind_name(),
            }),
            None => Err(Error::CollectionNotFound(name.to_string())),
        }
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Vec<Attrs>> {
        match self.fields.get_mut(name) {
            Some(FieldValue::Collection(items)) => Ok(items),
            Some(other) => Err(Error::KindMismatch {
                field: name.to_string(),
                expected: "collection",
                got: other.kind_name(),
            }),
            None => Err(Error::CollectionNotFound(name.to_string())),
        }
    }

    /// Replace-or-insert an item in a collection, keyed by its id attribute.
    ///
    /// A replaced item keeps its position; a new item is appended.
    pub fn set_item(&mut self, collection: &str, item: Attrs, id_attr: &str) -> Result<()> {
        let id = item_id(&item, id_attr).ok_or_else(|| Error::MissingIdAttribute {
            collection: collection.to_string(),
        })?;

        let items = self.collection_mut(collection)?;
        match items
            .iter_mut()
            .find(|i| item_id(i, id_attr).as_deref() == Some(id.as_str()))
        {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        Ok(())
    }

    /// Remove an item from a collection by id. Removing an absent id is a
    /// no-op.
    pub fn delete_item(&mut self, collection: &str, item_id_value: &str, id_attr: &str) -> Result<()> {
        let items = self.collection_mut(collection)?;
        items.retain(|i| item_id(i, id_attr).as_deref() != Some(item_id_value));
        Ok(())
    }
}
