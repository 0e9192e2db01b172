//! Three-way reconciliation of documents, fields, and keyed collections.
//!
//! Every merge works on a snapshot triple of the same shape:
//!
//! - `base` — the last reconciled state
//! - `local` — the working copy, possibly carrying unsaved edits
//! - `remote` — the snapshot just pushed from the store
//!
//! The rules are last-writer-wins at "changed since base" granularity:
//!
//! 1. An attribute the editor changed since `base` keeps its local value,
//!    whatever the remote says.
//! 2. An untouched attribute adopts the remote value when one exists.
//! 3. A locally edited item survives even a remote deletion; an unedited
//!    item vanishes when the server removed it.
//! 4. Items the server added appear; items the editor deleted locally are
//!    never resurrected by the remote.
//!
//! All functions here are pure and total. Absent inputs are treated as
//! empty, never as errors.

use crate::{
    document::{item_id, Attrs, Document, FieldValue},
    schema::{DocumentSchema, FieldKind},
    ItemId,
};
use std::collections::BTreeSet;

/// Merge one object-valued field attribute by attribute.
///
/// For each attribute in the union of the three inputs: a locally changed
/// attribute (differing from `base`, including a local removal) wins;
/// otherwise the remote value is adopted when the attribute is defined
/// there; otherwise the base value is kept. Comparison is strict equality
/// on scalar values.
///
/// If `local` has no edits relative to `base`, the result equals `remote`
/// restricted to the attributes `remote` defines plus any base-only
/// leftovers; if it has edits, those edits are preserved verbatim.
pub fn merge_attrs(base: &Attrs, local: &Attrs, remote: &Attrs) -> Attrs {
    let names: BTreeSet<&String> = base
        .keys()
        .chain(local.keys())
        .chain(remote.keys())
        .collect();

    let mut merged = Attrs::new();
    for name in names {
        let value = if local.get(name) != base.get(name) {
            local.get(name)
        } else if remote.contains_key(name) {
            remote.get(name)
        } else {
            base.get(name)
        };
        if let Some(value) = value {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Merge one keyed collection, identifying items by `id_attr`.
///
/// See [`merge_collection_by`] for the semantics.
pub fn merge_collection(
    base: &[Attrs],
    local: &[Attrs],
    remote: &[Attrs],
    id_attr: &str,
) -> Vec<Attrs> {
    merge_collection_by(base, local, remote, |item| item_id(item, id_attr))
}

/// Merge one keyed collection with a caller-supplied identifier function.
///
/// Survivor selection: a local item survives when it was edited locally or
/// when the server did not remove it; it is dropped only when it is
/// unedited *and* remotely removed. Surviving items are merged attribute
/// by attribute against their base and remote counterparts. Remote items
/// that are genuinely new — absent from base and from the working copy —
/// are appended in remote order; ids the editor deleted locally are never
/// resurrected.
///
/// Ids must be unique within each input; when they are not, the first
/// match found wins. Items without a usable id are kept verbatim. Ordering
/// is survivors in local order followed by new remote items, stable enough
/// for a list rendering but not semantically meaningful.
pub fn merge_collection_by<F>(
    base: &[Attrs],
    local: &[Attrs],
    remote: &[Attrs],
    id_of: F,
) -> Vec<Attrs>
where
    F: Fn(&Attrs) -> Option<ItemId>,
{
    let ids = |items: &[Attrs]| -> BTreeSet<ItemId> { items.iter().filter_map(&id_of).collect() };
    let find = |items: &[Attrs], id: &str| -> Option<Attrs> {
        items
            .iter()
            .find(|i| id_of(i).as_deref() == Some(id))
            .cloned()
    };

    let base_ids = ids(base);
    let local_ids = ids(local);
    let remote_ids = ids(remote);

    // Present at baseline, missing from the push: a server-side deletion.
    let remotely_removed: BTreeSet<&ItemId> = base_ids.difference(&remote_ids).collect();

    let mut merged = Vec::with_capacity(local.len());
    for item in local {
        let Some(id) = id_of(item) else {
            merged.push(item.clone());
            continue;
        };

        // Edited means: a base counterpart exists and its attributes
        // differ. An item created locally (no base counterpart) is not
        // "edited", but it is not remotely removed either, so it survives
        // through the second arm of the predicate.
        let base_item = find(base, &id);
        let locally_edited = base_item.as_ref().is_some_and(|b| b != item);
        let base_item = base_item.unwrap_or_default();

        if !locally_edited && remotely_removed.contains(&id) {
            continue;
        }

        let remote_item = find(remote, &id).unwrap_or_default();
        merged.push(merge_attrs(&base_item, item, &remote_item));
    }

    // Genuinely new server-side additions. An id known at baseline but
    // absent from the working copy was deleted locally; it stays deleted.
    for item in remote {
        let Some(id) = id_of(item) else { continue };
        if local_ids.contains(&id) || base_ids.contains(&id) {
            continue;
        }
        merged.push(item.clone());
    }

    merged
}

/// Merge a whole document field by field, dispatching on the schema.
///
/// Scalar and timestamp fields follow the attribute rule at document
/// level, object fields go through [`merge_attrs`], collections through
/// [`merge_collection`]. The output carries the working copy's identity
/// (falling back to the remote's) and exactly the schema's fields.
pub fn merge_document(
    schema: &DocumentSchema,
    base: &Document,
    local: &Document,
    remote: &Document,
) -> Document {
    let mut merged = Document::new();
    merged.id = local.id.clone().or_else(|| remote.id.clone());

    for field in &schema.fields {
        let name = field.name.as_str();
        let value = match &field.kind {
            FieldKind::Scalar | FieldKind::Timestamp => {
                let base_v = base.field(name).and_then(FieldValue::as_scalar);
                let local_v = local.field(name).and_then(FieldValue::as_scalar);
                let remote_v = remote.field(name).and_then(FieldValue::as_scalar);

                let picked = if local_v != base_v {
                    local_v
                } else if remote_v.is_some() {
                    remote_v
                } else {
                    base_v
                };
                picked.cloned().map(FieldValue::Scalar)
            }
            FieldKind::Object => {
                let empty = Attrs::new();
                let attrs = |doc: &Document| -> Attrs {
                    doc.field(name)
                        .and_then(FieldValue::as_object)
                        .unwrap_or(&empty)
                        .clone()
                };
                Some(FieldValue::Object(merge_attrs(
                    &attrs(base),
                    &attrs(local),
                    &attrs(remote),
                )))
            }
            FieldKind::Collection { id_attr } => {
                let items = |doc: &Document| -> Vec<Attrs> {
                    doc.field(name)
                        .and_then(FieldValue::as_collection)
                        .unwrap_or_default()
                        .to_vec()
                };
                Some(FieldValue::Collection(merge_collection(
                    &items(base),
                    &items(local),
                    &items(remote),
                    id_attr,
                )))
            }
        };

        if let Some(value) = value {
            merged.set_field(field.name.clone(), value);
        }
    }

    merged
}
