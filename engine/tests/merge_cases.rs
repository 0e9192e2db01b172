//! Reconciliation scenarios for circular-engine.
//!
//! These tests exercise the three-way merge rules end to end on realistic
//! bulletin documents: concurrent edits, remote deletions, server-side
//! additions, and the boundaries between them.

use circular_engine::{
    item_id, merge_attrs, merge_collection, merge_document, Attrs, Document, DocumentSchema,
    FieldValue,
};
use serde_json::json;

fn bulletin_schema() -> DocumentSchema {
    DocumentSchema::new("bulletin")
        .with_timestamp("date")
        .with_object("podium")
        .with_collection("new", "id")
        .with_collection("sale", "id")
        .with_collection("twitchPrime", "id")
}

fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attrs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn sale_item(id: &str, name: &str, amount: i64) -> Attrs {
    attrs(&[
        ("id", json!(id)),
        ("name", json!(name)),
        ("amount", json!(amount)),
    ])
}

// ============================================================================
// Scalar field merge
// ============================================================================

#[test]
fn untouched_field_equals_remote() {
    let base = attrs(&[("name", json!("X")), ("amount", json!(5))]);
    let remote = attrs(&[("name", json!("Y")), ("amount", json!(9))]);

    assert_eq!(merge_attrs(&base, &base, &remote), remote);
}

#[test]
fn edited_attribute_beats_concurrent_remote_change() {
    // Base {name:"X", amount:5}, Working {name:"X", amount:7},
    // Remote {name:"Y", amount:5} => {name:"Y", amount:7}.
    let base = attrs(&[("name", json!("X")), ("amount", json!(5))]);
    let local = attrs(&[("name", json!("X")), ("amount", json!(7))]);
    let remote = attrs(&[("name", json!("Y")), ("amount", json!(5))]);

    let merged = merge_attrs(&base, &local, &remote);
    assert_eq!(merged.get("name"), Some(&json!("Y")));
    assert_eq!(merged.get("amount"), Some(&json!(7)));
}

#[test]
fn remote_change_to_actively_edited_attribute_is_dropped() {
    let base = attrs(&[("name", json!("X"))]);
    let local = attrs(&[("name", json!("X-mine"))]);
    let remote = attrs(&[("name", json!("X-theirs"))]);

    let merged = merge_attrs(&base, &local, &remote);
    assert_eq!(merged.get("name"), Some(&json!("X-mine")));
}

#[test]
fn absent_inputs_are_empty_mappings() {
    let empty = Attrs::new();
    let remote = attrs(&[("name", json!("Y"))]);

    assert_eq!(merge_attrs(&empty, &empty, &remote), remote);
    assert!(merge_attrs(&empty, &empty, &empty).is_empty());
}

// ============================================================================
// Collection merge
// ============================================================================

#[test]
fn edited_item_survives_remote_deletion() {
    // Base [{id:1,name:"A"}], Working [{id:1,name:"A-edited"}], Remote []
    // => [{id:1,name:"A-edited"}].
    let base = vec![attrs(&[("id", json!("1")), ("name", json!("A"))])];
    let local = vec![attrs(&[("id", json!("1")), ("name", json!("A-edited"))])];
    let remote: Vec<Attrs> = vec![];

    let merged = merge_collection(&base, &local, &remote, "id");
    assert_eq!(merged, local);
}

#[test]
fn unedited_item_is_pruned_on_remote_deletion() {
    // Base [{id:1,name:"A"}], Working unedited, Remote [] => [].
    let base = vec![attrs(&[("id", json!("1")), ("name", json!("A"))])];
    let local = base.clone();
    let remote: Vec<Attrs> = vec![];

    assert!(merge_collection(&base, &local, &remote, "id").is_empty());
}

#[test]
fn brand_new_remote_item_appears() {
    // Base [], Working [], Remote [{id:2,name:"B"}] => [{id:2,name:"B"}].
    let remote = vec![attrs(&[("id", json!("2")), ("name", json!("B"))])];

    let merged = merge_collection(&[], &[], &remote, "id");
    assert_eq!(merged, remote);
}

#[test]
fn locally_deleted_item_stays_deleted() {
    let base = vec![sale_item("1", "A", 10)];
    let local: Vec<Attrs> = vec![];
    let remote = vec![sale_item("1", "A", 10)];

    assert!(merge_collection(&base, &local, &remote, "id").is_empty());
}

#[test]
fn concurrent_item_edits_merge_attribute_wise() {
    let base = vec![sale_item("1", "A", 10)];
    let local = vec![sale_item("1", "A", 25)]; // discount bumped locally
    let remote = vec![sale_item("1", "A+", 10)]; // renamed remotely

    let merged = merge_collection(&base, &local, &remote, "id");
    assert_eq!(merged, vec![sale_item("1", "A+", 25)]);
}

#[test]
fn mixed_collection_cycle() {
    // One unedited survivor, one local edit over a remote delete, one local
    // addition, one remote addition, one remote prune.
    let base = vec![
        sale_item("1", "A", 10),
        sale_item("2", "B", 10),
        sale_item("3", "C", 10),
    ];
    let local = vec![
        sale_item("1", "A", 10),       // untouched
        sale_item("2", "B-edited", 10), // edited, remotely deleted
        sale_item("3", "C", 10),       // untouched, remotely deleted
        sale_item("9", "local-new", 5), // created locally
    ];
    let remote = vec![
        sale_item("1", "A", 50),       // discounted remotely
        sale_item("4", "remote-new", 15),
    ];

    let merged = merge_collection(&base, &local, &remote, "id");
    let ids: Vec<_> = merged.iter().map(|i| item_id(i, "id").unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "9", "4"]);

    assert_eq!(merged[0], sale_item("1", "A", 50));
    assert_eq!(merged[1], sale_item("2", "B-edited", 10));
    assert_eq!(merged[2], sale_item("9", "local-new", 5));
    assert_eq!(merged[3], sale_item("4", "remote-new", 15));
}

#[test]
fn duplicate_ids_resolve_to_first_match() {
    let base = vec![
        attrs(&[("id", json!("1")), ("name", json!("first"))]),
        attrs(&[("id", json!("1")), ("name", json!("second"))]),
    ];
    let local = vec![attrs(&[("id", json!("1")), ("name", json!("first"))])];
    let remote = base.clone();

    // Unspecified input, but lookups must settle on the first match rather
    // than panic or pick nondeterministically.
    let merged = merge_collection(&base, &local, &remote, "id");
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].get("name"), Some(&json!("first")));
}

// ============================================================================
// Whole-document merge
// ============================================================================

#[test]
fn full_bulletin_reconciliation() {
    let schema = bulletin_schema();

    let mut base = schema.empty_document(1_700_000_000_000);
    base.set_field(
        "podium",
        FieldValue::Object(attrs(&[("name", json!("Comet")), ("url", json!("u"))])),
    );
    base.set_item("sale", sale_item("1", "A", 10), "id").unwrap();
    base.set_item("sale", sale_item("2", "B", 10), "id").unwrap();
    base.id = Some("doc-1".into());

    // This session: bump item 1's discount, delete item 2.
    let mut local = base.clone();
    local.set_item("sale", sale_item("1", "A", 30), "id").unwrap();
    local.delete_item("sale", "2", "id").unwrap();

    // Another session: change the podium, add a featured item, re-date.
    let mut remote = base.clone();
    remote.set_scalar("date", json!(1_700_000_100_000i64));
    remote.set_field(
        "podium",
        FieldValue::Object(attrs(&[("name", json!("Tigon")), ("url", json!("u"))])),
    );
    remote
        .set_item("new", attrs(&[("id", json!("7")), ("name", json!("Fresh"))]), "id")
        .unwrap();

    let merged = merge_document(&schema, &base, &local, &remote);

    assert_eq!(merged.id, Some("doc-1".to_string()));
    assert_eq!(
        merged.field("date").unwrap().as_scalar(),
        Some(&json!(1_700_000_100_000i64))
    );
    assert_eq!(
        merged.field("podium").unwrap().as_object().unwrap().get("name"),
        Some(&json!("Tigon"))
    );

    let sale = merged.field("sale").unwrap().as_collection().unwrap();
    assert_eq!(sale, &[sale_item("1", "A", 30)]); // edit kept, deletion kept

    let added = merged.field("new").unwrap().as_collection().unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].get("name"), Some(&json!("Fresh")));

    // The merged document still matches the shape contract.
    assert!(schema.validate(&merged).is_ok());
}

#[test]
fn repeated_merge_against_same_remote_is_stable() {
    let schema = bulletin_schema();
    let mut base = schema.empty_document(1000);
    base.set_item("sale", sale_item("1", "A", 10), "id").unwrap();

    let mut local = base.clone();
    local.set_item("sale", sale_item("1", "A", 20), "id").unwrap();

    let mut remote = base.clone();
    remote.set_item("sale", sale_item("2", "B", 10), "id").unwrap();

    let once = merge_document(&schema, &base, &local, &remote);
    let twice = merge_document(&schema, &base, &once, &remote);
    assert_eq!(once, twice);
}

#[test]
fn empty_working_document_adopts_full_remote() {
    let schema = bulletin_schema();
    let base = schema.empty_document(1000);
    let local = base.clone();

    let mut remote = schema.empty_document(2000);
    remote.id = Some("doc-9".into());
    remote.set_item("sale", sale_item("1", "A", 10), "id").unwrap();

    let merged = merge_document(&schema, &base, &local, &remote);
    assert_eq!(merged.id, Some("doc-9".to_string()));
    assert_eq!(merged.fields, remote.fields);
}

#[test]
fn wire_roundtrip_preserves_merge_inputs() {
    let schema = bulletin_schema();
    let mut doc = schema.empty_document(1000);
    doc.set_item("sale", sale_item("1", "A", 10), "id").unwrap();

    let json = serde_json::to_string(&doc).unwrap();
    let parsed: Document = serde_json::from_str(&json).unwrap();

    assert_eq!(doc, parsed);
    assert!(schema.validate(&parsed).is_ok());
}
