//! # Circular Engine
//!
//! The reconciliation core for Circular, a collaboratively edited content
//! bulletin. Several editors change the same structured document while the
//! store continuously pushes the authoritative state back to every open
//! session; this crate merges an editor's unsaved local changes with each
//! incoming snapshot without discarding either side's work.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of stores, channels, or clocks
//! - **Deterministic**: same inputs always produce same outputs
//! - **Total**: the merge functions never fail; absent inputs are treated
//!   as empty
//!
//! ## Core Concepts
//!
//! ### Documents
//!
//! A [`Document`] maps field names to [`FieldValue`]s: plain scalars,
//! object-valued fields (attribute maps), or collections of keyed items.
//! Each item in a collection carries a stable identifier attribute that is
//! assigned at creation and never recomputed from content.
//!
//! ### Schemas
//!
//! A [`DocumentSchema`] is the shape contract between the engine and its
//! collaborators: which fields exist, their kind, and the id attribute of
//! each collection. It builds the default shape for brand-new documents and
//! validates incoming snapshots before any merge is attempted.
//!
//! ### Three-way merge
//!
//! Every reconciliation cycle works on a snapshot triple:
//!
//! - **base** — the last reconciled state
//! - **local** — the working copy, possibly carrying unsaved edits
//! - **remote** — the snapshot just pushed from the store
//!
//! [`merge_attrs`] merges one object-valued field attribute by attribute:
//! locally changed attributes always win, untouched attributes adopt the
//! remote value. [`merge_collection`] merges one keyed collection: locally
//! edited items survive even a remote deletion, unedited items vanish when
//! the server removed them, and genuinely new remote items are appended.
//! [`merge_document`] dispatches both rules field by field across a whole
//! document.
//!
//! ## Quick Start
//!
//! ```rust
//! use circular_engine::{merge_collection, Attrs};
//! use serde_json::json;
//!
//! fn item(id: &str, name: &str) -> Attrs {
//!     [
//!         ("id".to_string(), json!(id)),
//!         ("name".to_string(), json!(name)),
//!     ]
//!     .into_iter()
//!     .collect()
//! }
//!
//! let base = vec![item("1", "A")];
//! let local = vec![item("1", "A-edited")]; // edited since base
//! let remote: Vec<Attrs> = vec![]; // server deleted id 1
//!
//! // The local edit outlives the remote deletion.
//! let merged = merge_collection(&base, &local, &remote, "id");
//! assert_eq!(merged, vec![item("1", "A-edited")]);
//! ```

pub mod document;
pub mod error;
pub mod merge;
pub mod schema;

// Re-export main types at crate root
pub use document::{item_id, Attrs, Document, FieldValue};
pub use error::Error;
pub use merge::{merge_attrs, merge_collection, merge_collection_by, merge_document};
pub use schema::{DocumentSchema, FieldKind, FieldSpec};

/// Type aliases for clarity
pub type DocumentId = String;
pub type FieldName = String;
pub type AttrName = String;
pub type CollectionName = String;
pub type ItemId = String;
/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;
