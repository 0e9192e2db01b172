//! # Circular Session
//!
//! The stateful side of Circular's reconciliation engine: per-editor document
//! sessions that fold continuously pushed server snapshots into an in-progress
//! working copy, and flush coalesced edits back to the store.
//!
//! A [`Session`] is an actor. One spawned task exclusively owns the base and
//! working snapshots; user edits, remote pushes, and the flush timer are
//! multiplexed onto that task, so no two handlers ever observe the document
//! mid-merge. The cheap, cloneable [`SessionHandle`] is what a presentation
//! layer holds: it sends edits in and watches the working copy and session
//! status for re-rendering.
//!
//! The store itself stays behind the [`DocumentStore`] trait: load, create,
//! update, and a push subscription delivering the full document on every
//! change — including the echo of this session's own writes. The bundled
//! [`MemoryStore`] implements the contract in memory and is what the tests
//! run against.

pub mod error;
pub mod memory;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use error::SessionError;
pub use memory::MemoryStore;
pub use session::{Session, SessionHandle, SessionOptions, SessionStatus};
pub use store::{DocumentStore, StoreError, Subscription};
