//! The store contract: persistence plus a push channel.
//!
//! The session core does not know what the store is — a document database,
//! an HTTP API, or the in-memory table used in tests. It only relies on
//! this trait: load and write whole documents, and subscribe to a stream of
//! full-document snapshots that fires on every change, including the echo
//! of this session's own writes.

use async_trait::async_trait;
use circular_engine::{Document, DocumentId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by a document store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No document exists under the given identity.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// A write or transport failure. Transient: the session logs it and the
    /// next coalesced write carries the buffered edits.
    #[error("write failed: {0}")]
    WriteFailure(String),
}

/// Persistence sink and push channel for documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document by identity. `Ok(None)` means it does not exist.
    async fn load(&self, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    /// Persist a new document and return its server-assigned identity.
    async fn create(&self, doc: &Document) -> Result<DocumentId, StoreError>;

    /// Overwrite an existing document.
    async fn update(&self, id: &DocumentId, doc: &Document) -> Result<(), StoreError>;

    /// Subscribe to snapshot pushes for a document. The current state is
    /// delivered as the first snapshot, then every subsequent change.
    fn subscribe(&self, id: &DocumentId) -> Subscription;
}

/// A cancellable handle on a push subscription.
///
/// Receives full-document snapshots until [`unsubscribe`](Self::unsubscribe)
/// is called or the handle is dropped; either way the store-side sender is
/// deregistered immediately.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Document>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription from a snapshot receiver and a cancel action.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Document>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Wait for the next pushed snapshot. `None` once the store side has
    /// closed the channel.
    pub async fn next(&mut self) -> Option<Document> {
        self.receiver.recv().await
    }

    /// Deregister from the push channel. No further snapshots arrive.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancel.is_none())
            .finish()
    }
}
