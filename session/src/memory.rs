//! In-memory document store.
//!
//! Backs tests and single-process deployments. Documents live in a
//! concurrent map; every write is broadcast to the document's subscribers,
//! including the writer's own session, which sees its write echoed back as
//! a push.

use std::sync::Arc;

use circular_engine::{Document, DocumentId};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::store::{DocumentStore, StoreError, Subscription};

/// A registered snapshot listener.
#[derive(Debug)]
struct Subscriber {
    /// Unique identifier for this subscriber.
    id: String,
    /// Channel to push snapshots to this subscriber.
    sender: mpsc::UnboundedSender<Document>,
}

/// Thread-safe in-memory [`DocumentStore`].
///
/// Can be shared across sessions via `Arc`; all of them observe each
/// other's writes through their subscriptions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// All stored documents, keyed by document ID.
    documents: DashMap<DocumentId, Document>,
    /// Active subscribers, keyed by document ID.
    subscribers: Arc<DashMap<DocumentId, Vec<Subscriber>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            subscribers: Arc::new(DashMap::new()),
        }
    }

    /// Create an empty store wrapped in `Arc` for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert a document under a fixed identity without broadcasting.
    ///
    /// Test seam for preparing server state before any session attaches.
    pub fn seed(&self, id: impl Into<DocumentId>, mut doc: Document) {
        let id = id.into();
        doc.id = Some(id.clone());
        self.documents.insert(id, doc);
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of active subscribers for a document.
    pub fn subscriber_count(&self, id: &DocumentId) -> usize {
        self.subscribers.get(id).map_or(0, |subs| subs.len())
    }

    /// Push a snapshot to every subscriber of `id`, pruning closed channels.
    fn broadcast(&self, id: &DocumentId, doc: &Document) {
        if let Some(mut subs) = self.subscribers.get_mut(id) {
            subs.retain(|sub| sub.sender.send(doc.clone()).is_ok());

            tracing::debug!(
                document_id = %id,
                recipients = subs.len(),
                "broadcast snapshot to subscribers"
            );
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.get(id).map(|doc| doc.clone()))
    }

    async fn create(&self, doc: &Document) -> Result<DocumentId, StoreError> {
        let id = Uuid::new_v4().to_string();

        let mut stored = doc.clone();
        stored.id = Some(id.clone());
        self.documents.insert(id.clone(), stored.clone());

        tracing::info!(document_id = %id, "document created");

        self.broadcast(&id, &stored);
        Ok(id)
    }

    async fn update(&self, id: &DocumentId, doc: &Document) -> Result<(), StoreError> {
        if !self.documents.contains_key(id) {
            return Err(StoreError::NotFound(id.clone()));
        }

        let mut stored = doc.clone();
        stored.id = Some(id.clone());
        self.documents.insert(id.clone(), stored.clone());

        self.broadcast(id, &stored);
        Ok(())
    }

    fn subscribe(&self, id: &DocumentId) -> Subscription {
        let sub_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        // The current state, if any, is the first snapshot.
        if let Some(doc) = self.documents.get(id) {
            let _ = tx.send(doc.clone());
        }

        self.subscribers
            .entry(id.clone())
            .or_default()
            .push(Subscriber {
                id: sub_id.clone(),
                sender: tx,
            });

        tracing::debug!(document_id = %id, sub_id = %sub_id, "subscriber registered");

        let registry = Arc::clone(&self.subscribers);
        let doc_id = id.clone();
        Subscription::new(rx, move || {
            if let Some(mut subs) = registry.get_mut(&doc_id) {
                subs.retain(|sub| sub.id != sub_id);
                if subs.is_empty() {
                    drop(subs);
                    registry.remove(&doc_id);
                }
            }
            tracing::debug!(document_id = %doc_id, "subscriber unregistered");
        })
    }
}
