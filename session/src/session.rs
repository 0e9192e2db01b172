//! Document editing sessions.
//!
//! A session actor exclusively owns two snapshots of one document: the
//! base (the last state confirmed by the store) and the working copy (base
//! plus the editor's outstanding edits). User edits, pushed snapshots, and
//! the write timer are multiplexed onto one task with `tokio::select!`, so
//! a merge never observes a half-applied edit and an edit never lands in a
//! half-merged document.
//!
//! Writes are coalesced: an edit marks the working copy dirty, and a
//! periodic timer flushes the whole document at most once per interval. A
//! failed flush is logged and reported, not retried on its own; the next
//! edit re-arms the timer and the next flush carries everything, because
//! the working copy still holds the data.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use circular_engine::{
    merge_document, Attrs, CollectionName, Document, DocumentId, DocumentSchema, FieldName,
    FieldValue, ItemId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::error::{Result, SessionError};
use crate::store::{DocumentStore, Subscription};

/// Lifecycle of a session as observed through [`SessionHandle::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Resolving the initial snapshot from the store.
    Loading,
    /// The requested document does not exist. Terminal.
    NotFound,
    /// Attached, no unsaved edits.
    Idle,
    /// Unsaved edits buffered in the working copy.
    Active,
    /// A store write is in flight.
    Saving,
}

/// Tuning knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Minimum spacing between store writes. Edits inside one interval
    /// ride the same flush.
    pub write_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            write_interval: Duration::from_millis(1000),
        }
    }
}

/// Edit and control messages accepted by the actor task.
#[derive(Debug)]
enum Command {
    SetField(FieldName, FieldValue),
    SetScalar(FieldName, Value),
    SetItem {
        collection: CollectionName,
        item: Attrs,
    },
    DeleteItem {
        collection: CollectionName,
        item_id: ItemId,
    },
    Terminate,
}

/// Cheap, cloneable handle on a running session.
///
/// Edits go in through the `set_*` methods; the working copy, status, and
/// last error come out through `watch` channels, so a presentation layer
/// can await changes instead of polling.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    working: watch::Receiver<Document>,
    status: watch::Receiver<SessionStatus>,
    last_error: watch::Receiver<Option<SessionError>>,
}

impl SessionHandle {
    /// Current working copy.
    pub fn working(&self) -> Document {
        self.working.borrow().clone()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// The most recent non-fatal error, cleared by the next successful
    /// flush.
    pub fn last_error(&self) -> Option<SessionError> {
        self.last_error.borrow().clone()
    }

    /// A watch receiver over the working copy, for awaiting re-renders.
    pub fn watch_working(&self) -> watch::Receiver<Document> {
        self.working.clone()
    }

    /// A watch receiver over the session status.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Wait until the initial snapshot is resolved.
    ///
    /// Returns `Err(SessionError::NotFound)` when the requested document
    /// does not exist.
    pub async fn loaded(&self) -> Result<()> {
        let mut status = self.status.clone();
        loop {
            match *status.borrow_and_update() {
                SessionStatus::Loading => {}
                SessionStatus::NotFound => return Err(SessionError::NotFound),
                _ => return Ok(()),
            }
            status
                .changed()
                .await
                .map_err(|_| SessionError::Terminated)?;
        }
    }

    /// Replace a whole field of the working copy.
    pub fn set_field(&self, name: impl Into<FieldName>, value: FieldValue) -> Result<()> {
        self.send(Command::SetField(name.into(), value))
    }

    /// Replace a scalar field of the working copy.
    pub fn set_scalar(&self, name: impl Into<FieldName>, value: Value) -> Result<()> {
        self.send(Command::SetScalar(name.into(), value))
    }

    /// Insert or replace one collection item, matched by its id attribute.
    pub fn set_item(&self, collection: impl Into<CollectionName>, item: Attrs) -> Result<()> {
        self.send(Command::SetItem {
            collection: collection.into(),
            item,
        })
    }

    /// Remove one collection item by its id attribute value.
    pub fn delete_item(
        &self,
        collection: impl Into<CollectionName>,
        item_id: impl Into<ItemId>,
    ) -> Result<()> {
        self.send(Command::DeleteItem {
            collection: collection.into(),
            item_id: item_id.into(),
        })
    }

    /// Stop the actor and release the push subscription. Buffered edits
    /// that have not been flushed are discarded.
    pub fn terminate(&self) -> Result<()> {
        self.send(Command::Terminate)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Terminated)
    }
}

/// A reconciliation session over one document.
pub struct Session {
    store: Arc<dyn DocumentStore>,
    schema: DocumentSchema,
    document_id: Option<DocumentId>,
    options: SessionOptions,

    working: watch::Sender<Document>,
    status: watch::Sender<SessionStatus>,
    last_error: watch::Sender<Option<SessionError>>,

    base: Document,
    pending_edit: bool,
    first_push: bool,
}

impl Session {
    /// Open a session and return its handle.
    ///
    /// With `Some(id)` the session loads that document and goes
    /// [`NotFound`](SessionStatus::NotFound) when it does not exist. With
    /// `None` it starts from the schema's empty document; the store assigns
    /// an identity on the first flush.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        schema: DocumentSchema,
        document_id: Option<DocumentId>,
        options: SessionOptions,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (working_tx, working_rx) = watch::channel(Document::new());
        let (status_tx, status_rx) = watch::channel(SessionStatus::Loading);
        let (error_tx, error_rx) = watch::channel(None);

        let session = Session {
            store,
            schema,
            document_id,
            options,
            working: working_tx,
            status: status_tx,
            last_error: error_tx,
            base: Document::new(),
            pending_edit: false,
            first_push: false,
        };

        tokio::spawn(session.run(command_rx));

        SessionHandle {
            commands: command_tx,
            working: working_rx,
            status: status_rx,
            last_error: error_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut subscription = match self.resolve_initial_snapshot().await {
            Ok(sub) => sub,
            Err(err) => {
                self.fail_load(err);
                return;
            }
        };

        self.status.send_replace(SessionStatus::Idle);

        let mut flush = tokio::time::interval(self.options.write_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        flush.tick().await;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Terminate) | None => break,
                        Some(command) => self.apply_edit(command),
                    }
                }
                snapshot = next_snapshot(&mut subscription) => {
                    match snapshot {
                        Some(remote) => {
                            if !self.absorb_push(remote) {
                                break;
                            }
                        }
                        None => {
                            tracing::warn!("push subscription closed by store");
                            subscription = None;
                        }
                    }
                }
                _ = flush.tick() => {
                    if self.pending_edit {
                        self.flush(&mut subscription).await;
                    }
                }
            }
        }

        if let Some(mut sub) = subscription {
            sub.unsubscribe();
        }
        tracing::info!(document_id = ?self.document_id, "session closed");
    }

    /// Resolve the initial working snapshot and, when the identity is
    /// already known, open the push subscription.
    async fn resolve_initial_snapshot(&mut self) -> Result<Option<Subscription>> {
        let subscription = match &self.document_id {
            Some(id) => {
                let doc = self
                    .store
                    .load(id)
                    .await?
                    .ok_or(SessionError::NotFound)?;
                self.schema.validate(&doc)?;

                tracing::debug!(document_id = %id, "session loaded existing document");
                self.working.send_replace(doc);

                self.first_push = true;
                Some(self.store.subscribe(id))
            }
            None => {
                let doc = self.schema.empty_document(Utc::now().timestamp_millis());
                tracing::debug!(schema = %self.schema.name, "session opened on new document");
                self.working.send_replace(doc);
                None
            }
        };

        self.base = self.working.borrow().clone();
        Ok(subscription)
    }

    fn fail_load(&self, err: SessionError) {
        tracing::warn!(document_id = ?self.document_id, error = %err, "session failed to load");
        self.last_error.send_replace(Some(err));
        self.status.send_replace(SessionStatus::NotFound);
    }

    /// Apply one edit command to the working copy.
    fn apply_edit(&mut self, command: Command) {
        let schema = &self.schema;
        let modified = self.working.send_if_modified(|working| {
            let outcome = match command {
                Command::SetField(name, value) => {
                    working.set_field(name, value);
                    Ok(())
                }
                Command::SetScalar(name, value) => {
                    working.set_scalar(name, value);
                    Ok(())
                }
                Command::SetItem { collection, item } => schema
                    .id_attr(&collection)
                    .map(str::to_owned)
                    .and_then(|id_attr| working.set_item(&collection, item, &id_attr)),
                Command::DeleteItem {
                    collection,
                    item_id,
                } => schema
                    .id_attr(&collection)
                    .map(str::to_owned)
                    .and_then(|id_attr| working.delete_item(&collection, &item_id, &id_attr)),
                // `run` breaks out of its loop on Terminate before calling
                // `apply_edit`, so this arm can never be reached.
                Command::Terminate => unreachable!("Terminate is handled by the actor loop"),
            };
            match outcome {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(error = %err, "edit rejected");
                    false
                }
            }
        });

        if modified {
            self.pending_edit = true;
            self.status.send_replace(SessionStatus::Active);
        }
    }

    /// Fold one pushed snapshot into the working copy.
    ///
    /// Returns false when the push is fatally malformed and the session
    /// must stop.
    fn absorb_push(&mut self, remote: Document) -> bool {
        // The first snapshot after subscribing is the state the session
        // already started from. It only re-baselines.
        if self.first_push {
            self.first_push = false;
            self.base = remote;
            return true;
        }

        if let Err(err) = self.schema.validate(&remote) {
            tracing::error!(error = %err, "malformed snapshot pushed, closing session");
            self.last_error.send_replace(Some(err.into()));
            return false;
        }

        let merged = merge_document(&self.schema, &self.base, &self.working.borrow(), &remote);
        self.base = remote;
        self.working.send_replace(merged);
        true
    }

    /// Write the working copy to the store and re-arm for the next batch.
    async fn flush(&mut self, subscription: &mut Option<Subscription>) {
        self.status.send_replace(SessionStatus::Saving);
        let doc = self.working.borrow().clone();

        let result = match &self.document_id {
            Some(id) => self.store.update(id, &doc).await,
            None => match self.store.create(&doc).await {
                Ok(id) => {
                    tracing::info!(document_id = %id, "document created on first flush");
                    self.working.send_modify(|working| working.id = Some(id.clone()));
                    self.base.id = Some(id.clone());

                    // The subscription echoes the create as its first
                    // snapshot.
                    self.first_push = true;
                    *subscription = Some(self.store.subscribe(&id));
                    self.document_id = Some(id);
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };

        // Either way the interval timer stands down until the next edit:
        // the working copy still holds everything, so a retry happens with
        // the next coalesced flush rather than immediately.
        self.pending_edit = false;

        match result {
            Ok(()) => {
                self.last_error.send_replace(None);
                self.status.send_replace(SessionStatus::Idle);
            }
            Err(err) => {
                tracing::warn!(document_id = ?self.document_id, error = %err, "flush failed");
                self.last_error.send_replace(Some(err.into()));
                self.status.send_replace(SessionStatus::Active);
            }
        }
    }
}

/// Await the next pushed snapshot, pending forever when no subscription
/// is open yet.
async fn next_snapshot(subscription: &mut Option<Subscription>) -> Option<Document> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}
