//! Personal collection with optimistic sync.
//!
//! Mutations land in the local list immediately and are then pushed to the
//! content store in the background. When the newest push for an item is
//! rejected, the item goes back to the state the store last accepted.
//!
//! Remote operations touching the same item run one after another in issue
//! order, so the store ends up agreeing with the latest local intent.

pub mod optimistic;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{BackendError, ContentStore};
use crate::domain::PersonalCollectionItem;

pub use optimistic::{settle, Delta, OptimisticList, Ticket};

/// Errors reported by collection sync
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("No collection loaded for this session")]
    NoCollection,

    #[error("Remote sync failed: {0}")]
    Remote(#[from] BackendError),

    #[error("Remote sync failed after a newer local change: {0}")]
    Superseded(String),

    #[error("Sync task did not finish: {0}")]
    Aborted(String),
}

type SharedSync = Shared<BoxFuture<'static, Result<(), SyncError>>>;

/// Remote side of a local mutation
#[derive(Debug, Clone, Copy)]
enum RemoteOp {
    Add(Uuid),
    Remove(Uuid),
    SetFavorite(Uuid, bool),
}

impl RemoteOp {
    fn for_delta(delta: &Delta) -> Self {
        match *delta {
            Delta::Insert(item) => Self::Add(item.artifact_id),
            Delta::Remove(id) => Self::Remove(id),
            Delta::SetFavorite {
                artifact_id,
                is_favorite,
            } => Self::SetFavorite(artifact_id, is_favorite),
        }
    }
}

/// Handle to the background push of one mutation.
///
/// Dropping it does not cancel the push.
#[must_use = "await `wait` to observe the remote outcome"]
pub struct PendingSync {
    handle: Option<JoinHandle<Result<(), SyncError>>>,
}

impl PendingSync {
    fn noop() -> Self {
        Self { handle: None }
    }

    /// Whether the mutation changed nothing and no push was started
    pub fn is_noop(&self) -> bool {
        self.handle.is_none()
    }

    /// Wait for the remote outcome (and any rollback) to settle
    pub async fn wait(self) -> Result<(), SyncError> {
        match self.handle {
            None => Ok(()),
            Some(handle) => handle
                .await
                .map_err(|e| SyncError::Aborted(e.to_string()))?,
        }
    }
}

/// Session state guarded by one lock
#[derive(Debug, Default)]
struct Session {
    list: OptimisticList,
    user_id: Option<String>,
    collection_id: Option<Uuid>,
    error: Option<String>,
}

struct Inner {
    store: Arc<dyn ContentStore>,
    session: Mutex<Session>,
    /// Last queued push per item, tagged with its generation. Generations
    /// never repeat, even across sessions.
    /// Lock order: `tails` before `session`.
    tails: Mutex<HashMap<Uuid, (u64, SharedSync)>>,
}

impl Inner {
    async fn push(&self, op: RemoteOp, collection_id: Option<Uuid>) -> Result<(), SyncError> {
        let collection_id = collection_id.ok_or(SyncError::NoCollection)?;

        match op {
            RemoteOp::Add(id) => self.store.add_artifact_to_collection(id, collection_id).await?,
            RemoteOp::Remove(id) => {
                self.store
                    .remove_artifact_from_collection(id, collection_id)
                    .await?
            }
            RemoteOp::SetFavorite(id, is_favorite) => {
                self.store
                    .set_favorite(id, collection_id, is_favorite)
                    .await?
            }
        }

        debug!(?op, %collection_id, "Remote sync ok");
        Ok(())
    }
}

/// Local personal collection kept in sync with the content store.
///
/// Cheap to clone; clones share the same session. Mutations spawn onto the
/// current Tokio runtime.
#[derive(Clone)]
pub struct CollectionSyncEngine {
    inner: Arc<Inner>,
}

impl CollectionSyncEngine {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                session: Mutex::new(Session::default()),
                tails: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Local lookup, no I/O
    pub fn is_in_collection(&self, artifact_id: Uuid) -> bool {
        self.inner.session.lock().list.contains(artifact_id)
    }

    pub fn is_favorite(&self, artifact_id: Uuid) -> bool {
        self.inner
            .session
            .lock()
            .list
            .get(artifact_id)
            .is_some_and(|i| i.is_favorite)
    }

    /// Snapshot of the local list
    pub fn items(&self) -> Vec<PersonalCollectionItem> {
        self.inner.session.lock().list.items().to_vec()
    }

    /// Items marked as favorite
    pub fn favorites(&self) -> Vec<PersonalCollectionItem> {
        self.inner
            .session
            .lock()
            .list
            .items()
            .iter()
            .filter(|i| i.is_favorite)
            .copied()
            .collect()
    }

    /// Error from the last load, if it failed
    pub fn error(&self) -> Option<String> {
        self.inner.session.lock().error.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.session.lock().user_id.clone()
    }

    pub fn collection_id(&self) -> Option<Uuid> {
        self.inner.session.lock().collection_id
    }

    /// Add an item locally and push it. No-op if already present.
    pub fn add(&self, item: PersonalCollectionItem) -> PendingSync {
        self.mutate(Delta::Insert(item))
    }

    /// Remove an item locally and push the removal. No-op if absent.
    pub fn remove(&self, artifact_id: Uuid) -> PendingSync {
        self.mutate(Delta::Remove(artifact_id))
    }

    /// Flip the favorite flag of an item in the collection
    pub fn toggle_favorite(&self, artifact_id: Uuid) -> PendingSync {
        let current = self.inner.session.lock().list.get(artifact_id).copied();

        match current {
            Some(item) => self.mutate(Delta::SetFavorite {
                artifact_id,
                is_favorite: !item.is_favorite,
            }),
            None => {
                debug!(%artifact_id, "Not in collection, nothing to toggle");
                PendingSync::noop()
            }
        }
    }

    /// Load a user's collection, replacing the local list.
    ///
    /// Creates the user's collection container when none exists yet.
    #[instrument(skip(self))]
    pub async fn load(&self, user_id: &str) -> Result<(), SyncError> {
        let epoch = {
            let mut session = self.inner.session.lock();
            session.user_id = Some(user_id.to_string());
            session.collection_id = None;
            session.error = None;
            session.list.begin_session()
        };

        let result = self.fetch_session(user_id).await;

        let mut session = self.inner.session.lock();
        if session.list.epoch() != epoch {
            debug!("Session changed during load, discarding result");
            return result.map(|_| ());
        }

        match result {
            Ok((collection_id, items)) => {
                info!(%collection_id, count = items.len(), "Collection loaded");
                session.collection_id = Some(collection_id);
                session.list.replace(epoch, items);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load collection");
                session.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drop the session, e.g. on logout. Pending pushes still run but no
    /// longer roll anything back.
    pub fn clear(&self) {
        let mut session = self.inner.session.lock();
        session.list.begin_session();
        session.user_id = None;
        session.collection_id = None;
        session.error = None;
        debug!("Collection session cleared");
    }

    async fn fetch_session(
        &self,
        user_id: &str,
    ) -> Result<(Uuid, Vec<PersonalCollectionItem>), SyncError> {
        let store = &self.inner.store;
        let collections = store.fetch_user_collections(user_id).await?;

        let Some(collection) = collections.into_iter().next() else {
            let created = store.create_user_collection(user_id).await?;
            info!(collection_id = %created.id, "Created collection");
            return Ok((created.id, Vec::new()));
        };

        let rows = store.fetch_collection_artifacts(collection.id).await?;
        Ok((collection.id, rows.iter().map(PersonalCollectionItem::from).collect()))
    }

    /// Apply a delta locally and queue its push behind earlier pushes for
    /// the same item
    fn mutate(&self, delta: Delta) -> PendingSync {
        let artifact_id = delta.artifact_id();
        let mut tails = self.inner.tails.lock();

        let (ticket, collection_id) = {
            let mut session = self.inner.session.lock();
            let Some(ticket) = session.list.apply(delta) else {
                debug!(?delta, "No local change");
                return PendingSync::noop();
            };
            (ticket, session.collection_id)
        };

        let previous = tails.get(&artifact_id).map(|(_, sync)| sync.clone());
        let generation = ticket.generation;
        let inner = Arc::clone(&self.inner);
        let op = RemoteOp::for_delta(&delta);

        let sync = async move {
            if let Some(previous) = previous {
                // Its outcome belongs to its own caller
                let _ = previous.await;
            }

            let result = settle(ticket, inner.push(op, collection_id), || {
                MutexGuard::map(inner.session.lock(), |session| &mut session.list)
            })
            .await;

            let mut tails = inner.tails.lock();
            if tails.get(&artifact_id).is_some_and(|(g, _)| *g == generation) {
                tails.remove(&artifact_id);
            }

            result
        }
        .boxed()
        .shared();

        tails.insert(artifact_id, (generation, sync.clone()));
        drop(tails);

        PendingSync {
            handle: Some(tokio::spawn(sync)),
        }
    }
}
