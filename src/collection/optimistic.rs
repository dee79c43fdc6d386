//! Optimistic updates with rollback.
//!
//! A mutation is applied to the local list right away and yields a
//! [`Ticket`]. For every item with pushes in flight the list remembers the
//! state the remote side last confirmed. When the newest push for an item
//! fails, [`settle`] restores that confirmed state. Older pushes only move
//! the confirmed state forward on success and leave the local list alone
//! on failure.

use std::collections::HashMap;
use std::future::Future;
use std::ops::DerefMut;

use tracing::{debug, warn};
use uuid::Uuid;

use super::SyncError;
use crate::domain::PersonalCollectionItem;

/// A change to the local collection list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// Append an item
    Insert(PersonalCollectionItem),

    /// Remove the item with this artifact id
    Remove(Uuid),

    /// Set the favorite flag of an existing item
    SetFavorite { artifact_id: Uuid, is_favorite: bool },
}

impl Delta {
    /// The item this delta touches
    pub fn artifact_id(&self) -> Uuid {
        match self {
            Delta::Insert(item) => item.artifact_id,
            Delta::Remove(id) => *id,
            Delta::SetFavorite { artifact_id, .. } => *artifact_id,
        }
    }

    /// Apply to `items`. Returns false when the delta changes nothing.
    pub fn apply(&self, items: &mut Vec<PersonalCollectionItem>) -> bool {
        match *self {
            Delta::Insert(item) => {
                if items.iter().any(|i| i.artifact_id == item.artifact_id) {
                    return false;
                }
                items.push(item);
                true
            }
            Delta::Remove(id) => match items.iter().position(|i| i.artifact_id == id) {
                Some(pos) => {
                    items.remove(pos);
                    true
                }
                None => false,
            },
            Delta::SetFavorite {
                artifact_id,
                is_favorite,
            } => match items.iter_mut().find(|i| i.artifact_id == artifact_id) {
                Some(item) if item.is_favorite != is_favorite => {
                    item.is_favorite = is_favorite;
                    true
                }
                _ => false,
            },
        }
    }
}

/// Record of one applied mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Item touched
    pub artifact_id: Uuid,

    /// Per-item intent counter at apply time, never reused
    pub generation: u64,

    /// Session counter at apply time
    pub epoch: u64,

    /// Local state of the item right after the mutation
    pub after: Option<PersonalCollectionItem>,
}

/// Local list with per-item intent tracking
#[derive(Debug, Default)]
pub struct OptimisticList {
    items: Vec<PersonalCollectionItem>,
    /// Monotonic across sessions
    generations: HashMap<Uuid, u64>,
    /// Remote-confirmed state of items with pushes in flight
    confirmed: HashMap<Uuid, Option<PersonalCollectionItem>>,
    epoch: u64,
}

impl OptimisticList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current items in insertion order
    pub fn items(&self) -> &[PersonalCollectionItem] {
        &self.items
    }

    pub fn get(&self, artifact_id: Uuid) -> Option<&PersonalCollectionItem> {
        self.items.iter().find(|i| i.artifact_id == artifact_id)
    }

    pub fn contains(&self, artifact_id: Uuid) -> bool {
        self.get(artifact_id).is_some()
    }

    /// Current session counter
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Apply a local mutation. Returns `None` for a no-op.
    pub fn apply(&mut self, delta: Delta) -> Option<Ticket> {
        let artifact_id = delta.artifact_id();
        let before = self.get(artifact_id).copied();

        if !delta.apply(&mut self.items) {
            return None;
        }

        self.confirmed.entry(artifact_id).or_insert(before);

        let generation = self.generations.entry(artifact_id).or_insert(0);
        *generation += 1;

        Some(Ticket {
            artifact_id,
            generation: *generation,
            epoch: self.epoch,
            after: self.get(artifact_id).copied(),
        })
    }

    /// Record that the remote side accepted a mutation
    pub fn confirm(&mut self, ticket: &Ticket) {
        if !self.is_current_session(ticket) {
            return;
        }

        if self.is_latest(ticket) {
            self.confirmed.remove(&ticket.artifact_id);
        } else {
            self.confirmed.insert(ticket.artifact_id, ticket.after);
        }
    }

    /// Handle a rejected mutation. If it is the latest intent for its item,
    /// restore the remote-confirmed state and return true.
    pub fn rollback(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current_session(ticket) {
            debug!(artifact_id = %ticket.artifact_id, "Rollback skipped: session changed");
            return false;
        }

        if !self.is_latest(ticket) {
            debug!(artifact_id = %ticket.artifact_id, "Rollback deferred to newer local change");
            return false;
        }

        let Some(confirmed) = self.confirmed.remove(&ticket.artifact_id) else {
            return false;
        };
        self.restore(ticket.artifact_id, confirmed);
        true
    }

    /// Start a new session with an empty list. Returns the new epoch.
    pub fn begin_session(&mut self) -> u64 {
        self.epoch += 1;
        self.items.clear();
        self.confirmed.clear();
        self.epoch
    }

    /// Replace the list wholesale if `epoch` is still current
    pub fn replace(&mut self, epoch: u64, items: Vec<PersonalCollectionItem>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.items = items;
        true
    }

    fn is_current_session(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    fn is_latest(&self, ticket: &Ticket) -> bool {
        self.generations.get(&ticket.artifact_id).copied() == Some(ticket.generation)
    }

    /// Set one item to `state`. A restored item is appended at the end.
    fn restore(&mut self, artifact_id: Uuid, state: Option<PersonalCollectionItem>) {
        match state {
            Some(item) => match self.items.iter_mut().find(|i| i.artifact_id == artifact_id) {
                Some(existing) => *existing = item,
                None => self.items.push(item),
            },
            None => self.items.retain(|i| i.artifact_id != artifact_id),
        }
    }
}

/// Await a remote operation and reconcile the local list with its outcome.
///
/// `list` is called once the remote side has answered and gives access to
/// the list the ticket came from. A failure that did not restore local
/// state comes back as [`SyncError::Superseded`].
pub async fn settle<Fut, E, L, G>(ticket: Ticket, remote: Fut, list: L) -> Result<(), SyncError>
where
    Fut: Future<Output = Result<(), E>>,
    E: Into<SyncError>,
    L: FnOnce() -> G,
    G: DerefMut<Target = OptimisticList>,
{
    let result = remote.await;
    let mut list = list();

    let err: SyncError = match result {
        Ok(()) => {
            list.confirm(&ticket);
            return Ok(());
        }
        Err(e) => e.into(),
    };

    if list.rollback(&ticket) {
        warn!(artifact_id = %ticket.artifact_id, error = %err, "Remote sync failed, local change rolled back");
        Err(err)
    } else {
        warn!(artifact_id = %ticket.artifact_id, error = %err, "Remote sync failed after a newer local change");
        Err(SyncError::Superseded(err.to_string()))
    }
}
