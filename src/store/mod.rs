//! The voter data access layer.
//!
//! [`VoterStore`] is the persistence seam, with a MongoDB backend for
//! production and an in-memory backend for demos and tests. Handlers never
//! see a backend directly: they go through [`VoterRepository`], which is
//! placed in Rocket's managed state, converts stored records into their API
//! form, and publishes a [`VoterEvent`] after every successful mutation.
//! Writes are serialised with their publication, so subscribers see events in
//! the order the store applied them.

use std::sync::Arc;

use log::debug;
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::tokio::sync::{broadcast, Mutex};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::{
    api::voter::VoterRecord,
    db::voter::{NewVoter, Voter, VoterCore, VoterPatch},
    mongodb::Id,
};

mod events;
mod memory;
mod mongo;

pub use events::{Subscription, VoterEvent, EVENT_CAPACITY};
pub use memory::MemoryVoterStore;
pub use mongo::MongoVoterStore;

/// Failures of the backing store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Serialise(#[from] BsonError),
    #[error("Voter {0} could not be read back after being written")]
    Vanished(String),
}

/// A backend capable of persisting voter records.
///
/// Backends own ID and timestamp assignment; callers only ever supply the
/// form-produced fields.
#[rocket::async_trait]
pub trait VoterStore: Send + Sync {
    /// Short name of the backend, for logging.
    fn backend(&self) -> &'static str;

    /// All stored voters, oldest first.
    async fn list(&self) -> Result<Vec<Voter>>;

    async fn get(&self, id: Id) -> Result<Option<Voter>>;

    /// Persist a new voter and return it as stored, with its generated ID.
    async fn insert(&self, voter: NewVoter) -> Result<Voter>;

    /// Merge `patch` into the voter with the given ID and stamp `updatedAt`.
    /// Fails with [`Error::NotFound`] if there is no such voter.
    async fn update(&self, id: Id, patch: &VoterPatch) -> Result<Voter>;

    /// Hard-delete the voter with the given ID.
    /// Fails with [`Error::NotFound`] if there is no such voter.
    async fn delete(&self, id: Id) -> Result<()>;
}

/// Shared handle on the voter store plus its change feed.
#[derive(Clone)]
pub struct VoterRepository {
    store: Arc<dyn VoterStore>,
    events: broadcast::Sender<VoterEvent>,
    /// Held from the start of a write until its event is sent.
    writes: Arc<Mutex<()>>,
}

impl VoterRepository {
    pub fn new(store: impl VoterStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Arc::new(store),
            events,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// A repository over an empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryVoterStore::new())
    }

    /// A repository over an in-memory store holding the demo dataset.
    pub fn demo() -> Self {
        Self::new(MemoryVoterStore::with_demo_data())
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Every stored voter, with timestamps rendered as ISO-8601 strings.
    /// An empty store yields an empty list.
    pub async fn list(&self) -> Result<Vec<VoterRecord>> {
        let voters = self.store.list().await?;
        Ok(voters.into_iter().map(VoterRecord::from).collect())
    }

    pub async fn get(&self, id: Id) -> Result<VoterRecord> {
        self.store
            .get(id)
            .await?
            .map(VoterRecord::from)
            .ok_or_else(|| Error::not_found(format!("Voter with ID '{id}'")))
    }

    /// Store a new, already-validated voter.
    pub async fn create(&self, voter: VoterCore) -> Result<VoterRecord> {
        let _write = self.writes.lock().await;
        let stored = self.store.insert(NewVoter::new(voter)).await?;
        debug!("Created voter {} in {} store", stored.id, self.backend());
        let record = VoterRecord::from(stored);
        self.publish(VoterEvent::Created(record.clone()));
        Ok(record)
    }

    /// Apply an already-validated patch to an existing voter.
    pub async fn update(&self, id: Id, patch: VoterPatch) -> Result<VoterRecord> {
        let _write = self.writes.lock().await;
        let stored = self.store.update(id, &patch).await?;
        debug!("Updated voter {id} in {} store", self.backend());
        let record = VoterRecord::from(stored);
        self.publish(VoterEvent::Updated(record.clone()));
        Ok(record)
    }

    pub async fn delete(&self, id: Id) -> Result<()> {
        let _write = self.writes.lock().await;
        self.store.delete(id).await?;
        debug!("Deleted voter {id} from {} store", self.backend());
        self.publish(VoterEvent::Deleted(id.into()));
        Ok(())
    }

    /// Start receiving change events. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    fn publish(&self, event: VoterEvent) {
        // An error only means nobody is listening right now.
        let _ = self.events.send(event);
    }
}
