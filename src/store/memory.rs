use mongodb::bson::DateTime;
use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    db::voter::{examples::demo_voters, NewVoter, Voter, VoterCore, VoterPatch},
    mongodb::Id,
};

use super::VoterStore;

/// A voter store held entirely in process memory, in insertion order.
/// Contents are lost when the store is dropped.
#[derive(Default)]
pub struct MemoryVoterStore {
    voters: RwLock<Vec<Voter>>,
}

impl MemoryVoterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the given voters, each stamped with a fresh ID.
    pub fn with_voters(voters: impl IntoIterator<Item = VoterCore>) -> Self {
        let voters = voters
            .into_iter()
            .map(|voter| Voter::from_new(Id::new(), NewVoter::new(voter)))
            .collect();
        Self {
            voters: RwLock::new(voters),
        }
    }

    pub fn with_demo_data() -> Self {
        Self::with_voters(demo_voters())
    }
}

#[rocket::async_trait]
impl VoterStore for MemoryVoterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<Voter>> {
        Ok(self.voters.read().await.clone())
    }

    async fn get(&self, id: Id) -> Result<Option<Voter>> {
        let voters = self.voters.read().await;
        Ok(voters.iter().find(|v| v.id == id).cloned())
    }

    async fn insert(&self, voter: NewVoter) -> Result<Voter> {
        let voter = Voter::from_new(Id::new(), voter);
        self.voters.write().await.push(voter.clone());
        Ok(voter)
    }

    async fn update(&self, id: Id, patch: &VoterPatch) -> Result<Voter> {
        let mut voters = self.voters.write().await;
        let voter = voters
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| Error::not_found(format!("Voter with ID '{id}'")))?;
        patch.apply_to(voter);
        voter.updated_at = Some(DateTime::now());
        Ok(voter.clone())
    }

    async fn delete(&self, id: Id) -> Result<()> {
        let mut voters = self.voters.write().await;
        let index = voters
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| Error::not_found(format!("Voter with ID '{id}'")))?;
        voters.remove(index);
        Ok(())
    }
}
