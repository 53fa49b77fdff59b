use mongodb::{
    bson::{doc, DateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::voter::{NewVoter, Voter, VoterPatch},
    mongodb::{Coll, Id},
};

use super::{StoreError, VoterStore};

/// Voter store backed by the `voters` collection of a MongoDB database.
#[derive(Clone)]
pub struct MongoVoterStore {
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
}

impl MongoVoterStore {
    pub fn new(db: &Database) -> Self {
        let voters = Coll::<Voter>::from_db(db);
        let new_voters = voters.retype();
        Self { voters, new_voters }
    }
}

#[rocket::async_trait]
impl VoterStore for MongoVoterStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn list(&self) -> Result<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! {"createdAt": 1}).build();
        let voters = self
            .voters
            .find(None, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(voters)
    }

    async fn get(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn insert(&self, voter: NewVoter) -> Result<Voter> {
        let inserted = self.new_voters.insert_one(&voter, None).await?;
        let id: Id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Vanished(inserted.inserted_id.to_string()))?
            .into();

        // Read back what was actually stored.
        let stored = self
            .voters
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| StoreError::Vanished(id.to_string()))?;
        Ok(stored)
    }

    async fn update(&self, id: Id, patch: &VoterPatch) -> Result<Voter> {
        let update = patch.to_update(DateTime::now())?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.voters
            .find_one_and_update(id.as_doc(), update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with ID '{id}'")))
    }

    async fn delete(&self, id: Id) -> Result<()> {
        let result = self.voters.delete_one(id.as_doc(), None).await?;
        if result.deleted_count == 0 {
            Err(Error::not_found(format!("Voter with ID '{id}'")))
        } else {
            Ok(())
        }
    }
}
