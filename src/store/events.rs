use log::warn;
use rocket::tokio::sync::broadcast::{error::RecvError, Receiver};
use serde::{Deserialize, Serialize};

use crate::model::api::{id::ApiId, voter::VoterRecord};

/// How many unread events a subscriber may fall behind by before it is told to resync.
pub const EVENT_CAPACITY: usize = 64;

/// A change to the voter collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum VoterEvent {
    Created(VoterRecord),
    Updated(VoterRecord),
    Deleted(ApiId),
    /// Events were missed; the subscriber should re-list the whole collection.
    Resync,
}

/// A live feed of [`VoterEvent`]s, in the order the store applied them.
pub struct Subscription {
    receiver: Receiver<VoterEvent>,
}

impl Subscription {
    pub(super) fn new(receiver: Receiver<VoterEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event. Returns `None` once the repository is gone.
    pub async fn next(&mut self) -> Option<VoterEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(missed)) => {
                warn!("Voter subscriber lagged by {missed} events, requesting resync");
                Some(VoterEvent::Resync)
            }
            Err(RecvError::Closed) => None,
        }
    }
}
