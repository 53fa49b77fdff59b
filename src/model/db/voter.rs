use std::ops::{Deref, DerefMut};

use mongodb::bson::{self, doc, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{coords::Coords, party::Party},
    mongodb::Id,
};

/// Core voter record data, as produced by the form and stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterCore {
    pub name: String,
    pub age: u32,
    pub party: Party,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_in_house: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl VoterCore {
    pub fn coords(&self) -> Coords {
        Coords::new(self.lat, self.lng)
    }
}

/// A voter record without an ID, stamped with its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVoter {
    #[serde(flatten)]
    pub voter: VoterCore,
    pub created_at: DateTime,
}

impl NewVoter {
    /// Stamp the given record with the current time.
    pub fn new(voter: VoterCore) -> Self {
        Self {
            voter,
            created_at: DateTime::now(),
        }
    }
}

/// A voter record from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Voter {
    /// Attach an ID to a freshly stamped record.
    pub fn from_new(id: Id, new: NewVoter) -> Self {
        Self {
            id,
            voter: new.voter,
            created_at: new.created_at,
            updated_at: None,
        }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// A validated partial update. `None` fields are left untouched.
/// Optional fields set to `Some(None)` are cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_in_house: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl VoterPatch {
    /// Merge the present fields into `voter`.
    pub fn apply_to(&self, voter: &mut VoterCore) {
        if let Some(ref name) = self.name {
            voter.name = name.clone();
        }
        if let Some(age) = self.age {
            voter.age = age;
        }
        if let Some(party) = self.party {
            voter.party = party;
        }
        if let Some(ref address) = self.address {
            voter.address = address.clone();
        }
        if let Some(people_in_house) = self.people_in_house {
            voter.people_in_house = people_in_house;
        }
        if let Some(ref designation) = self.designation {
            voter.designation = designation.clone();
        }
        if let Some(ref notes) = self.notes {
            voter.notes = notes.clone();
        }
        if let Some(lat) = self.lat {
            voter.lat = lat;
        }
        if let Some(lng) = self.lng {
            voter.lng = lng;
        }
    }

    /// Build an update that applies this patch and stamps `updatedAt`.
    /// Cleared fields are `$unset` so they read back as absent.
    pub fn to_update(&self, updated_at: DateTime) -> Result<Document, bson::ser::Error> {
        let mut set = Document::new();
        let mut unset = Document::new();
        for (key, value) in bson::to_document(self)? {
            match value {
                Bson::Null => {
                    unset.insert(key, "");
                }
                value => {
                    set.insert(key, value);
                }
            }
        }
        set.insert("updatedAt", updated_at);

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        Ok(update)
    }
}

/// Example data for tests and demos.
pub mod examples {
    use super::*;

    impl VoterCore {
        pub fn example() -> Self {
            Self {
                name: "John Doe".to_string(),
                age: 45,
                party: Party::Red,
                address: Some("123 Main St, Los Angeles, CA".to_string()),
                people_in_house: Some(4),
                designation: Some("Software Engineer".to_string()),
                notes: Some("Lives in downtown LA.".to_string()),
                lat: 34.052235,
                lng: -118.243683,
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Jane Smith".to_string(),
                age: 32,
                party: Party::Green,
                address: Some("456 Oak Ave, Los Angeles, CA".to_string()),
                people_in_house: Some(2),
                designation: Some("Environmental Scientist".to_string()),
                notes: Some("Strong environmental advocate.".to_string()),
                lat: 34.062235,
                lng: -118.253683,
            }
        }

        pub fn example3() -> Self {
            Self {
                name: "Peter Jones".to_string(),
                age: 58,
                party: Party::Saffron,
                address: Some("789 Pine Ln, Los Angeles, CA".to_string()),
                people_in_house: Some(1),
                designation: Some("Retired".to_string()),
                notes: None,
                lat: 34.042235,
                lng: -118.233683,
            }
        }
    }

    /// The demo dataset loaded into a seeded in-memory store.
    pub fn demo_voters() -> Vec<VoterCore> {
        vec![
            VoterCore::example(),
            VoterCore::example2(),
            VoterCore::example3(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_present_fields() {
        let mut voter = VoterCore::example();
        let patch = VoterPatch {
            party: Some(Party::Yellow),
            notes: Some(Some("Moved house".to_string())),
            ..Default::default()
        };
        patch.apply_to(&mut voter);

        let mut expected = VoterCore::example();
        expected.party = Party::Yellow;
        expected.notes = Some("Moved house".to_string());
        assert_eq!(voter, expected);
    }

    #[test]
    fn patch_update_document_skips_absent_fields() {
        let patch = VoterPatch {
            age: Some(30),
            ..Default::default()
        };
        let now = DateTime::now();
        let update = patch.to_update(now).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_i64("age").ok().or(set.get_i32("age").ok().map(i64::from)), Some(30));
        assert_eq!(set.get_datetime("updatedAt").unwrap(), &now);
        assert!(!update.contains_key("$unset"));
    }

    #[test]
    fn cleared_fields_are_unset() {
        let patch = VoterPatch {
            notes: Some(None),
            designation: Some(None),
            address: Some(Some("1 New Rd".to_string())),
            ..Default::default()
        };
        let update = patch.to_update(DateTime::now()).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("address").unwrap(), "1 New Rd");
        assert!(!set.contains_key("notes"));

        let unset = update.get_document("$unset").unwrap();
        let mut keys: Vec<_> = unset.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["designation", "notes"]);
    }

    #[test]
    fn db_document_uses_camel_case() {
        let new = NewVoter::new(VoterCore::example());
        let document = bson::to_document(&new).unwrap();
        assert!(document.contains_key("peopleInHouse"));
        assert!(document.contains_key("createdAt"));
        assert!(!document.contains_key("_id"));
    }
}
