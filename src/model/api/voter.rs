use chrono::SecondsFormat;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{
        coords::{valid_latitude, valid_longitude, Coords},
        party::Party,
        validation::ValidationErrors,
    },
    db::voter::{Voter, VoterCore, VoterPatch},
};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 120;
pub const NOTES_MAX_CHARS: usize = 500;

/// A numeric form field, which may arrive as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl NumberInput {
    /// Blank text counts as no value at all.
    fn present(self) -> Option<Self> {
        match self {
            Self::Text(text) if text.trim().is_empty() => None,
            input => Some(input),
        }
    }
}

impl From<f64> for NumberInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for NumberInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Raw voter form input, as submitted for both adding and editing.
///
/// Every field is optional at the type level so that missing or out-of-range
/// values are reported per field rather than as an opaque parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterForm {
    pub name: Option<String>,
    pub age: Option<NumberInput>,
    pub party: Option<String>,
    pub address: Option<String>,
    pub people_in_house: Option<NumberInput>,
    pub designation: Option<String>,
    pub notes: Option<String>,
    pub lat: Option<NumberInput>,
    pub lng: Option<NumberInput>,
}

impl VoterForm {
    /// Validate a complete submission for a new voter.
    pub fn validate(self) -> Result<VoterCore, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = require(self.name, "name", "Name", &mut errors)
            .and_then(|name| check_name(name, &mut errors));
        let age = require(present(self.age), "age", "Age", &mut errors)
            .and_then(|age| number(age, "age", "Age", &mut errors))
            .and_then(|age| check_age(age, &mut errors));
        let party = require(self.party, "party", "Party", &mut errors)
            .and_then(|party| check_party(&party, &mut errors));
        let address = self.address.and_then(non_blank);
        let people_in_house = present(self.people_in_house)
            .and_then(|people| number(people, "peopleInHouse", PEOPLE_LABEL, &mut errors))
            .and_then(|people| check_people(people, &mut errors));
        let designation = self.designation.and_then(non_blank);
        let notes = self
            .notes
            .and_then(|notes| check_notes(notes, &mut errors))
            .and_then(non_blank);
        let lat = require(present(self.lat), "lat", "Latitude", &mut errors)
            .and_then(|lat| number(lat, "lat", "Latitude", &mut errors))
            .and_then(|lat| check_lat(lat, &mut errors));
        let lng = require(present(self.lng), "lng", "Longitude", &mut errors)
            .and_then(|lng| number(lng, "lng", "Longitude", &mut errors))
            .and_then(|lng| check_lng(lng, &mut errors));

        match (name, age, party, lat, lng) {
            (Some(name), Some(age), Some(party), Some(lat), Some(lng)) if errors.is_empty() => {
                Ok(VoterCore {
                    name,
                    age,
                    party,
                    address,
                    people_in_house,
                    designation,
                    notes,
                    lat,
                    lng,
                })
            }
            _ => Err(errors),
        }
    }

    /// Validate a partial submission for editing an existing voter.
    /// Absent fields are left as they are; present fields obey the same rules
    /// as for a new voter. A blank optional field clears the stored value.
    pub fn validate_patch(self) -> Result<VoterPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let patch = VoterPatch {
            name: self.name.and_then(|name| check_name(name, &mut errors)),
            age: present(self.age)
                .and_then(|age| number(age, "age", "Age", &mut errors))
                .and_then(|age| check_age(age, &mut errors)),
            party: self
                .party
                .and_then(|party| check_party(&party, &mut errors)),
            address: self.address.map(non_blank),
            people_in_house: self.people_in_house.map(|people| {
                people
                    .present()
                    .and_then(|people| {
                        number(people, "peopleInHouse", PEOPLE_LABEL, &mut errors)
                    })
                    .and_then(|people| check_people(people, &mut errors))
            }),
            designation: self.designation.map(non_blank),
            notes: self
                .notes
                .and_then(|notes| check_notes(notes, &mut errors))
                .map(non_blank),
            lat: present(self.lat)
                .and_then(|lat| number(lat, "lat", "Latitude", &mut errors))
                .and_then(|lat| check_lat(lat, &mut errors)),
            lng: present(self.lng)
                .and_then(|lng| number(lng, "lng", "Longitude", &mut errors))
                .and_then(|lng| check_lng(lng, &mut errors)),
        };
        errors.into_result(patch)
    }
}

fn require<T>(
    value: Option<T>,
    field: &'static str,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    if value.is_none() {
        errors.add(field, format!("{label} is required."));
    }
    value
}

const PEOPLE_LABEL: &str = "Number of people";

fn present(value: Option<NumberInput>) -> Option<NumberInput> {
    value.and_then(NumberInput::present)
}

/// Read a numeric field, accepting numbers sent as text.
fn number(
    value: NumberInput,
    field: &'static str,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    let parsed = match value {
        NumberInput::Number(number) => Some(number),
        NumberInput::Text(text) => text.trim().parse::<f64>().ok(),
    };
    match parsed {
        Some(number) if number.is_finite() => Some(number),
        _ => {
            errors.add(field, format!("{label} must be a number."));
            None
        }
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn check_name(name: String, errors: &mut ValidationErrors) -> Option<String> {
    let chars = name.chars().count();
    if chars < NAME_MIN_CHARS {
        errors.add("name", "Name must be at least 2 characters.");
        None
    } else if chars > NAME_MAX_CHARS {
        errors.add("name", "Name must be at most 50 characters.");
        None
    } else {
        Some(name)
    }
}

/// Convert a JSON number to a whole number, rejecting fractions.
fn whole(value: f64) -> Option<u64> {
    (value.is_finite() && value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64)
        .then_some(value as u64)
}

fn check_age(age: f64, errors: &mut ValidationErrors) -> Option<u32> {
    if !age.is_finite() || age.fract() != 0.0 {
        errors.add("age", "Age must be a whole number.");
        return None;
    }
    if age < f64::from(MIN_AGE) {
        errors.add("age", "Voter must be 18 or older.");
        None
    } else if age > f64::from(MAX_AGE) {
        errors.add("age", "Age must be 120 or less.");
        None
    } else {
        whole(age).and_then(|age| u32::try_from(age).ok())
    }
}

fn check_party(party: &str, errors: &mut ValidationErrors) -> Option<Party> {
    match party.parse::<Party>() {
        Ok(party) => Some(party),
        Err(_) => {
            let choices = Party::ALL.map(Party::name).join(", ");
            errors.add("party", format!("Party must be one of: {choices}."));
            None
        }
    }
}

fn check_people(people: f64, errors: &mut ValidationErrors) -> Option<u32> {
    match whole(people).and_then(|people| u32::try_from(people).ok()) {
        Some(people) => Some(people),
        None => {
            errors.add(
                "peopleInHouse",
                "Number of people must be a non-negative whole number.",
            );
            None
        }
    }
}

fn check_notes(notes: String, errors: &mut ValidationErrors) -> Option<String> {
    if notes.chars().count() > NOTES_MAX_CHARS {
        errors.add("notes", "Notes must be 500 characters or less.");
        None
    } else {
        Some(notes)
    }
}

fn check_lat(lat: f64, errors: &mut ValidationErrors) -> Option<f64> {
    if valid_latitude(lat) {
        Some(lat)
    } else {
        errors.add("lat", "Latitude must be between -90 and 90.");
        None
    }
}

fn check_lng(lng: f64, errors: &mut ValidationErrors) -> Option<f64> {
    if valid_longitude(lng) {
        Some(lng)
    } else {
        errors.add("lng", "Longitude must be between -180 and 180.");
        None
    }
}

/// A stored voter record, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub id: ApiId,
    pub name: String,
    pub age: u32,
    pub party: Party,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_in_house: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub lat: f64,
    pub lng: f64,
    /// ISO-8601 creation time.
    pub created_at: String,
    /// ISO-8601 time of the last edit, if ever edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl VoterRecord {
    pub fn coords(&self) -> Coords {
        Coords::new(self.lat, self.lng)
    }
}

/// Render a database timestamp the way JavaScript's `toISOString` does.
pub fn iso_timestamp(time: DateTime) -> String {
    time.to_chrono()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<Voter> for VoterRecord {
    fn from(voter: Voter) -> Self {
        let VoterCore {
            name,
            age,
            party,
            address,
            people_in_house,
            designation,
            notes,
            lat,
            lng,
        } = voter.voter;
        Self {
            id: voter.id.into(),
            name,
            age,
            party,
            address,
            people_in_house,
            designation,
            notes,
            lat,
            lng,
            created_at: iso_timestamp(voter.created_at),
            updated_at: voter.updated_at.map(iso_timestamp),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterForm {
        pub fn example() -> Self {
            Self {
                name: Some("John Doe".to_string()),
                age: Some(45.0.into()),
                party: Some("Red".to_string()),
                address: Some("123 Main St, Los Angeles, CA".to_string()),
                people_in_house: Some(4.0.into()),
                designation: Some("Software Engineer".to_string()),
                notes: Some("Lives in downtown LA.".to_string()),
                lat: Some(34.052235.into()),
                lng: Some((-118.243683).into()),
            }
        }

        pub fn minimal(name: &str, party: Party) -> Self {
            Self {
                name: Some(name.to_string()),
                age: Some(30.0.into()),
                party: Some(party.name().to_string()),
                lat: Some(20.5937.into()),
                lng: Some(78.9629.into()),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    use crate::model::mongodb::Id;

    #[test]
    fn example_form_is_valid() {
        let voter = VoterForm::example().validate().unwrap();
        assert_eq!(voter, VoterCore::example());
    }

    #[test]
    fn age_boundaries() {
        for (age, ok) in [(17.0, false), (18.0, true), (120.0, true), (121.0, false), (30.5, false)] {
            let form = VoterForm {
                age: Some(age.into()),
                ..VoterForm::example()
            };
            let result = form.validate();
            assert_eq!(result.is_ok(), ok, "age {age}");
            if let Err(errors) = result {
                assert!(errors.message_for("age").is_some());
            }
        }
        let errors = VoterForm {
            age: Some(17.0.into()),
            ..VoterForm::example()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.message_for("age"), Some("Voter must be 18 or older."));
    }

    #[test]
    fn notes_boundaries() {
        let accepted = VoterForm {
            notes: Some("n".repeat(500)),
            ..VoterForm::example()
        };
        assert!(accepted.validate().is_ok());

        let rejected = VoterForm {
            notes: Some("n".repeat(501)),
            ..VoterForm::example()
        };
        let errors = rejected.validate().unwrap_err();
        assert_eq!(
            errors.message_for("notes"),
            Some("Notes must be 500 characters or less.")
        );
    }

    #[test]
    fn name_counts_characters_not_bytes() {
        let form = VoterForm {
            name: Some("é".repeat(50)),
            ..VoterForm::example()
        };
        assert!(form.validate().is_ok());

        let form = VoterForm {
            name: Some("A".to_string()),
            ..VoterForm::example()
        };
        assert!(form.validate().unwrap_err().message_for("name").is_some());

        let form = VoterForm {
            name: Some("A".repeat(51)),
            ..VoterForm::example()
        };
        assert!(form.validate().unwrap_err().message_for("name").is_some());
    }

    #[test]
    fn collects_every_error() {
        let form = VoterForm {
            name: None,
            age: Some(5.0.into()),
            party: Some("Purple".to_string()),
            lat: Some(91.0.into()),
            lng: None,
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "age", "party", "lat", "lng"]);
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        let form = VoterForm {
            address: Some("   ".to_string()),
            notes: Some(String::new()),
            ..VoterForm::example()
        };
        let voter = form.validate().unwrap();
        assert_eq!(voter.address, None);
        assert_eq!(voter.notes, None);
    }

    #[test]
    fn patch_validates_only_present_fields() {
        let patch = VoterForm {
            party: Some("Black".to_string()),
            ..Default::default()
        }
        .validate_patch()
        .unwrap();
        assert_eq!(
            patch,
            VoterPatch {
                party: Some(Party::Black),
                ..Default::default()
            }
        );

        let errors = VoterForm {
            age: Some(17.0.into()),
            people_in_house: Some((-1.0).into()),
            ..Default::default()
        }
        .validate_patch()
        .unwrap_err();
        assert!(errors.message_for("age").is_some());
        assert!(errors.message_for("peopleInHouse").is_some());
        assert!(errors.message_for("name").is_none());
    }

    #[test]
    fn numbers_may_arrive_as_text() {
        let form: VoterForm = rocket::serde::json::serde_json::from_str(
            r#"{"name": "John Doe", "age": "30", "party": "Red",
                "peopleInHouse": " 3 ", "lat": "1.5", "lng": 2.0}"#,
        )
        .unwrap();
        let voter = form.validate().unwrap();
        assert_eq!(voter.age, 30);
        assert_eq!(voter.people_in_house, Some(3));
        assert_eq!(voter.lat, 1.5);
        assert_eq!(voter.lng, 2.0);

        let errors = VoterForm {
            age: Some("thirty".into()),
            lat: Some("north".into()),
            ..VoterForm::example()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.message_for("age"), Some("Age must be a number."));
        assert_eq!(errors.message_for("lat"), Some("Latitude must be a number."));

        // Blank text is the same as leaving the field out.
        let errors = VoterForm {
            age: Some("  ".into()),
            people_in_house: Some("".into()),
            ..VoterForm::example()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.message_for("age"), Some("Age is required."));
        assert!(errors.message_for("peopleInHouse").is_none());
    }

    #[test]
    fn patch_blanks_clear_optional_fields() {
        let patch = VoterForm {
            address: Some("   ".to_string()),
            designation: Some(String::new()),
            notes: Some(String::new()),
            people_in_house: Some("".into()),
            ..Default::default()
        }
        .validate_patch()
        .unwrap();
        assert_eq!(
            patch,
            VoterPatch {
                address: Some(None),
                people_in_house: Some(None),
                designation: Some(None),
                notes: Some(None),
                ..Default::default()
            }
        );

        let mut voter = VoterCore::example();
        patch.apply_to(&mut voter);
        assert_eq!(voter.address, None);
        assert_eq!(voter.people_in_house, None);
        assert_eq!(voter.designation, None);
        assert_eq!(voter.notes, None);

        let patch = VoterForm {
            notes: Some("Moved house".to_string()),
            ..Default::default()
        }
        .validate_patch()
        .unwrap();
        assert_eq!(patch.notes, Some(Some("Moved house".to_string())));
    }

    #[test]
    fn record_uses_iso_timestamps() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let voter = Voter {
            id: Id::new(),
            voter: VoterCore::example(),
            created_at: DateTime::from_chrono(created),
            updated_at: None,
        };
        let record = VoterRecord::from(voter.clone());
        assert_eq!(record.created_at, "2024-03-01T12:30:00.000Z");
        assert_eq!(record.updated_at, None);
        assert_eq!(record.id.to_string(), voter.id.to_string());
        assert_eq!(record.name, "John Doe");
    }
}
