use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The parties a voter can be recorded as supporting.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Saffron,
    Red,
    Black,
    White,
    Yellow,
    Green,
}

impl Party {
    /// Every party, in display order.
    pub const ALL: [Party; 6] = [
        Party::Saffron,
        Party::Red,
        Party::Black,
        Party::White,
        Party::Yellow,
        Party::Green,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Party::Saffron => "Saffron",
            Party::Red => "Red",
            Party::Black => "Black",
            Party::White => "White",
            Party::Yellow => "Yellow",
            Party::Green => "Green",
        }
    }

    /// Hex color used for map markers and badges.
    pub fn color(self) -> &'static str {
        match self {
            Party::Saffron => "#FF9933",
            Party::Red => "#E63946",
            Party::Black => "#212529",
            Party::White => "#F8F9FA",
            Party::Yellow => "#FFCA3A",
            Party::Green => "#2A9D8F",
        }
    }

    /// Space-separated HSL components, as consumed by chart configuration.
    pub fn hsl(self) -> &'static str {
        match self {
            Party::Saffron => "34 100% 60%",
            Party::Red => "355 79% 55%",
            Party::Black => "210 10% 23%",
            Party::White => "210 17% 98%",
            Party::Yellow => "45 100% 62%",
            Party::Green => "172 58% 38%",
        }
    }

    /// Whether text drawn on top of [`Party::color`] should be dark to stay legible.
    pub fn needs_dark_text(self) -> bool {
        matches!(self, Party::White | Party::Yellow)
    }
}

impl Display for Party {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing a string that names no known party.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown party '{0}'")]
pub struct UnknownParty(pub String);

impl FromStr for Party {
    type Err = UnknownParty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Party::ALL
            .into_iter()
            .find(|party| party.name() == s)
            .ok_or_else(|| UnknownParty(s.to_string()))
    }
}

impl From<Party> for Bson {
    fn from(party: Party) -> Self {
        to_bson(&party).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_exact() {
        for party in Party::ALL {
            assert_eq!(party.name().parse::<Party>(), Ok(party));
        }
        assert!("red".parse::<Party>().is_err());
        assert!("Blue".parse::<Party>().is_err());
        assert!("".parse::<Party>().is_err());
    }

    #[test]
    fn unknown_party_names_the_input() {
        let err = "Purple".parse::<Party>().unwrap_err();
        assert_eq!(err, UnknownParty("Purple".to_string()));
        assert_eq!(err.to_string(), "unknown party 'Purple'");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn serialises_as_name() {
        let json = rocket::serde::json::serde_json::to_string(&Party::Saffron).unwrap();
        assert_eq!(json, "\"Saffron\"");
        assert_eq!(Bson::from(Party::Green), Bson::String("Green".to_string()));
    }
}
