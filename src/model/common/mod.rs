//! Types shared between the API and DB representations.

pub mod coords;
pub mod party;
pub mod validation;
