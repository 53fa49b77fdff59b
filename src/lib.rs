#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod map;
pub mod model;
pub mod store;

/// Assemble the server from `Rocket.toml` and `ROCKET_*` environment
/// variables. Config and store setup happen when the rocket ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", error::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// A rocket serving the given repository with default configuration,
/// unaffected by `Rocket.toml` or the environment.
#[cfg(test)]
pub(crate) fn rocket_for_repository(repository: store::VoterRepository) -> Rocket<Build> {
    let figment = rocket::figment::Figment::from(rocket::Config::default());
    rocket::custom(figment)
        .mount("/", api::routes())
        .register("/", error::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(repository)
}
