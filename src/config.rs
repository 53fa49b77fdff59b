use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::map::{
    geocode::{Geocoder, DEFAULT_GEOCODING_URL},
    MapStatus,
};
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MemoryVoterStore, MongoVoterStore, VoterRepository};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_geocoding_url")]
    geocoding_url: String,
    // secrets
    #[serde(default)]
    maps_api_key: Option<String>,
}

fn default_geocoding_url() -> String {
    DEFAULT_GEOCODING_URL.to_string()
}

impl Config {
    /// Browser key for the map provider, if one is configured.
    pub fn maps_api_key(&self) -> Option<&str> {
        self.maps_api_key.as_deref()
    }

    /// Endpoint used for reverse geocoding.
    pub fn geocoding_url(&self) -> &str {
        &self.geocoding_url
    }

    /// Whether the map can be shown, and if not, why.
    pub fn map_status(&self) -> MapStatus {
        MapStatus::from_api_key(self.maps_api_key())
    }

    /// A geocoder using the configured endpoint. Disabled unless the map
    /// provider is usable.
    pub fn geocoder(&self) -> reqwest::Result<Geocoder> {
        match self.map_status() {
            MapStatus::Ready { api_key } => Geocoder::new(&self.geocoding_url, api_key),
            MapStatus::ConfigurationError { .. } => Ok(Geocoder::disabled()),
        }
    }
}

/// A fairing that loads the application config and puts it, along with a
/// [`Geocoder`] built from it, in managed state.
/// A missing map key is reported but does not stop launch.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let MapStatus::ConfigurationError { message } = config.map_status() {
            warn!("{message}");
        }

        let geocoder = match config.geocoder() {
            Ok(geocoder) => geocoder,
            Err(e) => {
                error!("Failed to build the geocoding client: {e}");
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config).manage(geocoder);
        Ok(rocket)
    }
}

/// Which backend holds the voter records.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for the voter store.
#[derive(Debug, Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default)]
    seed_demo_data: bool,
    // secrets
    db_uri: Option<String>,
}

fn default_db_name() -> String {
    "votemap".to_string()
}

/// A fairing that loads the store config, connects to the chosen backend,
/// performs any setup necessary, and places a [`VoterRepository`] into
/// managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voter store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let repository = match config.store {
            StoreKind::Memory => {
                info!("Using in-memory voter store; records will not survive a restart");
                if config.seed_demo_data {
                    VoterRepository::new(MemoryVoterStore::with_demo_data())
                } else {
                    VoterRepository::in_memory()
                }
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when using the mongodb store");
                    return Err(rocket);
                };
                if config.seed_demo_data {
                    warn!("`seed_demo_data` only applies to the memory store, ignoring");
                }
                info!("Loaded database config, connecting...");
                // Construct the connection.
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name(&config.db_name));

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                info!("...database connection online!");
                VoterRepository::new(MongoVoterStore::new(&db))
            }
        };

        // Manage the state.
        Ok(rocket.manage(repository))
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name(configured: &str) -> String {
    configured.to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name(configured: &str) -> String {
    let random: u32 = rand::random();
    let db = format!("{configured}_test{random}");
    info!("Using database {db}");
    db
}
