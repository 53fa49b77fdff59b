use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::Result,
    map::{geocode::Geocoder, markers_for, MapStatus, Marker},
    model::common::{
        coords::{valid_latitude, valid_longitude, Coords},
        validation::ValidationErrors,
    },
    store::VoterRepository,
};

pub fn routes() -> Vec<Route> {
    routes![get_map_config, get_markers, reverse_geocode]
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct GeocodedAddress {
    address: Option<String>,
}

#[get("/map/config")]
fn get_map_config(config: &State<Config>) -> Json<MapStatus> {
    Json(config.map_status())
}

#[get("/map/markers")]
async fn get_markers(voters: &State<VoterRepository>) -> Result<Json<Vec<Marker>>> {
    let records = voters.list().await?;
    Ok(Json(markers_for(&records)))
}

#[get("/map/geocode?<lat>&<lng>")]
async fn reverse_geocode(
    lat: f64,
    lng: f64,
    geocoder: &State<Geocoder>,
) -> Result<Json<GeocodedAddress>> {
    let mut errors = ValidationErrors::new();
    if !valid_latitude(lat) {
        errors.add("lat", "Latitude must be between -90 and 90.");
    }
    if !valid_longitude(lng) {
        errors.add("lng", "Longitude must be between -180 and 180.");
    }
    let coords = errors.into_result(Coords::new(lat, lng))?;

    let address = geocoder.reverse(coords).await?;
    Ok(Json(GeocodedAddress { address }))
}
