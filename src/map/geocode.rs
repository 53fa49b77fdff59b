use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::common::coords::Coords;

/// Google's JSON reverse-geocoding endpoint.
pub const DEFAULT_GEOCODING_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body of the geocoding API. Only the fields we read are modelled.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

/// Pick the best address out of a geocoding response.
/// `ZERO_RESULTS` is not an error, just an unnamed spot.
fn first_address(response: GeocodeResponse) -> Result<Option<String>> {
    match response.status.as_str() {
        "OK" => Ok(response
            .results
            .into_iter()
            .next()
            .map(|r| r.formatted_address)),
        "ZERO_RESULTS" => Ok(None),
        status => Err(Error::Geocoding(match response.error_message {
            Some(message) => format!("{status}: {message}"),
            None => status.to_string(),
        })),
    }
}

/// Turns coordinates into a human-readable address via the map provider.
#[derive(Debug, Clone)]
pub struct Geocoder {
    provider: Option<Provider>,
}

#[derive(Debug, Clone)]
struct Provider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl Geocoder {
    /// A geocoder that queries `endpoint` with `api_key`.
    /// Fails if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, api_key: String) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            provider: Some(Provider {
                client,
                endpoint: endpoint.into(),
                api_key,
            }),
        })
    }

    /// A geocoder with no key, which never resolves anything.
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Look up the address at `coords`. Yields `None` when geocoding is
    /// disabled or the provider knows no address there.
    pub async fn reverse(&self, coords: Coords) -> Result<Option<String>> {
        let Some(provider) = &self.provider else {
            debug!("Geocoding disabled, not resolving {coords}");
            return Ok(None);
        };

        let response: GeocodeResponse = provider
            .client
            .get(&provider.endpoint)
            .query(&[
                ("latlng", coords.to_string()),
                ("key", provider.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        first_address(response).map_err(|err| {
            warn!("Reverse geocoding of {coords} failed: {err}");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::serde::json::serde_json;

    fn parse(json: &str) -> Result<Option<String>> {
        first_address(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn takes_first_result() {
        let address = parse(
            r#"{
                "status": "OK",
                "results": [
                    {"formatted_address": "123 Main St, Los Angeles, CA", "place_id": "x"},
                    {"formatted_address": "Los Angeles, CA"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(address.as_deref(), Some("123 Main St, Los Angeles, CA"));
    }

    #[test]
    fn zero_results_is_no_address() {
        assert_eq!(parse(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap(), None);
    }

    #[test]
    fn provider_errors_are_reported() {
        let err = parse(r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Geocoding(ref msg) if msg == "REQUEST_DENIED: bad key"));
        assert_eq!(err.status(), rocket::http::Status::BadGateway);
    }

    #[rocket::async_test]
    async fn disabled_geocoder_resolves_nothing() {
        let geocoder = Geocoder::disabled();
        assert!(!geocoder.is_enabled());
        assert_eq!(
            geocoder.reverse(Coords::new(34.05, -118.25)).await.unwrap(),
            None
        );
    }

    #[test]
    fn keyed_geocoder_is_enabled() {
        let geocoder = Geocoder::new("http://localhost:9/geocode", "abc123".to_string()).unwrap();
        assert!(geocoder.is_enabled());
        let provider = geocoder.provider.unwrap();
        assert_eq!(provider.endpoint, "http://localhost:9/geocode");
        assert_eq!(provider.api_key, "abc123");
    }
}
