//! Geocoder backed by an OpenStreetMap Nominatim search endpoint.

use haven_data_processing::Coordinates;
use reqwest::{Client, StatusCode, header::ACCEPT_LANGUAGE};
use serde::Deserialize;
use tracing::{instrument, trace};

use super::{GeocodeError, Geocoder};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying user agent.
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: NOMINATIM_URL.to_string(),
            user_agent: concat!("haven/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    config: NominatimConfig,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &NominatimConfig {
        &self.config
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

impl Geocoder for NominatimGeocoder {
    #[instrument(name = "Nominatim search", skip(self), level = "debug")]
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .client
            .get(self.search_url())
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .header(ACCEPT_LANGUAGE, &self.config.accept_language)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        let body = response.error_for_status()?.text().await?;
        trace!(bytes = body.len(), "Nominatim response received");
        parse_search_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Parse the JSON array returned by `/search?format=json`, taking the first hit.
fn parse_search_response(body: &str) -> Result<Coordinates, GeocodeError> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
    let hit = hits.into_iter().next().ok_or(GeocodeError::NoMatch)?;

    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| GeocodeError::InvalidResponse(format!("{value:?}: {e}")))
    };
    let coordinates = Coordinates::new(parse(&hit.lat)?, parse(&hit.lon)?);
    if coordinates.is_valid() {
        Ok(coordinates)
    } else {
        Err(GeocodeError::InvalidResponse(format!(
            "coordinates out of range: {coordinates}"
        )))
    }
}
