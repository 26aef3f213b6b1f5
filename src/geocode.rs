use std::future::Future;

use reqwest::Client;
use serde::Deserialize;

use crate::client::{read_body, Limiter};
use crate::error::FetchError;
use crate::types::Coordinate;

/// Address lookups in both directions.
pub trait Geocoder: Send + Sync {
    /// First matching coordinate, `None` when the service has no candidates.
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<Coordinate>, FetchError>> + Send;

    /// Display name at a coordinate, `None` when the service has nothing.
    fn reverse_geocode(
        &self,
        at: Coordinate,
    ) -> impl Future<Output = Result<Option<String>, FetchError>> + Send;
}

// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct SearchCandidate {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReversePlace {
    display_name: Option<String>,
}

pub fn parse_search_response(body: &str) -> Result<Option<Coordinate>, FetchError> {
    let candidates: Vec<SearchCandidate> = serde_json::from_str(body)?;
    let Some(first) = candidates.first() else {
        return Ok(None);
    };
    let lat = first
        .lat
        .trim()
        .parse::<f64>()
        .map_err(|e| FetchError::Malformed(format!("latitude {:?}: {}", first.lat, e)))?;
    let lon = first
        .lon
        .trim()
        .parse::<f64>()
        .map_err(|e| FetchError::Malformed(format!("longitude {:?}: {}", first.lon, e)))?;
    Ok(Some(Coordinate::new(lat, lon)))
}

pub fn parse_reverse_response(body: &str) -> Result<Option<String>, FetchError> {
    let place: ReversePlace = serde_json::from_str(body)?;
    Ok(place.display_name.filter(|name| !name.trim().is_empty()))
}

pub struct NominatimClient {
    client: Client,
    base_url: String,
    limiter: Limiter,
}

impl NominatimClient {
    pub fn new(client: Client, base_url: impl Into<String>, limiter: Limiter) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter,
        }
    }
}

impl Geocoder for NominatimClient {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, FetchError> {
        self.limiter.until_ready().await;
        tracing::debug!("Geocoding {:?}", address);
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", address)])
            .send()
            .await?;
        parse_search_response(&read_body(response).await?)
    }

    async fn reverse_geocode(&self, at: Coordinate) -> Result<Option<String>, FetchError> {
        self.limiter.until_ready().await;
        let lat = at.lat.to_string();
        let lon = at.lon.to_string();
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("format", "json"), ("lat", lat.as_str()), ("lon", lon.as_str())])
            .send()
            .await?;
        parse_reverse_response(&read_body(response).await?)
    }
}
