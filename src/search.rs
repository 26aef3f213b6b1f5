use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::{build_http_client, geocode_limiter};
use crate::config::AppConfig;
use crate::error::SearchError;
use crate::geocode::{Geocoder, NominatimClient};
use crate::overpass::{BuildingSource, OverpassClient};
use crate::processing::{classify_buildings, ClassifyOptions};
use crate::types::{ClassifiedBuilding, Coordinate};

/// One form submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub address: String,
    pub min_area: f64,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.address.trim().is_empty() {
            return Err(SearchError::InvalidInput("Please enter an address.".to_string()));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(SearchError::InvalidInput(
                "Minimum area must be a non-negative number.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub center: Coordinate,
    pub fetched: usize,
    /// May be empty when nothing passed the area filter.
    pub buildings: Vec<ClassifiedBuilding>,
}

pub struct SearchPipeline<G, B> {
    geocoder: G,
    source: B,
    radius_m: f64,
    options: ClassifyOptions,
}

impl SearchPipeline<NominatimClient, OverpassClient> {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_http_client(&config.services).context("Failed to build HTTP client")?;
        let limiter = geocode_limiter(config.services.geocode_requests_per_second);
        Ok(Self::new(
            NominatimClient::new(client.clone(), &config.services.nominatim_url, limiter),
            OverpassClient::new(client, &config.services.overpass_url),
            config.search.radius_m,
            ClassifyOptions {
                resolve_addresses: config.search.resolve_addresses,
                reverse_geocode_concurrency: config.search.reverse_geocode_concurrency,
            },
        ))
    }
}

impl<G: Geocoder, B: BuildingSource> SearchPipeline<G, B> {
    pub fn new(geocoder: G, source: B, radius_m: f64, options: ClassifyOptions) -> Self {
        Self {
            geocoder,
            source,
            radius_m,
            options,
        }
    }

    /// Validates the request and resolves its address.
    pub async fn locate(&self, request: &SearchRequest) -> Result<Coordinate, SearchError> {
        request.validate()?;

        let center = self
            .geocoder
            .geocode(request.address.trim())
            .await?
            .ok_or(SearchError::AddressNotFound)?;
        tracing::info!("{:?} resolved to ({}, {})", request.address, center.lat, center.lon);
        Ok(center)
    }

    /// Fetches and classifies the buildings around an already located centre.
    pub async fn survey(
        &self,
        center: Coordinate,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, SearchError> {
        let footprints = self.source.fetch_buildings(center, self.radius_m).await?;
        if footprints.is_empty() {
            return Err(SearchError::NoBuildingsFound);
        }
        let fetched = footprints.len();

        let buildings =
            classify_buildings(&self.geocoder, footprints, request.min_area, &self.options).await;

        Ok(SearchOutcome {
            center,
            fetched,
            buildings,
        })
    }

    /// geocode, fetch, classify. The first failing stage ends the search.
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let center = self.locate(request).await?;
        self.survey(center, request).await
    }
}
