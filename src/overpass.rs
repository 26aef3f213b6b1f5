use std::fmt::Write as _;
use std::future::Future;

use reqwest::Client;
use serde::Deserialize;

use crate::client::read_body;
use crate::error::FetchError;
use crate::types::{BuildingFootprint, BuildingKind, Category, Coordinate};

/// Source of raw building footprints around a point.
pub trait BuildingSource: Send + Sync {
    fn fetch_buildings(
        &self,
        center: Coordinate,
        radius_m: f64,
    ) -> impl Future<Output = Result<Vec<BuildingFootprint>, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    geometry: Vec<OverpassPoint>,
    tags: OverpassTags,
}

#[derive(Debug, Deserialize)]
struct OverpassPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OverpassTags {
    building: String,
}

/// One union query for every enumerated building type around `center`.
pub fn building_query(center: Coordinate, radius_m: f64) -> String {
    let mut query = String::from("[out:json];\n(\n");
    for kind in BuildingKind::ALL {
        let _ = writeln!(
            query,
            "  way(around:{},{},{})[building={}];",
            radius_m,
            center.lat,
            center.lon,
            kind.tag()
        );
    }
    query.push_str(");\nout geom;\n");
    query
}

pub fn parse_buildings(body: &str) -> Result<Vec<BuildingFootprint>, FetchError> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    Ok(response
        .elements
        .into_iter()
        .map(|element| BuildingFootprint {
            category: Category::from_tag(&element.tags.building),
            ring: element
                .geometry
                .into_iter()
                .map(|p| Coordinate::new(p.lat, p.lon))
                .collect(),
        })
        .collect())
}

fn check_request(center: Coordinate, radius_m: f64) -> Result<(), FetchError> {
    if !center.is_valid() {
        return Err(FetchError::InvalidRequest(format!(
            "center ({}, {}) is not a WGS84 coordinate",
            center.lat, center.lon
        )));
    }
    if !(radius_m.is_finite() && radius_m > 0.0) {
        return Err(FetchError::InvalidRequest(format!(
            "radius must be positive, got {}",
            radius_m
        )));
    }
    Ok(())
}

pub struct OverpassClient {
    client: Client,
    url: String,
}

impl OverpassClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl BuildingSource for OverpassClient {
    async fn fetch_buildings(
        &self,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Vec<BuildingFootprint>, FetchError> {
        check_request(center, radius_m)?;
        let query = building_query(center, radius_m);
        tracing::debug!("Overpass query:\n{}", query);

        let response = self
            .client
            .get(&self.url)
            .query(&[("data", query.as_str())])
            .send()
            .await?;
        let buildings = parse_buildings(&read_body(response).await?)?;
        tracing::info!(
            "Overpass returned {} footprints within {} m of ({}, {})",
            buildings.len(),
            radius_m,
            center.lat,
            center.lon
        );
        Ok(buildings)
    }
}
