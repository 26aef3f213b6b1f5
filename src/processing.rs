use futures::stream::{self, StreamExt};
use rayon::prelude::*;

use crate::area::ring_area_m2;
use crate::geocode::Geocoder;
use crate::style::style_for;
use crate::types::{BuildingFootprint, ClassifiedBuilding};

pub const ADDRESS_PLACEHOLDER: &str = "Address not found";

#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub resolve_addresses: bool,
    /// Reverse geocodes in flight at once; 1 keeps them sequential.
    pub reverse_geocode_concurrency: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            resolve_addresses: true,
            reverse_geocode_concurrency: 1,
        }
    }
}

/// Footprints whose area is strictly above `min_area`, paired with that area.
/// Fetch order is kept.
pub fn filter_by_area(footprints: Vec<BuildingFootprint>, min_area: f64) -> Vec<(BuildingFootprint, f64)> {
    footprints
        .into_par_iter()
        .map(|footprint| {
            let area = ring_area_m2(&footprint.ring);
            (footprint, area)
        })
        .filter(|(_, area)| *area > min_area)
        .collect()
}

async fn resolve_address<G: Geocoder>(geocoder: &G, footprint: &BuildingFootprint) -> String {
    let Some(&first) = footprint.ring.first() else {
        return ADDRESS_PLACEHOLDER.to_string();
    };
    match geocoder.reverse_geocode(first).await {
        Ok(Some(name)) => name,
        Ok(None) => ADDRESS_PLACEHOLDER.to_string(),
        Err(e) => {
            tracing::warn!("Reverse geocode at ({}, {}) failed: {}", first.lat, first.lon, e);
            ADDRESS_PLACEHOLDER.to_string()
        }
    }
}

pub async fn classify_buildings<G: Geocoder>(
    geocoder: &G,
    footprints: Vec<BuildingFootprint>,
    min_area: f64,
    options: &ClassifyOptions,
) -> Vec<ClassifiedBuilding> {
    let total = footprints.len();
    let accepted = filter_by_area(footprints, min_area);
    tracing::info!("{} of {} footprints are larger than {} m²", accepted.len(), total, min_area);

    let addresses: Vec<Option<String>> = if options.resolve_addresses {
        let lookups: Vec<_> = accepted
            .iter()
            .map(|(footprint, _)| resolve_address(geocoder, footprint))
            .collect();
        stream::iter(lookups)
            .buffered(options.reverse_geocode_concurrency.max(1))
            .map(Some)
            .collect()
            .await
    } else {
        vec![None; accepted.len()]
    };

    accepted
        .into_iter()
        .zip(addresses)
        .map(|((footprint, area_m2), address)| ClassifiedBuilding {
            style: style_for(&footprint.category),
            footprint,
            area_m2,
            address,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::style::DEFAULT_STYLE;
    use crate::types::{BuildingKind, Category, Coordinate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers reverse lookups from the latitude of the first vertex.
    #[derive(Default)]
    pub(crate) struct FakeGeocoder {
        pub(crate) forward: Option<Coordinate>,
        pub(crate) fail_reverse_below_lat: Option<f64>,
        pub(crate) forward_calls: AtomicUsize,
        pub(crate) reverse_calls: AtomicUsize,
    }

    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Option<Coordinate>, FetchError> {
            self.forward_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.forward)
        }

        async fn reverse_geocode(&self, at: Coordinate) -> Result<Option<String>, FetchError> {
            self.reverse_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_reverse_below_lat {
                Some(limit) if at.lat < limit => Err(FetchError::Status {
                    status: 503,
                    body: "overloaded".into(),
                }),
                _ if at.lat == 0.0 => Ok(None),
                _ => Ok(Some(format!("{} Test Street", at.lat))),
            }
        }
    }

    pub(crate) fn square(tag: &str, lat: f64, side_deg: f64) -> BuildingFootprint {
        BuildingFootprint {
            category: Category::from_tag(tag),
            ring: vec![
                Coordinate::new(lat, 0.0),
                Coordinate::new(lat, side_deg),
                Coordinate::new(lat + side_deg, side_deg),
                Coordinate::new(lat + side_deg, 0.0),
            ],
        }
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn classification_future_is_send() {
        let geocoder = FakeGeocoder::default();
        let options = ClassifyOptions::default();
        assert_send(classify_buildings(&geocoder, vec![square("house", 1.0, 0.001)], 0.0, &options));
    }

    #[test]
    fn area_equal_to_threshold_is_excluded() {
        let footprint = square("house", 1.0, 0.001);
        let exact = ring_area_m2(&footprint.ring);
        assert!(filter_by_area(vec![footprint.clone()], exact).is_empty());
        assert_eq!(filter_by_area(vec![footprint], exact - 1e-6).len(), 1);
    }

    #[test]
    fn filtering_keeps_fetch_order() {
        let footprints = vec![
            square("office", 1.0, 0.002),
            square("house", 2.0, 0.0001),
            square("school", 3.0, 0.003),
            square("retail", 4.0, 0.001),
        ];
        let kept: Vec<_> = filter_by_area(footprints, 5000.0)
            .into_iter()
            .map(|(f, _)| f.category.to_string())
            .collect();
        assert_eq!(kept, ["office", "school", "retail"]);
    }

    #[tokio::test]
    async fn survivors_get_style_and_address() {
        let geocoder = FakeGeocoder::default();
        let footprints = vec![
            square("house", 1.0, 0.001),
            square("house", 2.0, 0.00001),
            square("greenhouse", 3.0, 0.001),
        ];
        let classified =
            classify_buildings(&geocoder, footprints, 50.0, &ClassifyOptions::default()).await;

        assert_eq!(classified.len(), 2);
        assert_eq!(classified[0].style.color, "blue");
        assert_eq!(classified[0].style.layer, Some(BuildingKind::House));
        assert_eq!(classified[0].address.as_deref(), Some("1 Test Street"));
        assert_eq!(classified[1].style, DEFAULT_STYLE);
        assert_eq!(classified[1].footprint.category.to_string(), "greenhouse");
        // one lookup per survivor only
        assert_eq!(geocoder.reverse_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reverse_geocode_failures_degrade_to_placeholder() {
        let geocoder = FakeGeocoder {
            fail_reverse_below_lat: Some(2.0),
            ..Default::default()
        };
        let footprints = vec![
            square("school", 1.0, 0.001),
            square("office", 0.0, 0.001),
            square("retail", 5.0, 0.001),
        ];
        let options = ClassifyOptions {
            resolve_addresses: true,
            reverse_geocode_concurrency: 3,
        };
        let classified = classify_buildings(&geocoder, footprints, 0.0, &options).await;

        let addresses: Vec<_> = classified.iter().map(|c| c.address.as_deref()).collect();
        assert_eq!(
            addresses,
            [Some(ADDRESS_PLACEHOLDER), Some(ADDRESS_PLACEHOLDER), Some("5 Test Street")]
        );
    }

    #[tokio::test]
    async fn address_resolution_can_be_switched_off() {
        let geocoder = FakeGeocoder::default();
        let options = ClassifyOptions {
            resolve_addresses: false,
            ..Default::default()
        };
        let classified =
            classify_buildings(&geocoder, vec![square("house", 1.0, 0.001)], 0.0, &options).await;
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].address, None);
        assert_eq!(geocoder.reverse_calls.load(Ordering::SeqCst), 0);
    }
}
