use serde::{Deserialize, Serialize};
use std::fmt;

use crate::style::CategoryStyle;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    // geo works in x = lon, y = lat
    pub fn to_geo(self) -> geo::Coord<f64> {
        geo::Coord { x: self.lon, y: self.lat }
    }
}

/// The building types that get their own colour and toggleable layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    House,
    Apartments,
    Government,
    Commercial,
    School,
    Office,
    Retail,
    Industrial,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 8] = [
        BuildingKind::House,
        BuildingKind::Apartments,
        BuildingKind::Government,
        BuildingKind::Commercial,
        BuildingKind::School,
        BuildingKind::Office,
        BuildingKind::Retail,
        BuildingKind::Industrial,
    ];

    /// Value of the OSM `building=*` tag.
    pub fn tag(self) -> &'static str {
        match self {
            BuildingKind::House => "house",
            BuildingKind::Apartments => "apartments",
            BuildingKind::Government => "government",
            BuildingKind::Commercial => "commercial",
            BuildingKind::School => "school",
            BuildingKind::Office => "office",
            BuildingKind::Retail => "retail",
            BuildingKind::Industrial => "industrial",
        }
    }

    /// Name shown in the legend and the layer control.
    pub fn label(self) -> &'static str {
        match self {
            BuildingKind::House => "House",
            BuildingKind::Apartments => "Apartment",
            BuildingKind::Government => "Government",
            BuildingKind::Commercial => "Commercial",
            BuildingKind::School => "School",
            BuildingKind::Office => "Office",
            BuildingKind::Retail => "Retail",
            BuildingKind::Industrial => "Industrial",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Known(BuildingKind),
    // Raw tag value of anything outside the table, e.g. "greenhouse"
    Other(String),
}

impl Category {
    pub fn from_tag(tag: &str) -> Self {
        match BuildingKind::from_tag(tag) {
            Some(kind) => Category::Known(kind),
            None => Category::Other(tag.to_string()),
        }
    }

    pub fn kind(&self) -> Option<BuildingKind> {
        match self {
            Category::Known(kind) => Some(*kind),
            Category::Other(_) => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Known(kind) => f.write_str(kind.tag()),
            Category::Other(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingFootprint {
    pub category: Category,
    // Closing vertex may or may not be repeated.
    pub ring: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBuilding {
    pub footprint: BuildingFootprint,
    pub area_m2: f64,
    pub style: CategoryStyle,
    pub address: Option<String>,
}
