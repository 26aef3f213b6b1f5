use serde::Serialize;

use crate::types::{BuildingKind, Category};

/// Display colour and target layer for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStyle {
    pub color: &'static str,
    /// `None` means the polygon is drawn outside every toggleable layer.
    pub layer: Option<BuildingKind>,
}

pub const DEFAULT_STYLE: CategoryStyle = CategoryStyle {
    color: "gray",
    layer: None,
};

// Indexed by `BuildingKind::index`, same order as `BuildingKind::ALL`.
const COLORS: [&str; 8] = [
    "blue",   // house
    "green",  // apartments
    "red",    // government
    "purple", // commercial
    "orange", // school
    "yellow", // office
    "pink",   // retail
    "brown",  // industrial
];

pub fn style_for_kind(kind: BuildingKind) -> CategoryStyle {
    CategoryStyle {
        color: COLORS[kind.index()],
        layer: Some(kind),
    }
}

pub fn style_for(category: &Category) -> CategoryStyle {
    category.kind().map(style_for_kind).unwrap_or(DEFAULT_STYLE)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LegendEntry {
    pub layer: BuildingKind,
    pub label: &'static str,
    pub color: &'static str,
}

pub fn legend() -> Vec<LegendEntry> {
    BuildingKind::ALL
        .into_iter()
        .map(|kind| LegendEntry {
            layer: kind,
            label: kind.label(),
            color: style_for_kind(kind).color,
        })
        .collect()
}
