use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::{Point, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::area::ring_to_polygon;
use crate::processing::ADDRESS_PLACEHOLDER;
use crate::types::{BuildingKind, Category, ClassifiedBuilding, Coordinate};

pub fn popup_text(category: &Category, area_m2: f64, address: Option<&str>) -> String {
    format!(
        "Building Type: {}<br>Area: {:.2} m²<br>Address: {}",
        category,
        area_m2,
        address.unwrap_or(ADDRESS_PLACEHOLDER)
    )
}

#[derive(Debug, Clone)]
pub struct DrawnPolygon {
    pub category: Category,
    pub polygon: Polygon<f64>,
    pub color: &'static str,
    pub popup: String,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub label: &'static str,
    pub polygons: Vec<DrawnPolygon>,
    pub attached: bool,
    pub visible: bool,
}

impl Layer {
    fn empty(kind: BuildingKind) -> Self {
        Self {
            label: kind.label(),
            polygons: Vec::new(),
            attached: false,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub layer: BuildingKind,
    pub label: &'static str,
    pub polygons: usize,
    pub attached: bool,
    pub visible: bool,
}

// Where a drawn polygon lives: a named layer, or the ungrouped bin.
#[derive(Debug, Clone, Copy)]
struct Slot {
    layer: Option<BuildingKind>,
    position: usize,
    seq: usize,
}

struct DrawnEnvelope {
    slot: Slot,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for DrawnEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// The eight toggleable building layers plus the polygons that belong to none.
pub struct LayerSet {
    layers: BTreeMap<BuildingKind, Layer>,
    ungrouped: Vec<DrawnPolygon>,
    index: RTree<DrawnEnvelope>,
    drawn: usize,
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerSet {
    pub fn new() -> Self {
        let layers = BuildingKind::ALL
            .into_iter()
            .map(|kind| (kind, Layer::empty(kind)))
            .collect();
        Self {
            layers,
            ungrouped: Vec::new(),
            index: RTree::new(),
            drawn: 0,
        }
    }

    pub fn layer(&self, kind: BuildingKind) -> &Layer {
        &self.layers[&kind]
    }

    pub fn ungrouped(&self) -> &[DrawnPolygon] {
        &self.ungrouped
    }

    pub fn polygon_count(&self) -> usize {
        self.layers.values().map(|l| l.polygons.len()).sum::<usize>() + self.ungrouped.len()
    }

    /// Empties every bin. Attachment and visibility are left as they are.
    pub fn clear(&mut self) {
        for layer in self.layers.values_mut() {
            layer.polygons.clear();
        }
        self.ungrouped.clear();
        self.index = RTree::new();
        self.drawn = 0;
    }

    pub fn draw(&mut self, buildings: &[ClassifiedBuilding]) {
        let mut envelopes = Vec::with_capacity(buildings.len());
        for building in buildings {
            let polygon = ring_to_polygon(&building.footprint.ring);
            let drawn = DrawnPolygon {
                category: building.footprint.category.clone(),
                popup: popup_text(
                    &building.footprint.category,
                    building.area_m2,
                    building.address.as_deref(),
                ),
                color: building.style.color,
                polygon,
            };
            let bin = match building.style.layer {
                Some(kind) => &mut self.layers.entry(kind).or_insert_with(|| Layer::empty(kind)).polygons,
                None => &mut self.ungrouped,
            };
            let slot = Slot {
                layer: building.style.layer,
                position: bin.len(),
                seq: self.drawn,
            };
            if let Some(rect) = drawn.polygon.bounding_rect() {
                envelopes.push(DrawnEnvelope {
                    slot,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                });
            }
            bin.push(drawn);
            self.drawn += 1;
        }
        for envelope in envelopes {
            self.index.insert(envelope);
        }
    }

    pub fn attach_all(&mut self) {
        for layer in self.layers.values_mut() {
            layer.attached = true;
        }
    }

    /// clear, draw, then attach every layer.
    pub fn render(&mut self, buildings: &[ClassifiedBuilding]) {
        self.clear();
        self.draw(buildings);
        self.attach_all();
        tracing::debug!("Rendered {} polygons", self.polygon_count());
    }

    pub fn set_visible(&mut self, kind: BuildingKind, visible: bool) {
        if let Some(layer) = self.layers.get_mut(&kind) {
            layer.visible = visible;
        }
    }

    fn is_shown(&self, layer: Option<BuildingKind>) -> bool {
        match layer {
            Some(kind) => self.layers.get(&kind).is_some_and(|l| l.attached && l.visible),
            None => true,
        }
    }

    fn polygon_at(&self, slot: Slot) -> Option<&DrawnPolygon> {
        match slot.layer {
            Some(kind) => self.layers.get(&kind)?.polygons.get(slot.position),
            None => self.ungrouped.get(slot.position),
        }
    }

    /// Popup of the topmost shown polygon under `at`.
    pub fn building_at(&self, at: Coordinate) -> Option<&DrawnPolygon> {
        let point = Point::new(at.lon, at.lat);
        let envelope = AABB::from_point([at.lon, at.lat]);
        self.index
            .locate_in_envelope_intersecting(&envelope)
            .filter(|candidate| self.is_shown(candidate.slot.layer))
            .filter_map(|candidate| {
                let drawn = self.polygon_at(candidate.slot)?;
                drawn.polygon.contains(&point).then_some((candidate.slot.seq, drawn))
            })
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, drawn)| drawn)
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|(kind, layer)| LayerSummary {
                layer: *kind,
                label: layer.label,
                polygons: layer.polygons.len(),
                attached: layer.attached,
                visible: layer.visible,
            })
            .collect()
    }

    /// Every polygon currently shown on the map, hidden layers left out.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for (kind, layer) in &self.layers {
            if !self.is_shown(Some(*kind)) {
                continue;
            }
            features.extend(layer.polygons.iter().map(|p| to_feature(p, Some(*kind))));
        }
        features.extend(self.ungrouped.iter().map(|p| to_feature(p, None)));
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn to_feature(drawn: &DrawnPolygon, layer: Option<BuildingKind>) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("category".into(), JsonValue::from(drawn.category.to_string()));
    properties.insert("color".into(), JsonValue::from(drawn.color));
    properties.insert(
        "layer".into(),
        layer.map_or(JsonValue::Null, |kind| JsonValue::from(kind.tag())),
    );
    properties.insert("popup".into(), JsonValue::from(drawn.popup.clone()));
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&drawn.polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::style_for;
    use crate::types::BuildingFootprint;

    fn building(tag: &str, lat: f64, area_m2: f64, address: Option<&str>) -> ClassifiedBuilding {
        let category = Category::from_tag(tag);
        ClassifiedBuilding {
            style: style_for(&category),
            footprint: BuildingFootprint {
                category,
                ring: vec![
                    Coordinate::new(lat, 0.0),
                    Coordinate::new(lat, 0.001),
                    Coordinate::new(lat + 0.001, 0.001),
                    Coordinate::new(lat + 0.001, 0.0),
                ],
            },
            area_m2,
            address: address.map(str::to_string),
        }
    }

    #[test]
    fn house_popup() {
        let popup = popup_text(&Category::from_tag("house"), 120.5, Some("1 Main St"));
        assert_eq!(popup, "Building Type: house<br>Area: 120.50 m²<br>Address: 1 Main St");
        assert!(popup_text(&Category::from_tag("office"), 3.14159, None)
            .ends_with("Area: 3.14 m²<br>Address: Address not found"));
    }

    #[test]
    fn buildings_land_in_their_layers() {
        let mut layers = LayerSet::new();
        layers.render(&[
            building("house", 1.0, 120.5, None),
            building("school", 2.0, 900.0, None),
            building("house", 3.0, 80.0, None),
            building("greenhouse", 4.0, 300.0, None),
        ]);
        assert_eq!(layers.layer(BuildingKind::House).polygons.len(), 2);
        assert_eq!(layers.layer(BuildingKind::House).polygons[0].color, "blue");
        assert_eq!(layers.layer(BuildingKind::School).polygons.len(), 1);
        assert_eq!(layers.ungrouped().len(), 1);
        assert_eq!(layers.ungrouped()[0].color, "gray");
        assert_eq!(layers.polygon_count(), 4);
        assert!(BuildingKind::ALL.iter().all(|k| layers.layer(*k).attached));
    }

    #[test]
    fn rendering_replaces_the_previous_result() {
        let mut layers = LayerSet::new();
        layers.render(&[building("house", 1.0, 100.0, None), building("retail", 2.0, 100.0, None)]);
        layers.render(&[building("office", 3.0, 100.0, None)]);
        assert_eq!(layers.polygon_count(), 1);
        assert!(layers.layer(BuildingKind::House).polygons.is_empty());
        assert!(layers.building_at(Coordinate::new(1.0005, 0.0005)).is_none());
    }

    #[test]
    fn empty_render_leaves_every_layer_empty() {
        let mut layers = LayerSet::new();
        layers.render(&[building("house", 1.0, 100.0, None)]);
        layers.clear();
        layers.clear();
        layers.render(&[]);
        for kind in BuildingKind::ALL {
            assert!(layers.layer(kind).polygons.is_empty());
        }
        assert!(layers.ungrouped().is_empty());
        assert!(layers.to_feature_collection().features.is_empty());
    }

    #[test]
    fn hidden_layers_drop_out_of_the_export_and_the_point_query() {
        let mut layers = LayerSet::new();
        layers.render(&[
            building("house", 1.0, 100.0, Some("A")),
            building("industrial", 2.0, 100.0, Some("B")),
        ]);
        assert_eq!(layers.to_feature_collection().features.len(), 2);

        layers.set_visible(BuildingKind::House, false);
        let collection = layers.to_feature_collection();
        assert_eq!(collection.features.len(), 1);
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["layer"], "industrial");
        assert_eq!(properties["color"], "brown");
        assert!(layers.building_at(Coordinate::new(1.0005, 0.0005)).is_none());

        layers.set_visible(BuildingKind::House, true);
        let hit = layers.building_at(Coordinate::new(1.0005, 0.0005)).unwrap();
        assert!(hit.popup.ends_with("Address: A"));
    }

    #[test]
    fn point_query_needs_attached_layers() {
        let mut layers = LayerSet::new();
        layers.draw(&[building("house", 1.0, 100.0, None)]);
        assert!(layers.building_at(Coordinate::new(1.0005, 0.0005)).is_none());
        layers.attach_all();
        layers.attach_all();
        assert!(layers.building_at(Coordinate::new(1.0005, 0.0005)).is_some());
        assert!(layers.building_at(Coordinate::new(5.0, 5.0)).is_none());
    }
}
