//! Statistiques d'une couche GeoJSON

use std::collections::BTreeMap;

use empietement::Envelope;
use geojson::{FeatureCollection, Value};
use serde::Serialize;

/// Résumé d'une couche : nombre de features, types de géométrie, emprise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStats {
    pub total_features: usize,
    pub geometry_types: BTreeMap<String, usize>,
    pub bounds: Option<Envelope>,
}

impl LayerStats {
    pub fn of(collection: &FeatureCollection) -> Self {
        let mut geometry_types = BTreeMap::new();
        let mut bounds: Option<Envelope> = None;

        for feature in &collection.features {
            let type_name = feature
                .geometry
                .as_ref()
                .map_or("unknown", |g| geometry_type(&g.value));
            *geometry_types.entry(type_name.to_string()).or_insert(0) += 1;

            let envelope = feature
                .geometry
                .as_ref()
                .and_then(|g| geo::Geometry::<f64>::try_from(g.value.clone()).ok())
                .and_then(|g| Envelope::of(&g));
            if let Some(e) = envelope {
                bounds = Some(bounds.map_or(e, |b| b.extend(e)));
            }
        }

        Self {
            total_features: collection.features.len(),
            geometry_types,
            bounds,
        }
    }

    /// Centre `[lng, lat]` de l'emprise
    pub fn center(&self) -> Option<[f64; 2]> {
        self.bounds.map(|b| b.center())
    }
}

fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
