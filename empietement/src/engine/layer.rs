//! Couche de référence préparée pour l'analyse (union précalculée)

use geo::{BooleanOps, BoundingRect, Geometry, MultiPolygon, Polygon, Rect};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Couche réglementaire dont toutes les surfaces sont fusionnées
#[derive(Debug, Clone)]
pub struct ReferenceLayer {
    /// Clé de la couche dans le résultat (aif, dpm, ...)
    pub key: String,
    /// Union des polygones de la couche, dans le système projeté de la parcelle
    pub footprint: MultiPolygon,
    /// Emprise de l'union, pour écarter vite les couches lointaines
    pub bounds: Option<Rect>,
}

impl ReferenceLayer {
    /// Construit la couche à partir de polygones déjà dans le bon système
    pub fn from_polygons(key: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        let key = key.into();
        let count = polygons.len();

        // Réduction par paires plutôt qu'un pli linéaire
        let footprint = polygons
            .into_par_iter()
            .map(|p| MultiPolygon::new(vec![p]))
            .reduce(|| MultiPolygon::new(vec![]), |a, b| union_of(&a, &b));

        let bounds = footprint.bounding_rect();
        debug!(layer = %key, polygons = count, parts = footprint.0.len(), "Union de couche préparée");

        Self {
            key,
            footprint,
            bounds,
        }
    }

    /// Construit la couche depuis une FeatureCollection GeoJSON.
    ///
    /// Seules les surfaces sont retenues ; les features sans géométrie, non
    /// surfaciques ou illisibles sont comptées et ignorées.
    pub fn from_feature_collection(
        key: impl Into<String>,
        collection: &geojson::FeatureCollection,
    ) -> (Self, usize) {
        let key = key.into();
        let mut polygons = Vec::new();
        let mut ignored = 0;

        for feature in &collection.features {
            let Some(geometry) = &feature.geometry else {
                ignored += 1;
                continue;
            };
            match Geometry::<f64>::try_from(geometry.clone()) {
                Ok(Geometry::Polygon(p)) => polygons.push(p),
                Ok(Geometry::MultiPolygon(mp)) => polygons.extend(mp.0),
                Ok(_) => ignored += 1,
                Err(e) => {
                    warn!(layer = %key, error = %e, "Feature illisible ignorée");
                    ignored += 1;
                }
            }
        }

        (Self::from_polygons(key, polygons), ignored)
    }

    pub fn is_empty(&self) -> bool {
        self.footprint.0.is_empty()
    }
}

/// Union tolérante aux opérandes vides
pub(crate) fn union_of(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    if a.0.is_empty() {
        return b.clone();
    }
    if b.0.is_empty() {
        return a.clone();
    }
    a.union(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area};

    #[test]
    fn test_union_of_overlapping_squares() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)];
        let b = polygon![(x: 5.0, y: 0.0), (x: 15.0, y: 0.0), (x: 15.0, y: 10.0), (x: 5.0, y: 10.0)];
        let layer = ReferenceLayer::from_polygons("aif", vec![a, b]);

        assert!((layer.footprint.unsigned_area() - 150.0).abs() < 1e-6);
        let bounds = layer.bounds.unwrap();
        assert_eq!(bounds.max().x, 15.0);
    }

    #[test]
    fn test_empty_layer() {
        let layer = ReferenceLayer::from_polygons("dpl", vec![]);
        assert!(layer.is_empty());
        assert!(layer.bounds.is_none());
    }

    #[test]
    fn test_from_feature_collection_ignores_points() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]}},
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 1]}},
            {"type": "Feature", "properties": {}, "geometry": null}
        ]}"#;
        let fc: geojson::FeatureCollection = serde_json::from_str(json).unwrap();
        let (layer, ignored) = ReferenceLayer::from_feature_collection("litige", &fc);
        assert_eq!(ignored, 2);
        assert!((layer.footprint.unsigned_area() - 16.0).abs() < 1e-9);
    }
}
