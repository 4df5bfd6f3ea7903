//! Analyse d'empiètement locale
//!
//! Même contrat que l'API d'analyse : pour chaque couche, test d'intersection,
//! partie de la parcelle sur la couche et reste hors couche ; puis union des
//! intersections, parcelle libre finale et drapeau global. Les géométries sont
//! rendues en WKT dans le système projeté de la parcelle, comme l'API brute.
//!
//! Les couches sont traitées en parallèle (rayon) ; l'ordre du résultat suit
//! l'ordre des couches.

mod layer;

pub use layer::ReferenceLayer;

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, BoundingRect, Geometry, Intersects, MultiPolygon};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::types::{AnalysisResult, GeometryPayload, LayerOutcome, Parcel, ParcelCoordinates};
use crate::Result;
use layer::union_of;

/// Surface en dessous de laquelle un morceau est considéré vide (m²)
const AREA_EPSILON: f64 = 1e-6;

/// Résultat intermédiaire pour une couche
#[derive(Debug, Clone)]
struct LayerComparison {
    key: String,
    has_intersection: bool,
    intersection: Option<MultiPolygon>,
    rest: Option<MultiPolygon>,
}

/// Moteur d'analyse sur un jeu de couches préparées
#[derive(Debug, Clone, Default)]
pub struct EncroachmentEngine {
    layers: Vec<ReferenceLayer>,
}

impl EncroachmentEngine {
    pub fn new(layers: Vec<ReferenceLayer>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[ReferenceLayer] {
        &self.layers
    }

    /// Analyse une parcelle contre toutes les couches
    pub fn analyse(&self, parcel: &Parcel) -> Result<AnalysisResult> {
        let parcel_mp = MultiPolygon::new(vec![parcel.to_polygon()]);

        let comparisons: Vec<LayerComparison> = self
            .layers
            .par_iter()
            .map(|layer| compare_with_layer(&parcel_mp, layer))
            .collect();

        // Union des intersections puis parcelle libre finale
        let union = comparisons
            .iter()
            .filter_map(|c| c.intersection.as_ref())
            .fold(MultiPolygon::new(vec![]), |acc, mp| union_of(&acc, mp));
        let free = if union.0.is_empty() {
            parcel_mp.clone()
        } else {
            parcel_mp.difference(&union)
        };

        let empietement = comparisons.iter().any(|c| c.has_intersection);

        let mut layers = BTreeMap::new();
        for c in comparisons {
            debug!(
                layer = %c.key,
                has_intersection = c.has_intersection,
                intersection_area = c.intersection.as_ref().map_or(0.0, |m| m.unsigned_area()),
                "Couche comparée"
            );
            layers.insert(
                c.key,
                LayerOutcome {
                    has_intersection: c.has_intersection,
                    intersections_sur_couche: to_payload(c.intersection)?,
                    reste_sur_couche: to_payload(c.rest)?,
                },
            );
        }

        info!(
            layers = layers.len(),
            empietement,
            free_area = free.unsigned_area(),
            "Analyse terminée"
        );

        Ok(AnalysisResult {
            layers,
            parcelle_libre_finale: Some(GeometryPayload::from_geometry(&Geometry::MultiPolygon(
                free,
            ))?),
            union_intersections: to_payload(Some(union))?,
            empietement,
            coordonnees_parcelle: Some(ParcelCoordinates::Points(parcel.points().to_vec())),
        })
    }
}

fn compare_with_layer(parcel: &MultiPolygon, layer: &ReferenceLayer) -> LayerComparison {
    let disjoint_bounds = match (parcel.bounding_rect(), layer.bounds) {
        (Some(p), Some(l)) => !p.intersects(&l),
        _ => true,
    };

    if disjoint_bounds || layer.is_empty() {
        return LayerComparison {
            key: layer.key.clone(),
            has_intersection: false,
            intersection: None,
            rest: Some(parcel.clone()),
        };
    }

    let has_intersection = parcel.intersects(&layer.footprint);
    let (intersection, rest) = if has_intersection {
        (
            parcel.intersection(&layer.footprint),
            parcel.difference(&layer.footprint),
        )
    } else {
        (MultiPolygon::new(vec![]), parcel.clone())
    };

    LayerComparison {
        key: layer.key.clone(),
        has_intersection,
        intersection: non_empty(intersection),
        rest: non_empty(rest),
    }
}

fn non_empty(mp: MultiPolygon) -> Option<MultiPolygon> {
    if mp.0.is_empty() || mp.unsigned_area() < AREA_EPSILON {
        None
    } else {
        Some(mp)
    }
}

fn to_payload(mp: Option<MultiPolygon>) -> Result<Option<GeometryPayload>> {
    match mp {
        Some(mp) if !mp.0.is_empty() => {
            GeometryPayload::from_geometry(&Geometry::MultiPolygon(mp)).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use geo::polygon;

    fn parcel() -> Parcel {
        Parcel::new(vec![
            Coordinate::new(395400.0, 793850.0),
            Coordinate::new(395500.0, 793850.0),
            Coordinate::new(395500.0, 793950.0),
            Coordinate::new(395400.0, 793950.0),
        ])
        .unwrap()
    }

    fn engine() -> EncroachmentEngine {
        // Moitié ouest de la parcelle recouverte par l'AIF
        let aif = polygon![
            (x: 395300.0, y: 793800.0),
            (x: 395450.0, y: 793800.0),
            (x: 395450.0, y: 794000.0),
            (x: 395300.0, y: 794000.0),
        ];
        // Zone inondable loin de la parcelle
        let inondable = polygon![
            (x: 400000.0, y: 800000.0),
            (x: 400100.0, y: 800000.0),
            (x: 400100.0, y: 800100.0),
            (x: 400000.0, y: 800100.0),
        ];
        EncroachmentEngine::new(vec![
            ReferenceLayer::from_polygons("aif", vec![aif]),
            ReferenceLayer::from_polygons("zone_inondable", vec![inondable]),
            ReferenceLayer::from_polygons("dpm", vec![]),
        ])
    }

    fn area_of(payload: &Option<GeometryPayload>) -> f64 {
        match payload.as_ref().and_then(|p| p.decode("t").unwrap()) {
            Some(g) => g.unsigned_area(),
            None => 0.0,
        }
    }

    #[test]
    fn test_partial_encroachment() {
        let result = engine().analyse(&parcel()).unwrap();

        assert!(result.empietement);
        assert!(result.is_consistent());
        assert_eq!(result.layers.len(), 3);

        let aif = result.layer("aif").unwrap();
        assert!(aif.has_intersection);
        assert!((area_of(&aif.intersections_sur_couche) - 5000.0).abs() < 1e-3);
        assert!((area_of(&aif.reste_sur_couche) - 5000.0).abs() < 1e-3);

        let far = result.layer("zone_inondable").unwrap();
        assert!(!far.has_intersection);
        assert!(far.intersections_sur_couche.is_none());
        assert!((area_of(&far.reste_sur_couche) - 10000.0).abs() < 1e-3);

        assert!((area_of(&result.union_intersections) - 5000.0).abs() < 1e-3);
        assert!((area_of(&result.parcelle_libre_finale) - 5000.0).abs() < 1e-3);
    }

    #[test]
    fn test_no_layers_means_free_parcel() {
        let result = EncroachmentEngine::default().analyse(&parcel()).unwrap();
        assert!(!result.empietement);
        assert!(result.union_intersections.is_none());
        assert!((area_of(&result.parcelle_libre_finale) - 10000.0).abs() < 1e-3);
        assert_eq!(result.parcel_points().unwrap().len(), 4);
    }

    #[test]
    fn test_result_serializes_like_api() {
        let result = engine().analyse(&parcel()).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back = AnalysisResult::from_json(&json).unwrap();
        assert_eq!(back.layers.len(), 3);
        assert!(back.empietement);
    }
}
