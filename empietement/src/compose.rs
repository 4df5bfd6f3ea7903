//! Composition parcelle + résultats d'analyse en features affichables
//!
//! Aucun calcul géométrique ici : les intersections, l'union et la zone libre
//! viennent telles quelles de l'analyse. Seuls la fermeture de l'anneau et la
//! reprojection vers WGS84 sont faits localement.

use std::collections::BTreeMap;

use geo::{Coord, Geometry, LineString, Polygon};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::geometry::{to_geojson, Envelope};
use crate::project::Projector;
use crate::types::{close_ring, AnalysisResult, GeometryPayload, Parcel, ParcelCoordinates};
use crate::Result;

/// Clé de la parcelle dans le résultat d'analyse
const PARCEL_KEY: &str = "coordonnees_parcelle";

/// Rôle d'une feature composée
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Parcelle saisie
    Parcel,
    /// Union des intersections toutes couches
    Encroachment,
    /// Parcelle libre finale
    FreeArea,
    /// Intersection avec une couche réglementaire
    LayerIntersection { layer: String },
}

/// Feature prête à être rendue, en EPSG:4326
#[derive(Debug, Clone)]
pub struct ComposedFeature {
    /// Identifiant de source/couche sur la carte
    pub id: String,
    pub kind: FeatureKind,
    pub geometry: Geometry,
    /// Texte de la popup au clic
    pub popup: String,
}

impl ComposedFeature {
    /// Emprise de la géométrie
    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::of(&self.geometry)
    }

    /// Feature GeoJSON avec `id`, `kind` et `popup` en propriétés
    pub fn to_geojson(&self) -> geojson::Feature {
        let mut properties = Map::new();
        properties.insert("id".into(), Value::String(self.id.clone()));
        properties.insert("popup".into(), Value::String(self.popup.clone()));
        if let Value::Object(kind) = json!(self.kind) {
            properties.extend(kind);
        }

        geojson::Feature {
            bbox: None,
            geometry: Some(to_geojson(&self.geometry)),
            id: Some(geojson::feature::Id::String(self.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Résultat de la composition
#[derive(Debug, Clone)]
pub struct Composition {
    /// Absente si `coordonnees_parcelle` est nul ou inexploitable
    pub parcel: Option<ComposedFeature>,
    /// Une feature par couche en conflit dont la géométrie est exploitable
    pub intersections: Vec<ComposedFeature>,
    pub union_intersections: Option<ComposedFeature>,
    pub free_area: Option<ComposedFeature>,
    /// Repris tel quel de l'analyse
    pub empietement: bool,
    /// Clés ignorées car leur géométrie est illisible
    pub skipped: Vec<String>,
}

impl Composition {
    /// Toutes les features, parcelle en premier
    pub fn features(&self) -> impl Iterator<Item = &ComposedFeature> {
        self.parcel
            .iter()
            .chain(self.union_intersections.iter())
            .chain(self.free_area.iter())
            .chain(self.intersections.iter())
    }

    /// Emprise de l'ensemble
    pub fn envelope(&self) -> Option<Envelope> {
        self.features()
            .filter_map(ComposedFeature::envelope)
            .reduce(Envelope::extend)
    }

    pub fn to_feature_collection(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features().map(ComposedFeature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

/// Compose parcelle et résultat d'analyse
pub struct Composer<'a> {
    projector: &'a Projector,
    labels: BTreeMap<String, String>,
}

impl<'a> Composer<'a> {
    pub fn new(projector: &'a Projector) -> Self {
        Self {
            projector,
            labels: BTreeMap::new(),
        }
    }

    /// Libellés lisibles par clé de couche, utilisés dans les popups
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Compose une parcelle saisie avec le résultat de son analyse
    pub fn compose(&self, parcel: &Parcel, result: &AnalysisResult) -> Result<Composition> {
        let parcel_geom = self.parcel_geometry(parcel)?;
        Ok(self.assemble(Some(parcel_geom), Vec::new(), result))
    }

    /// Compose à partir du seul résultat (parcelle lue dans `coordonnees_parcelle`).
    ///
    /// Une parcelle nulle, vide ou illisible est ignorée comme une couche :
    /// les autres features sont composées quand même.
    pub fn compose_result(&self, result: &AnalysisResult) -> Result<Composition> {
        let mut skipped = Vec::new();
        let parcel_geom = match self.result_parcel(result) {
            Ok(Some(geom)) => Some(geom),
            Ok(None) => {
                warn!(layer = PARCEL_KEY, "Parcelle absente du résultat");
                skipped.push(PARCEL_KEY.to_string());
                None
            }
            Err(e) => {
                warn!(layer = PARCEL_KEY, error = %e, "Géométrie ignorée");
                skipped.push(PARCEL_KEY.to_string());
                None
            }
        };
        Ok(self.assemble(parcel_geom, skipped, result))
    }

    fn result_parcel(&self, result: &AnalysisResult) -> Result<Option<Geometry>> {
        match &result.coordonnees_parcelle {
            None => Ok(None),
            Some(ParcelCoordinates::Points(points)) if points.is_empty() => Ok(None),
            Some(ParcelCoordinates::Points(points)) => {
                let parcel = Parcel::new(points.clone())?;
                self.parcel_geometry(&parcel).map(Some)
            }
            Some(ParcelCoordinates::GeoJson(geometry)) => {
                GeometryPayload::GeoJson(geometry.clone()).decode(PARCEL_KEY)
            }
        }
    }

    /// Polygone WGS84 de la parcelle, anneau fermé
    fn parcel_geometry(&self, parcel: &Parcel) -> Result<Geometry> {
        let ring = self.projector.project_ring(parcel.points())?;
        let coords: Vec<Coord> = close_ring(&ring)
            .into_iter()
            .map(|p| Coord { x: p.lng, y: p.lat })
            .collect();
        Ok(Geometry::Polygon(Polygon::new(LineString::new(coords), vec![])))
    }

    fn assemble(
        &self,
        parcel_geom: Option<Geometry>,
        mut skipped: Vec<String>,
        result: &AnalysisResult,
    ) -> Composition {
        let status = if result.empietement {
            "Empiètement détecté"
        } else {
            "Conforme"
        };
        let parcel = parcel_geom.map(|geometry| ComposedFeature {
            id: "parcelle_entiere".into(),
            kind: FeatureKind::Parcel,
            geometry,
            popup: format!("Parcelle analysée - Statut: {}", status),
        });

        let mut intersections = Vec::new();
        for (key, outcome) in result.conflicting_layers() {
            let Some(payload) = &outcome.intersections_sur_couche else {
                continue;
            };
            let label = self.labels.get(key).map(String::as_str).unwrap_or(key);
            if let Some(geometry) = self.decode_or_skip(key, payload, &mut skipped) {
                intersections.push(ComposedFeature {
                    id: format!("intersection_{}", key),
                    kind: FeatureKind::LayerIntersection {
                        layer: key.to_string(),
                    },
                    geometry,
                    popup: format!("Empiètement sur {}", label),
                });
            }
        }

        let union_intersections = result
            .union_intersections
            .as_ref()
            .and_then(|p| self.decode_or_skip("union_intersections", p, &mut skipped))
            .map(|geometry| ComposedFeature {
                id: "zone_empietement".into(),
                kind: FeatureKind::Encroachment,
                geometry,
                popup: "Zone d'empiétement".into(),
            });

        let free_area = result
            .parcelle_libre_finale
            .as_ref()
            .and_then(|p| self.decode_or_skip("parcelle_libre_finale", p, &mut skipped))
            .map(|geometry| ComposedFeature {
                id: "zone_libre".into(),
                kind: FeatureKind::FreeArea,
                geometry,
                popup: "Zone libre".into(),
            });

        debug!(
            intersections = intersections.len(),
            skipped = skipped.len(),
            empietement = result.empietement,
            "Composition terminée"
        );

        Composition {
            parcel,
            intersections,
            union_intersections,
            free_area,
            empietement: result.empietement,
            skipped,
        }
    }

    /// Une géométrie illisible n'interrompt pas la composition
    fn decode_or_skip(
        &self,
        key: &str,
        payload: &GeometryPayload,
        skipped: &mut Vec<String>,
    ) -> Option<Geometry> {
        match payload.to_geographic(key, self.projector) {
            Ok(geom) => geom,
            Err(e) => {
                warn!(layer = key, error = %e, "Géométrie ignorée");
                skipped.push(key.to_string());
                None
            }
        }
    }
}
