//! Types de données pour le crate empietement

use std::collections::BTreeMap;

use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::{EmpietementError, Result};

/// Coordonnée projetée saisie par l'utilisateur (UTM 31N approximatif)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Coordinate> for Coord {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.x, y: c.y }
    }
}

impl From<Coord> for Coordinate {
    fn from(c: Coord) -> Self {
        Self { x: c.x, y: c.y }
    }
}

/// Point géographique en degrés (EPSG:4326)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Ordre GeoJSON `[lng, lat]`
    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Parcelle : anneau d'au moins 3 sommets, fermeture implicite
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    points: Vec<Coordinate>,
}

impl Parcel {
    /// Minimum de sommets pour former un polygone
    pub const MIN_POINTS: usize = 3;

    /// Construit une parcelle, refusée sous 3 points
    pub fn new(points: Vec<Coordinate>) -> Result<Self> {
        if points.len() < Self::MIN_POINTS {
            return Err(EmpietementError::TooFewPoints {
                found: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Anneau explicitement fermé (le premier point est répété si besoin)
    pub fn closed_ring(&self) -> Vec<Coordinate> {
        close_ring(&self.points)
    }

    /// Polygone `geo` dans le système projeté
    pub fn to_polygon(&self) -> Polygon {
        let ring: Vec<Coord> = self.closed_ring().into_iter().map(Coord::from).collect();
        Polygon::new(LineString::new(ring), vec![])
    }
}

/// Ferme un anneau si le dernier point diffère du premier
pub fn close_ring<T: Copy + PartialEq>(points: &[T]) -> Vec<T> {
    let mut ring = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if points.len() > 1 && first != last {
            ring.push(*first);
        }
    }
    ring
}

/// Géométrie renvoyée par l'API d'analyse : chaîne WKT (système projeté)
/// ou objet GeoJSON (déjà en EPSG:4326)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeometryPayload {
    GeoJson(geojson::Geometry),
    Wkt(String),
}

/// Coordonnées de la parcelle telles que renvoyées par l'API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParcelCoordinates {
    /// Liste brute `{x, y}` dans le système projeté
    Points(Vec<Coordinate>),
    /// Polygone GeoJSON déjà reprojeté
    GeoJson(geojson::Geometry),
}

/// Résultat d'analyse pour une couche réglementaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOutcome {
    pub has_intersection: bool,
    #[serde(default)]
    pub intersections_sur_couche: Option<GeometryPayload>,
    #[serde(default)]
    pub reste_sur_couche: Option<GeometryPayload>,
}

/// Réponse complète de l'analyse d'empiètement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAnalysisResult")]
pub struct AnalysisResult {
    /// Résultats par clé de couche (aif, dpm, parcelle, ...)
    #[serde(flatten)]
    pub layers: BTreeMap<String, LayerOutcome>,
    pub parcelle_libre_finale: Option<GeometryPayload>,
    pub union_intersections: Option<GeometryPayload>,
    pub empietement: bool,
    /// `null` quand le serveur n'a pas pu convertir la parcelle
    pub coordonnees_parcelle: Option<ParcelCoordinates>,
}

/// Forme brute : les couches sont les membres objets portant `has_intersection`,
/// les autres membres inconnus sont ignorés
#[derive(Deserialize)]
struct RawAnalysisResult {
    #[serde(default)]
    parcelle_libre_finale: Option<GeometryPayload>,
    #[serde(default)]
    union_intersections: Option<GeometryPayload>,
    #[serde(default)]
    empietement: Option<bool>,
    #[serde(default)]
    coordonnees_parcelle: Option<ParcelCoordinates>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawAnalysisResult> for AnalysisResult {
    type Error = EmpietementError;

    fn try_from(raw: RawAnalysisResult) -> Result<Self> {
        let mut layers = BTreeMap::new();
        for (key, value) in raw.rest {
            let is_layer = value
                .as_object()
                .is_some_and(|o| o.contains_key("has_intersection"));
            if !is_layer {
                continue;
            }
            let outcome: LayerOutcome = serde_json::from_value(value)?;
            layers.insert(key, outcome);
        }

        // Drapeau absent ou nul : déduit des couches
        let empietement = raw
            .empietement
            .unwrap_or_else(|| layers.values().any(|l: &LayerOutcome| l.has_intersection));

        Ok(Self {
            layers,
            parcelle_libre_finale: raw.parcelle_libre_finale,
            union_intersections: raw.union_intersections,
            empietement,
            coordonnees_parcelle: raw.coordonnees_parcelle,
        })
    }
}

impl AnalysisResult {
    /// Parse une réponse JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Résultat d'une couche par sa clé
    pub fn layer(&self, key: &str) -> Option<&LayerOutcome> {
        self.layers.get(key)
    }

    /// Couches en conflit, dans l'ordre des clés
    pub fn conflicting_layers(&self) -> impl Iterator<Item = (&str, &LayerOutcome)> {
        self.layers
            .iter()
            .filter(|(_, outcome)| outcome.has_intersection)
            .map(|(key, outcome)| (key.as_str(), outcome))
    }

    /// Sommets projetés de la parcelle, si l'API les a renvoyés bruts
    pub fn parcel_points(&self) -> Option<&[Coordinate]> {
        match self.coordonnees_parcelle.as_ref()? {
            ParcelCoordinates::Points(points) => Some(points),
            ParcelCoordinates::GeoJson(_) => None,
        }
    }

    /// Vérifie que `empietement` correspond aux drapeaux par couche.
    /// Le drapeau n'est jamais recalculé, ceci ne sert qu'au diagnostic.
    pub fn is_consistent(&self) -> bool {
        self.empietement == self.layers.values().any(|l| l.has_intersection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_RESPONSE: &str = r#"{
        "aif": {"has_intersection": true, "intersections_sur_couche": "POLYGON ((0 0, 1 0, 1 1, 0 0))", "reste_sur_couche": null},
        "dpm": {"has_intersection": false, "intersections_sur_couche": null, "reste_sur_couche": null},
        "parcelle_libre_finale": "POLYGON EMPTY",
        "union_intersections": null,
        "empietement": true,
        "coordonnees_parcelle": [{"x": 395400.0, "y": 793850.0}, {"x": 395500.0, "y": 793850.0}, {"x": 395500.0, "y": 793950.0}],
        "_metadata": {"fileName": "leve9.png"}
    }"#;

    #[test]
    fn test_parcel_requires_three_points() {
        let err = Parcel::new(vec![Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)]).unwrap_err();
        assert!(matches!(err, EmpietementError::TooFewPoints { found: 2 }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_closed_ring() {
        let parcel = Parcel::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 1.0),
        ])
        .unwrap();
        let ring = parcel.closed_ring();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], ring[3]);

        // Déjà fermé : inchangé
        assert_eq!(close_ring(&ring).len(), 4);
    }

    #[test]
    fn test_parse_raw_response() {
        let result = AnalysisResult::from_json(RAW_RESPONSE).unwrap();
        assert!(result.empietement);
        assert_eq!(result.layers.len(), 2);
        assert!(result.layer("aif").unwrap().has_intersection);
        assert!(matches!(
            result.layer("aif").unwrap().intersections_sur_couche,
            Some(GeometryPayload::Wkt(_))
        ));
        assert_eq!(result.parcel_points().unwrap().len(), 3);
        assert!(result.is_consistent());

        let conflicts: Vec<&str> = result.conflicting_layers().map(|(k, _)| k).collect();
        assert_eq!(conflicts, vec!["aif"]);
    }

    #[test]
    fn test_parse_converted_response() {
        let json = r#"{
            "tf_etat": {"has_intersection": true,
                        "intersections_sur_couche": {"type": "Polygon", "coordinates": [[[2.35, 6.37], [2.36, 6.37], [2.36, 6.38], [2.35, 6.37]]]},
                        "reste_sur_couche": null},
            "parcelle_libre_finale": null,
            "union_intersections": {"type": "Polygon", "coordinates": [[[2.35, 6.37], [2.36, 6.37], [2.36, 6.38], [2.35, 6.37]]]},
            "empietement": true,
            "coordonnees_parcelle": {"type": "Polygon", "coordinates": [[[2.35, 6.37], [2.36, 6.37], [2.36, 6.38], [2.35, 6.37]]]}
        }"#;
        let result = AnalysisResult::from_json(json).unwrap();
        assert!(matches!(
            result.coordonnees_parcelle,
            Some(ParcelCoordinates::GeoJson(_))
        ));
        assert!(result.parcel_points().is_none());
        assert!(matches!(
            result.union_intersections,
            Some(GeometryPayload::GeoJson(_))
        ));
    }

    #[test]
    fn test_roundtrip_keeps_layers_flat() {
        let result = AnalysisResult::from_json(RAW_RESPONSE).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("aif").is_some());
        assert!(json.get("layers").is_none());
        assert!(json.get("_metadata").is_none());

        let back: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_null_parcel_and_flag_are_tolerated() {
        let json = r#"{
            "aif": {"has_intersection": true, "intersections_sur_couche": null, "reste_sur_couche": null},
            "dpm": {"has_intersection": false, "intersections_sur_couche": null, "reste_sur_couche": null},
            "parcelle_libre_finale": null,
            "union_intersections": null,
            "empietement": null,
            "coordonnees_parcelle": null
        }"#;
        let result = AnalysisResult::from_json(json).unwrap();
        assert_eq!(result.layers.len(), 2);
        assert!(result.coordonnees_parcelle.is_none());
        assert!(result.parcel_points().is_none());
        // Déduit de la couche aif
        assert!(result.empietement);
        assert!(result.is_consistent());
    }

    #[test]
    fn test_explicit_flag_is_kept() {
        let json = r#"{
            "dpm": {"has_intersection": false, "intersections_sur_couche": null, "reste_sur_couche": null},
            "empietement": true
        }"#;
        let result = AnalysisResult::from_json(json).unwrap();
        assert!(result.empietement);
        assert!(!result.is_consistent());
    }

    #[test]
    fn test_malformed_parcel_is_rejected() {
        let json = r#"{"empietement": false, "coordonnees_parcelle": "pas une parcelle"}"#;
        assert!(AnalysisResult::from_json(json).is_err());
    }
}
