//! Décodage des géométries renvoyées par l'analyse et conversions GeoJSON

use geo::{BoundingRect, CoordsIter, Geometry};
use geozero::wkt::Wkt;
use geozero::{ToGeo, ToWkt};
use serde::{Deserialize, Serialize};

use crate::project::Projector;
use crate::types::GeometryPayload;
use crate::{EmpietementError, Result};

impl GeometryPayload {
    /// Décode la géométrie dans son système d'origine.
    ///
    /// Retourne `Ok(None)` pour une géométrie vide (`POLYGON EMPTY`, `None`, aucun sommet).
    pub fn decode(&self, label: &str) -> Result<Option<Geometry>> {
        let geom = match self {
            Self::Wkt(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("none")
                    || trimmed.to_ascii_uppercase().ends_with("EMPTY")
                {
                    return Ok(None);
                }
                Wkt(trimmed)
                    .to_geo()
                    .map_err(|e| EmpietementError::invalid_geometry(label, e.to_string()))?
            }
            Self::GeoJson(geometry) => Geometry::<f64>::try_from(geometry.clone())
                .map_err(|e| EmpietementError::invalid_geometry(label, e.to_string()))?,
        };

        if geom.coords_count() == 0 {
            return Ok(None);
        }
        Ok(Some(geom))
    }

    /// Vrai si la géométrie est déjà en EPSG:4326 (GeoJSON converti par l'API)
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::GeoJson(_))
    }

    /// Décode puis ramène en WGS84 : le WKT est projeté, le GeoJSON est gardé tel quel
    pub fn to_geographic(&self, label: &str, projector: &Projector) -> Result<Option<Geometry>> {
        let Some(geom) = self.decode(label)? else {
            return Ok(None);
        };
        if self.is_geographic() {
            Ok(Some(geom))
        } else {
            projector.transform_geometry(&geom).map(Some)
        }
    }

    /// Encode une géométrie en WKT, comme le fait l'API brute
    pub fn from_geometry(geom: &Geometry) -> Result<Self> {
        let text = geom
            .to_wkt()
            .map_err(|e| EmpietementError::invalid_geometry("wkt", e.to_string()))?;
        Ok(Self::Wkt(text))
    }
}

/// Convertit une géométrie `geo` en géométrie GeoJSON
pub fn to_geojson(geom: &Geometry) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geom))
}

/// Emprise en degrés d'une ou plusieurs géométries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Envelope {
    /// Emprise d'une géométrie, `None` si elle n'a aucun sommet
    pub fn of(geom: &Geometry) -> Option<Self> {
        geom.bounding_rect().map(|r| Self {
            min_lng: r.min().x,
            min_lat: r.min().y,
            max_lng: r.max().x,
            max_lat: r.max().y,
        })
    }

    /// Union de deux emprises
    pub fn extend(self, other: Self) -> Self {
        Self {
            min_lng: self.min_lng.min(other.min_lng),
            min_lat: self.min_lat.min(other.min_lat),
            max_lng: self.max_lng.max(other.max_lng),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Centre `[lng, lat]`
    pub fn center(&self) -> [f64; 2] {
        [
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        ]
    }

    /// Coins `[[min_lng, min_lat], [max_lng, max_lat]]` (format `fitBounds`)
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.min_lng, self.min_lat], [self.max_lng, self.max_lat]]
    }
}
