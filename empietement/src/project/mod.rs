//! Conversion des coordonnées projetées saisies vers WGS84 (EPSG:4326)
//!
//! Trois modes :
//! - `linear` : approximation linéaire calée sur Cotonou (compatibilité)
//! - `utm` : Transverse Mercator exacte, zone 31N (pure Rust)
//! - `proj` : PROJ (feature `reproject`), pour toute paire EPSG

mod linear;
#[cfg(feature = "reproject")]
mod proj;
mod utm;

pub use linear::LinearApprox;
#[cfg(feature = "reproject")]
pub use proj::ProjTransform;
pub use utm::{geographic_to_utm, utm_to_geographic, UtmZone};

use geo::{Coord, Geometry, MapCoords};
use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, LngLat};
use crate::{EmpietementError, Result};

/// Mode de projection configurable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// Approximation linéaire (défaut, identique aux cartes historiques)
    #[default]
    Linear,
    /// UTM 31N exacte
    Utm,
    /// PROJ EPSG:32631 -> EPSG:4326
    Proj,
}

impl std::str::FromStr for ProjectionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" | "lineaire" | "approx" => Ok(Self::Linear),
            "utm" | "utm31" | "32631" => Ok(Self::Utm),
            "proj" => Ok(Self::Proj),
            _ => Err(format!(
                "Invalid projection: {}. Use: linear, utm, proj",
                s
            )),
        }
    }
}

/// Projecteur choisi à la configuration
#[derive(Debug)]
pub enum Projector {
    /// Approximation linéaire
    Linear(LinearApprox),
    /// Transverse Mercator pure Rust
    Utm(UtmZone),
    /// PROJ, aller et retour
    #[cfg(feature = "reproject")]
    Proj {
        forward: ProjTransform,
        inverse: ProjTransform,
    },
}

impl Default for Projector {
    fn default() -> Self {
        Self::Linear(LinearApprox::default())
    }
}

impl Projector {
    /// Crée le projecteur correspondant au mode demandé
    pub fn new(kind: ProjectionKind) -> Result<Self> {
        match kind {
            ProjectionKind::Linear => Ok(Self::Linear(LinearApprox::default())),
            ProjectionKind::Utm => Ok(Self::Utm(UtmZone::BENIN)),
            #[cfg(feature = "reproject")]
            ProjectionKind::Proj => {
                let epsg = UtmZone::BENIN.epsg();
                Ok(Self::Proj {
                    forward: ProjTransform::new(epsg, 4326)?,
                    inverse: ProjTransform::new(4326, epsg)?,
                })
            }
            #[cfg(not(feature = "reproject"))]
            ProjectionKind::Proj => Err(EmpietementError::Projection(
                "La projection 'proj' nécessite le feature 'reproject'. \
                 Compilez avec: cargo build --features reproject"
                    .to_string(),
            )),
        }
    }

    /// Projette un point saisi vers WGS84
    pub fn project(&self, c: Coordinate) -> Result<LngLat> {
        let (lng, lat) = self.forward(c.x, c.y)?;
        Ok(LngLat::new(lng, lat))
    }

    /// Opération inverse : WGS84 vers le système projeté
    pub fn unproject(&self, p: LngLat) -> Result<Coordinate> {
        let (x, y) = match self {
            Self::Linear(approx) => approx.unproject(p.lng, p.lat),
            Self::Utm(zone) => geographic_to_utm(p.lng, p.lat, *zone),
            #[cfg(feature = "reproject")]
            Self::Proj { inverse, .. } => inverse.convert(p.lng, p.lat)?,
        };
        Ok(Coordinate::new(x, y))
    }

    /// Projette une suite de points
    pub fn project_ring(&self, points: &[Coordinate]) -> Result<Vec<LngLat>> {
        points.iter().map(|c| self.project(*c)).collect()
    }

    /// Transforme une géométrie `geo` complète
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        geom.try_map_coords(|c: Coord| {
            let (x, y) = self.forward(c.x, c.y)?;
            Ok::<_, EmpietementError>(Coord { x, y })
        })
    }

    /// Retourne une description du projecteur utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear (approximation calée sur Cotonou)",
            Self::Utm(_) => "utm (Transverse Mercator 31N, pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj { .. } => "proj (PROJ library)",
        }
    }

    fn forward(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Self::Linear(approx) => Ok(approx.project(x, y)),
            Self::Utm(zone) => Ok(utm_to_geographic(x, y, *zone)),
            #[cfg(feature = "reproject")]
            Self::Proj { forward, .. } => forward.convert(x, y),
        }
    }
}
