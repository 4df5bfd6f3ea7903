//! Validation des coordonnées avant tout appel réseau

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Coordinate, Parcel};
use crate::{EmpietementError, Result};

/// Emprise numérique acceptée pour les coordonnées saisies (bornes exclusives)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for CoordinateBounds {
    /// Couvre approximativement le Bénin en UTM 31N
    fn default() -> Self {
        Self {
            min_x: 300_000.0,
            max_x: 500_000.0,
            min_y: 700_000.0,
            max_y: 900_000.0,
        }
    }
}

impl CoordinateBounds {
    /// Vérifie un point, `index` sert uniquement au message d'erreur
    pub fn check(&self, index: usize, c: Coordinate) -> Result<()> {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(EmpietementError::NotFinite { index });
        }
        if c.x <= self.min_x || c.x >= self.max_x {
            return Err(EmpietementError::out_of_bounds(
                index,
                c.x,
                c.y,
                format!(
                    "X (Easting) doit être entre {} et {}",
                    self.min_x, self.max_x
                ),
            ));
        }
        if c.y <= self.min_y || c.y >= self.max_y {
            return Err(EmpietementError::out_of_bounds(
                index,
                c.x,
                c.y,
                format!(
                    "Y (Northing) doit être entre {} et {}",
                    self.min_y, self.max_y
                ),
            ));
        }
        Ok(())
    }
}

/// Valide une saisie complète et construit la parcelle.
///
/// Le nombre de points est vérifié en premier, puis chaque point contre l'emprise.
/// Les indices des messages commencent à 1 (P1, P2, ...).
pub fn validate_parcel(points: &[Coordinate], bounds: &CoordinateBounds) -> Result<Parcel> {
    if points.len() < Parcel::MIN_POINTS {
        return Err(EmpietementError::TooFewPoints {
            found: points.len(),
        });
    }

    for (i, c) in points.iter().enumerate() {
        bounds.check(i + 1, *c)?;
    }

    debug!(points = points.len(), "Coordonnées validées");
    Parcel::new(points.to_vec())
}
