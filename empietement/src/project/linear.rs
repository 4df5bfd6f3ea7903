//! Approximation linéaire autour d'un point de référence
//!
//! Conservée pour compatibilité avec les cartes existantes : ce n'est pas une
//! transformation géodésique. Un mètre projeté vaut `k` degrés sur les deux axes.

use serde::{Deserialize, Serialize};

/// Calage linéaire `(x, y) -> (lng, lat)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearApprox {
    /// Longitude du point de référence
    pub lng0: f64,
    /// Latitude du point de référence
    pub lat0: f64,
    /// Easting du point de référence
    pub x0: f64,
    /// Northing du point de référence
    pub y0: f64,
    /// Degrés par mètre
    pub k: f64,
}

impl Default for LinearApprox {
    /// Calage sur Cotonou
    fn default() -> Self {
        Self {
            lng0: 2.3544,
            lat0: 6.3725,
            x0: 395400.0,
            y0: 793850.0,
            k: 0.00001,
        }
    }
}

impl LinearApprox {
    /// `(x, y)` projeté vers `(lng, lat)`. Aucune erreur, même hors emprise.
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let lng = self.lng0 + (x - self.x0) * self.k;
        let lat = self.lat0 + (y - self.y0) * self.k;
        (lng, lat)
    }

    /// Inverse exact de [`project`](Self::project)
    pub fn unproject(&self, lng: f64, lat: f64) -> (f64, f64) {
        let x = self.x0 + (lng - self.lng0) / self.k;
        let y = self.y0 + (lat - self.lat0) / self.k;
        (x, y)
    }
}
