//! Types d'erreurs pour le crate empietement

use thiserror::Error;

/// Erreurs pouvant survenir lors de la validation, de la projection ou de l'analyse
#[derive(Debug, Error)]
pub enum EmpietementError {
    /// Parcelle avec moins de 3 sommets
    #[error("Parcelle invalide: {found} point(s), au moins 3 sont nécessaires pour former un polygone")]
    TooFewPoints { found: usize },

    /// Coordonnée hors de l'emprise configurée
    #[error("Point P{index} ({x}, {y}) hors de la zone couverte: {reason}")]
    OutOfBounds {
        index: usize,
        x: f64,
        y: f64,
        reason: String,
    },

    /// Coordonnée non finie (NaN, infini)
    #[error("Point P{index}: coordonnée non numérique")]
    NotFinite { index: usize },

    /// Géométrie illisible (WKT ou GeoJSON)
    #[error("Invalid geometry for {layer}: {reason}")]
    InvalidGeometry { layer: String, reason: String },

    /// Échec de reprojection
    #[error("Projection error: {0}")]
    Projection(String),

    /// Erreur de (dé)sérialisation JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmpietementError {
    /// Crée une erreur de coordonnée hors emprise
    pub fn out_of_bounds(index: usize, x: f64, y: f64, reason: impl Into<String>) -> Self {
        Self::OutOfBounds {
            index,
            x,
            y,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    /// Vrai pour les erreurs détectées avant tout appel réseau
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TooFewPoints { .. } | Self::OutOfBounds { .. } | Self::NotFinite { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EmpietementError>;
