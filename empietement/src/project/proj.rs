//! Reprojection via PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use proj::Proj;

use crate::{EmpietementError, Result};

/// Transformation PROJ entre deux codes EPSG
pub struct ProjTransform {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for ProjTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjTransform")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .finish()
    }
}

impl ProjTransform {
    /// Crée une transformation, axes en ordre (x, y) / (lng, lat)
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).map_err(|e| {
            EmpietementError::Projection(format!(
                "Failed to create projection from {} to {}: {}",
                source, target, e
            ))
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme un point
    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.proj
            .convert((x, y))
            .map_err(|e| EmpietementError::Projection(format!("Coordinate transformation failed: {}", e)))
    }
}
