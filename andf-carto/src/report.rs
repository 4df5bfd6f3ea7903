//! Rapport d'analyse d'empiètement
//!
//! Résume un `AnalysisResult` : statut global, statut par couche, surfaces
//! quand elles sont calculables, et couches non chargées.

use std::path::Path;

use anyhow::Result;
use empietement::{AnalysisResult, GeometryPayload, Parcel};
use geo::Area;
use serde::Serialize;

use crate::config::Catalog;
use crate::layers::LoadOutcome;

/// Statut global de l'analyse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisStatus {
    /// Aucun conflit
    Conforme,
    /// Au moins une couche en conflit
    Empietement,
}

/// Statut d'une couche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayerStatus {
    Conflit,
    Libre,
}

/// Ligne du rapport pour une couche
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub key: String,
    pub name: String,
    pub status: LayerStatus,
    /// Surface d'intersection en m², si la géométrie est projetée
    pub intersection_area: Option<f64>,
}

/// Couche non chargée ou géométrie ignorée
#[derive(Debug, Clone, Serialize)]
pub struct ReportIssue {
    pub layer: String,
    pub message: String,
}

/// Rapport complet
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Origine de l'analyse (coordonnées, fichier, session)
    pub source: String,
    pub status: AnalysisStatus,
    pub layers: Vec<LayerReport>,
    pub parcel_area: Option<f64>,
    pub encroachment_area: Option<f64>,
    pub free_area: Option<f64>,
    /// Faux si le drapeau global contredit les résultats par couche
    pub consistent: bool,
    pub load_errors: Vec<ReportIssue>,
    pub skipped: Vec<ReportIssue>,
}

impl AnalysisReport {
    /// Construit le rapport ; les couches en conflit viennent en premier
    pub fn from_result(source: &str, result: &AnalysisResult, catalog: Option<&Catalog>) -> Self {
        let mut layers: Vec<LayerReport> = result
            .layers
            .iter()
            .map(|(key, outcome)| LayerReport {
                key: key.clone(),
                name: catalog
                    .and_then(|c| c.metadata(key))
                    .map_or_else(|| key.clone(), |def| def.name.clone()),
                status: if outcome.has_intersection {
                    LayerStatus::Conflit
                } else {
                    LayerStatus::Libre
                },
                intersection_area: projected_area(outcome.intersections_sur_couche.as_ref()),
            })
            .collect();
        layers.sort_by_key(|l| (l.status != LayerStatus::Conflit, l.key.clone()));

        let parcel_area = result
            .parcel_points()
            .and_then(|points| Parcel::new(points.to_vec()).ok())
            .map(|p| p.to_polygon().unsigned_area());

        Self {
            source: source.to_string(),
            status: if result.empietement {
                AnalysisStatus::Empietement
            } else {
                AnalysisStatus::Conforme
            },
            layers,
            parcel_area,
            encroachment_area: projected_area(result.union_intersections.as_ref()),
            free_area: projected_area(result.parcelle_libre_finale.as_ref()),
            consistent: result.is_consistent(),
            load_errors: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Ajoute les couches réglementaires qui n'ont pas pu être chargées
    pub fn record_load_errors(&mut self, outcome: &LoadOutcome) {
        self.load_errors.extend(outcome.errors.iter().map(|e| ReportIssue {
            layer: e.layer.clone(),
            message: e.error.to_string(),
        }));
    }

    /// Ajoute les couches dont la géométrie a été ignorée à la composition
    pub fn record_skipped(&mut self, layers: &[String]) {
        self.skipped.extend(layers.iter().map(|layer| ReportIssue {
            layer: layer.clone(),
            message: "géométrie illisible".into(),
        }));
    }

    pub fn conflicts(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.status == LayerStatus::Conflit)
            .count()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RAPPORT D'ANALYSE - {}", self.source);
        println!("{}", "=".repeat(60));

        let status = match self.status {
            AnalysisStatus::Empietement => "Empiètement détecté",
            AnalysisStatus::Conforme => "Conforme",
        };
        println!("\nStatut: {}", status);
        if let Some(area) = self.parcel_area {
            println!("Surface parcelle: {:.2} m²", area);
        }
        if let Some(area) = self.encroachment_area {
            println!("Surface en empiètement: {:.2} m²", area);
        }
        if let Some(area) = self.free_area {
            println!("Surface libre: {:.2} m²", area);
        }
        if !self.consistent {
            println!("Attention: le statut global ne correspond pas aux couches");
        }

        if !self.layers.is_empty() {
            println!("\n--- COUCHES ({} en conflit) ---", self.conflicts());
            for layer in &self.layers {
                match (layer.status, layer.intersection_area) {
                    (LayerStatus::Conflit, Some(area)) => {
                        println!("  [Conflit] {}: {:.2} m²", layer.name, area)
                    }
                    (status, _) => println!("  [{:?}] {}", status, layer.name),
                }
            }
        }

        for (title, issues) in [
            ("COUCHES NON CHARGÉES", &self.load_errors),
            ("GÉOMÉTRIES IGNORÉES", &self.skipped),
        ] {
            if !issues.is_empty() {
                println!("\n--- {} ({}) ---", title, issues.len());
                for issue in issues {
                    println!("  {}: {}", issue.layer, issue.message);
                }
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {:?}, {} couche(s) en conflit sur {}, {} couche(s) non chargée(s)",
            self.source,
            self.status,
            self.conflicts(),
            self.layers.len(),
            self.load_errors.len()
        )
    }
}

/// Surface d'une géométrie WKT (système projeté, m²)
fn projected_area(payload: Option<&GeometryPayload>) -> Option<f64> {
    let payload = payload?;
    if payload.is_geographic() {
        return None;
    }
    payload
        .decode("surface")
        .ok()
        .flatten()
        .map(|g| g.unsigned_area())
}
