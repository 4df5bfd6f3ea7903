//! Backend d'analyse en local, sur des couches projetées

use std::sync::Arc;

use empietement::{AnalysisResult, Coordinate, EncroachmentEngine, Parcel, ReferenceLayer};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AnalysisApi, ApiError, ImageUpload, ProgressSender};
use crate::layers::{LayerLoader, LayerSource, LoadOutcome};

/// Analyse hors ligne avec le moteur embarqué
#[derive(Debug, Clone)]
pub struct LocalAnalysis {
    engine: Arc<EncroachmentEngine>,
}

impl LocalAnalysis {
    pub fn new(engine: EncroachmentEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Prépare le moteur à partir des couches du catalogue.
    ///
    /// Les couches doivent être dans le même système projeté que les
    /// coordonnées saisies. Retourne aussi le bilan de chargement.
    pub async fn from_loader<S: LayerSource>(loader: &LayerLoader<S>) -> (Self, LoadOutcome) {
        let outcome = loader.load_all().await;

        let mut layers = Vec::with_capacity(outcome.loaded.len());
        for (key, collection) in &outcome.loaded {
            let (layer, ignored) = ReferenceLayer::from_feature_collection(key.clone(), collection);
            if ignored > 0 {
                debug!(layer = %key, ignored, "Features non surfaciques ignorées");
            }
            layers.push(layer);
        }
        info!(layers = layers.len(), "Moteur local prêt");

        (Self::new(EncroachmentEngine::new(layers)), outcome)
    }
}

impl AnalysisApi for LocalAnalysis {
    async fn analyse_coords(&self, points: &[Coordinate]) -> Result<AnalysisResult, ApiError> {
        let parcel = Parcel::new(points.to_vec())?;
        let engine = Arc::clone(&self.engine);

        // Calcul géométrique hors du runtime async
        tokio::task::spawn_blocking(move || engine.analyse(&parcel))
            .await
            .map_err(|e| ApiError::Task(e.to_string()))?
            .map_err(ApiError::from)
    }

    async fn analyse_image(
        &self,
        upload: ImageUpload,
        _progress: Option<ProgressSender>,
    ) -> Result<AnalysisResult, ApiError> {
        Err(ApiError::Unsupported(format!(
            "lecture du levé {} (OCR) uniquement via l'API",
            upload.file_name
        )))
    }

    async fn health(&self) -> Result<Value, ApiError> {
        Ok(json!({
            "status": "ok",
            "backend": "local",
            "layers": self.engine.layers().len(),
        }))
    }
}
