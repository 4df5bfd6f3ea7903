//! Upload d'un levé scanné avec suivi de progression

use std::path::Path;
use std::sync::Arc;

use empietement::AnalysisResult;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{AnalysisApi, ApiError};

/// Canal de progression d'un upload
pub type ProgressSender = mpsc::UnboundedSender<UploadEvent>;

/// Étapes d'un upload, dans l'ordre d'émission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Started { file_name: String, total: u64 },
    Progress { sent: u64, total: u64 },
    /// Fichier entièrement envoyé, analyse en cours côté serveur
    Processing,
    Finished { success: bool },
}

impl UploadEvent {
    /// Pourcentage envoyé, pour les événements `Progress`
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Progress { sent, total } if *total > 0 => {
                Some(((sent * 100) / total).min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Fichier à analyser (image ou PDF)
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Le type est déduit de l'extension
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ApiError> {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).ok_or_else(|| ApiError::UnsupportedFile(file_name.clone()))?;
        if bytes.is_empty() {
            return Err(ApiError::EmptyFile(file_name));
        }
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        // Extension vérifiée avant de lire le fichier
        if mime_for(&file_name).is_none() {
            return Err(ApiError::UnsupportedFile(file_name));
        }
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file_name, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Upload en cours : événements de progression puis un unique résultat
pub struct UploadTask {
    pub events: mpsc::UnboundedReceiver<UploadEvent>,
    handle: JoinHandle<Result<AnalysisResult, ApiError>>,
}

impl UploadTask {
    /// Attend le résultat de l'analyse
    pub async fn finish(self) -> Result<AnalysisResult, ApiError> {
        self.handle
            .await
            .map_err(|e| ApiError::Task(e.to_string()))?
    }
}

/// Lance l'upload dans une tâche tokio
pub fn spawn_upload<A>(api: Arc<A>, upload: ImageUpload) -> UploadTask
where
    A: AnalysisApi + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let file_name = upload.file_name.clone();
        let _ = tx.send(UploadEvent::Started {
            file_name: file_name.clone(),
            total: upload.len() as u64,
        });

        let result = api.analyse_image(upload, Some(tx.clone())).await;

        match &result {
            Ok(r) => info!(file = %file_name, empietement = r.empietement, "Levé analysé"),
            Err(e) => warn!(file = %file_name, error = %e, "Échec de l'analyse du levé"),
        }
        let _ = tx.send(UploadEvent::Finished {
            success: result.is_ok(),
        });
        result
    });

    UploadTask { events, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use empietement::Coordinate;
    use serde_json::Value;

    const RESPONSE: &str = r#"{
        "parcelle_libre_finale": null,
        "union_intersections": null,
        "empietement": true,
        "coordonnees_parcelle": []
    }"#;

    /// Backend qui simule un envoi en quatre morceaux
    struct ChunkedApi;

    impl AnalysisApi for ChunkedApi {
        async fn analyse_coords(&self, _: &[Coordinate]) -> Result<AnalysisResult, ApiError> {
            Err(ApiError::Unsupported("coords".into()))
        }

        async fn analyse_image(
            &self,
            upload: ImageUpload,
            progress: Option<ProgressSender>,
        ) -> Result<AnalysisResult, ApiError> {
            let total = upload.len() as u64;
            if let Some(tx) = progress {
                for i in 1..=4 {
                    let _ = tx.send(UploadEvent::Progress {
                        sent: total * i / 4,
                        total,
                    });
                }
                let _ = tx.send(UploadEvent::Processing);
            }
            Ok(AnalysisResult::from_json(RESPONSE)?)
        }

        async fn health(&self) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_upload_events_then_single_result() {
        let upload = ImageUpload::new("leve.png", vec![0u8; 400]).unwrap();
        let mut task = spawn_upload(Arc::new(ChunkedApi), upload);

        let mut events = Vec::new();
        while let Some(event) = task.events.recv().await {
            events.push(event);
        }

        assert_eq!(
            events.first(),
            Some(&UploadEvent::Started {
                file_name: "leve.png".into(),
                total: 400
            })
        );
        assert_eq!(events.last(), Some(&UploadEvent::Finished { success: true }));
        let percents: Vec<u8> = events.iter().filter_map(UploadEvent::percent).collect();
        assert_eq!(percents, vec![25, 50, 75, 100]);
        assert!(events.contains(&UploadEvent::Processing));

        let result = task.finish().await.unwrap();
        assert!(result.empietement);
    }

    #[test]
    fn test_accepted_types() {
        assert_eq!(ImageUpload::new("a.JPG", vec![1]).unwrap().mime, "image/jpeg");
        assert_eq!(ImageUpload::new("plan.pdf", vec![1]).unwrap().mime, "application/pdf");
        assert!(matches!(
            ImageUpload::new("notes.txt", vec![1]),
            Err(ApiError::UnsupportedFile(_))
        ));
        assert!(matches!(
            ImageUpload::new("vide.png", vec![]),
            Err(ApiError::EmptyFile(_))
        ));
    }
}
