//! Client de l'API d'analyse d'empiètement
//!
//! Endpoints :
//! - `POST /api/analyse/coords` : liste JSON de `{x, y}`
//! - `POST /api/analyse/img` : multipart, champ `file` (image ou PDF)
//! - `GET /api/` : santé de l'API

mod local;
mod upload;

pub use local::LocalAnalysis;
pub use upload::{spawn_upload, ImageUpload, ProgressSender, UploadEvent, UploadTask};

use std::future::Future;
use std::path::PathBuf;

use empietement::{validate_parcel, AnalysisResult, Coordinate, CoordinateBounds, EmpietementError, Parcel};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Taille des morceaux envoyés lors d'un upload
const CHUNK_SIZE: usize = 64 * 1024;

/// Erreurs de l'analyse, côté client ou serveur
#[derive(Debug, Error)]
pub enum ApiError {
    /// Saisie ou géométrie refusée localement
    #[error(transparent)]
    Model(#[from] EmpietementError),

    /// Réponse non 2xx, message tiré de `detail` si présent
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Erreur réseau
    #[error("Erreur réseau: {0}")]
    Transport(String),

    /// Corps de réponse illisible
    #[error("Réponse d'analyse invalide: {0}")]
    InvalidResponse(String),

    /// Fichier à envoyer illisible
    #[error("Fichier illisible: {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Type de fichier non supporté: {0} (formats acceptés: PNG, JPEG, GIF, WEBP, BMP, TIFF, PDF)")]
    UnsupportedFile(String),

    #[error("Fichier vide: {0}")]
    EmptyFile(String),

    /// Opération absente de ce backend
    #[error("Opération non disponible: {0}")]
    Unsupported(String),

    /// Tâche d'upload interrompue
    #[error("Tâche interrompue: {0}")]
    Task(String),
}

impl ApiError {
    /// Vrai si l'erreur a été levée avant tout appel réseau
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Model(e) if e.is_validation())
    }
}

/// Backend d'analyse
pub trait AnalysisApi: Send + Sync {
    fn analyse_coords(
        &self,
        points: &[Coordinate],
    ) -> impl Future<Output = Result<AnalysisResult, ApiError>> + Send;

    /// Envoie un levé scanné ; la progression est publiée sur `progress`
    fn analyse_image(
        &self,
        upload: ImageUpload,
        progress: Option<ProgressSender>,
    ) -> impl Future<Output = Result<AnalysisResult, ApiError>> + Send;

    fn health(&self) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Client HTTP de l'API
#[derive(Debug, Clone)]
pub struct HttpAnalysisApi {
    client: Client,
    base_url: String,
}

impl HttpAnalysisApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

impl AnalysisApi for HttpAnalysisApi {
    async fn analyse_coords(&self, points: &[Coordinate]) -> Result<AnalysisResult, ApiError> {
        let url = self.url("/api/analyse/coords");
        debug!(url = %url, points = points.len(), "Analyse des coordonnées");

        let response = self
            .client
            .post(&url)
            .json(points)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        read_analysis(response).await
    }

    async fn analyse_image(
        &self,
        upload: ImageUpload,
        progress: Option<ProgressSender>,
    ) -> Result<AnalysisResult, ApiError> {
        let url = self.url("/api/analyse/img");
        let total = upload.len() as u64;
        debug!(url = %url, file = %upload.file_name, bytes = total, "Envoi du levé");

        let chunks: Vec<Vec<u8>> = upload.bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let mut sent = 0u64;
        // La progression est publiée quand le client consomme chaque morceau
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(tx) = &progress {
                let _ = tx.send(UploadEvent::Progress { sent, total });
                if sent == total {
                    let _ = tx.send(UploadEvent::Processing);
                }
            }
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(upload.file_name.clone())
            .mime_str(upload.mime)
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        read_analysis(response).await
    }

    async fn health(&self) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(self.url("/api/"))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let (status, body) = read_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!(status, "Réponse de santé non JSON");
            ApiError::InvalidResponse(e.to_string())
        })
    }
}

async fn read_body(response: Response) -> Result<(u16, Vec<u8>), ApiError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    if !status.is_success() {
        let message = error_message(status.as_u16(), &body);
        warn!(status = status.as_u16(), message = %message, "Erreur API");
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Ok((status.as_u16(), body.to_vec()))
}

async fn read_analysis(response: Response) -> Result<AnalysisResult, ApiError> {
    let (_, body) = read_body(response).await?;
    let result: AnalysisResult =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

    info!(
        layers = result.layers.len(),
        empietement = result.empietement,
        "Analyse reçue"
    );
    Ok(result)
}

/// Message d'une réponse en erreur : `detail` du serveur, sinon `Erreur HTTP: <status>`
pub fn error_message(status: u16, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    match detail {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Null) | None => format!("Erreur HTTP: {}", status),
        Some(Value::String(_)) => format!("Erreur HTTP: {}", status),
        Some(other) => other.to_string(),
    }
}

/// Valide la saisie puis appelle le backend.
///
/// Une saisie invalide n'atteint jamais le backend.
pub struct Analyzer<A> {
    api: A,
    bounds: CoordinateBounds,
}

impl<A: AnalysisApi> Analyzer<A> {
    pub fn new(api: A, bounds: CoordinateBounds) -> Self {
        Self { api, bounds }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn analyse_coordinates(
        &self,
        points: &[Coordinate],
    ) -> Result<(Parcel, AnalysisResult), ApiError> {
        let parcel = validate_parcel(points, &self.bounds)?;
        let result = self.api.analyse_coords(parcel.points()).await?;

        if !result.is_consistent() {
            // Le drapeau global fait foi, il n'est pas recalculé
            warn!(
                empietement = result.empietement,
                "Drapeau d'empiètement différent des résultats par couche"
            );
        }
        Ok((parcel, result))
    }
}
