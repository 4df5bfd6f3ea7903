//! Sources des fichiers GeoJSON : HTTP ou répertoire local

use std::future::Future;
use std::path::PathBuf;

use reqwest::Client;
use tracing::debug;

use super::LayerError;

/// Fournit le contenu brut de `<file>.geojson`
pub trait LayerSource: Send + Sync {
    fn fetch(&self, file: &str) -> impl Future<Output = Result<Vec<u8>, LayerError>> + Send;

    /// Description pour les logs
    fn describe(&self) -> String;
}

/// `GET <base>/<file>.geojson`
#[derive(Debug, Clone)]
pub struct HttpLayerSource {
    client: Client,
    base_url: String,
}

impl HttpLayerSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, file: &str) -> String {
        format!("{}/{}.geojson", self.base_url, file)
    }
}

impl LayerSource for HttpLayerSource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, LayerError> {
        let url = self.url(file);
        debug!(url = %url, "Téléchargement de couche");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LayerError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LayerError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LayerError::Fetch(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// `<dir>/<file>.geojson` sur disque
#[derive(Debug, Clone)]
pub struct FsLayerSource {
    dir: PathBuf,
}

impl FsLayerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LayerSource for FsLayerSource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, LayerError> {
        let path = self.dir.join(format!("{}.geojson", file));
        tokio::fs::read(&path)
            .await
            .map_err(|source| LayerError::Read { path, source })
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Source choisie à la configuration
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Http(HttpLayerSource),
    Fs(FsLayerSource),
}

impl LayerSource for ConfiguredSource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, LayerError> {
        match self {
            Self::Http(source) => source.fetch(file).await,
            Self::Fs(source) => source.fetch(file).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Http(source) => source.describe(),
            Self::Fs(source) => source.describe(),
        }
    }
}
