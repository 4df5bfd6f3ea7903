//! Dernier résultat d'analyse, conservé entre deux commandes

use std::path::{Path, PathBuf};

use empietement::AnalysisResult;
use thiserror::Error;
use tracing::{debug, warn};

/// Clé fixe du résultat en session
pub const SESSION_KEY: &str = "topographyData";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Aucune analyse enregistrée
    #[error("Aucune donnée d'analyse disponible")]
    NotFound,

    /// Contenu enregistré illisible
    #[error("Données d'analyse illisibles: {0}")]
    Corrupt(String),

    #[error("Erreur d'accès à la session {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stockage fichier `<dir>/topographyData.json`.
///
/// Une seule entrée : chaque analyse remplace la précédente.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_KEY))
    }

    pub async fn save(&self, result: &AnalysisResult) -> Result<(), SessionError> {
        let path = self.path();
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| io_error(&self.dir, source))?;

        let json =
            serde_json::to_vec_pretty(result).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        // Écriture puis renommage : un lecteur ne voit jamais un fichier partiel
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| io_error(&path, source))?;

        debug!(path = %path.display(), "Analyse enregistrée en session");
        Ok(())
    }

    pub async fn load(&self) -> Result<AnalysisResult, SessionError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound)
            }
            Err(source) => return Err(io_error(&path, source)),
        };

        AnalysisResult::from_json(&content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Session illisible");
            SessionError::Corrupt(e.to_string())
        })
    }

    /// Supprime l'entrée ; retourne vrai si elle existait
    pub async fn clear(&self) -> Result<bool, SessionError> {
        let path = self.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SessionError {
    SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}
