//! Chargement des couches réglementaires GeoJSON
//!
//! Chaque couche du catalogue est chargée indépendamment ; un échec n'empêche
//! pas les autres. Les couches chargées restent dans le `LayerCache` jusqu'à
//! invalidation explicite.

mod cache;
mod source;
mod stats;

pub use cache::LayerCache;
pub use source::{ConfiguredSource, FsLayerSource, HttpLayerSource, LayerSource};
pub use stats::LayerStats;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use geojson::FeatureCollection;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Catalog;

/// Erreur de chargement d'une couche
#[derive(Debug, Error)]
pub enum LayerError {
    /// Erreur réseau
    #[error("Erreur de chargement: {0}")]
    Fetch(String),

    /// Réponse HTTP non 2xx
    #[error("Erreur de chargement: {status} {reason}")]
    Status { status: u16, reason: String },

    /// Fichier local illisible
    #[error("Erreur de chargement: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Contenu qui n'est pas une FeatureCollection
    #[error("Format GeoJSON invalide: {0}")]
    InvalidGeoJson(String),
}

/// Échec d'une couche dans un chargement groupé
#[derive(Debug)]
pub struct LayerLoadError {
    pub layer: String,
    pub error: LayerError,
}

/// Résultat d'un chargement groupé, jamais en échec global
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub loaded: BTreeMap<String, Arc<FeatureCollection>>,
    pub errors: Vec<LayerLoadError>,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Chargeur de couches avec cache partagé
pub struct LayerLoader<S> {
    source: S,
    catalog: Arc<Catalog>,
    cache: Arc<LayerCache>,
}

impl<S: LayerSource> LayerLoader<S> {
    pub fn new(source: S, catalog: Arc<Catalog>, cache: Arc<LayerCache>) -> Self {
        Self {
            source,
            catalog,
            cache,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<LayerCache> {
        &self.cache
    }

    /// Charge une couche, par clé d'analyse ou nom de fichier.
    ///
    /// Un nom absent du catalogue est utilisé tel quel comme nom de fichier.
    pub async fn load(&self, name: &str) -> Result<Arc<FeatureCollection>, LayerError> {
        let (key, file) = match self.catalog.metadata(name) {
            Some(def) => (def.key.as_str(), def.file.as_str()),
            None => (name, name),
        };

        if let Some(cached) = self.cache.get(key) {
            debug!(layer = key, "Couche servie depuis le cache");
            return Ok(cached);
        }

        let bytes = self.source.fetch(file).await?;
        let collection = parse_feature_collection(&bytes)?;
        info!(
            layer = key,
            features = collection.features.len(),
            "Couche chargée"
        );

        Ok(self.cache.insert(key, collection))
    }

    /// Charge plusieurs couches en parallèle ; les échecs sont collectés
    pub async fn load_many<I, T>(&self, names: I) -> LoadOutcome
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();

        let results = join_all(names.iter().map(|name| async move {
            let key = self
                .catalog
                .metadata(name)
                .map_or_else(|| name.clone(), |def| def.key.clone());
            (key, self.load(name).await)
        }))
        .await;

        let mut outcome = LoadOutcome::default();
        for (layer, result) in results {
            match result {
                Ok(collection) => {
                    outcome.loaded.insert(layer, collection);
                }
                Err(error) => outcome.errors.push(LayerLoadError { layer, error }),
            }
        }

        if !outcome.errors.is_empty() {
            for e in &outcome.errors {
                warn!(layer = %e.layer, error = %e.error, "Couche non chargée");
            }
            warn!(
                failed = outcome.errors.len(),
                loaded = outcome.loaded.len(),
                source = %self.source.describe(),
                "Certaines couches n'ont pas pu être chargées"
            );
        }

        outcome
    }

    /// Charge tout le catalogue
    pub async fn load_all(&self) -> LoadOutcome {
        let keys: Vec<String> = self.catalog.keys().map(str::to_string).collect();
        self.load_many(keys).await
    }
}

/// Vérifie la présence de `type` et `features` puis décode la collection
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection, LayerError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| LayerError::InvalidGeoJson(e.to_string()))?;

    let has_shape = value
        .as_object()
        .is_some_and(|o| o.contains_key("type") && o.contains_key("features"));
    if !has_shape {
        return Err(LayerError::InvalidGeoJson(
            "membres 'type' et 'features' requis".into(),
        ));
    }

    serde_json::from_value(value).map_err(|e| LayerError::InvalidGeoJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LAYER: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [2.35, 6.37]}}
    ]}"#;

    /// Source en mémoire qui compte les appels
    #[derive(Default)]
    struct MemorySource {
        files: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl MemorySource {
        fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LayerSource for MemorySource {
        async fn fetch(&self, file: &str) -> Result<Vec<u8>, LayerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(file)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| LayerError::Status {
                    status: 404,
                    reason: "Not Found".into(),
                })
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from_preset("andf").unwrap())
    }

    #[tokio::test]
    async fn test_load_uses_cache() {
        let source = MemorySource::with(&[("aif", LAYER)]);
        let loader = LayerLoader::new(source, catalog(), Arc::new(LayerCache::new()));

        let a = loader.load("aif").await.unwrap();
        let b = loader.load("aif").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 1);

        loader.cache().invalidate("aif");
        loader.load("aif").await.unwrap();
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_load_by_file_name_caches_by_key() {
        let source = MemorySource::with(&[("parcelles", LAYER)]);
        let loader = LayerLoader::new(source, catalog(), Arc::new(LayerCache::new()));

        loader.load("parcelles").await.unwrap();
        assert!(loader.cache().contains("parcelle"));
    }

    #[tokio::test]
    async fn test_invalid_geojson() {
        let source = MemorySource::with(&[("aif", r#"{"type": "FeatureCollection"}"#)]);
        let loader = LayerLoader::new(source, catalog(), Arc::new(LayerCache::new()));

        let err = loader.load("aif").await.unwrap_err();
        assert!(matches!(err, LayerError::InvalidGeoJson(_)));
        assert!(loader.cache().is_empty());
    }

    #[tokio::test]
    async fn test_load_many_collects_errors() {
        let source = MemorySource::with(&[("aif", LAYER), ("dpl", "pas du json")]);
        let loader = LayerLoader::new(source, catalog(), Arc::new(LayerCache::new()));

        let outcome = loader.load_many(["aif", "dpl", "dpm"]).await;
        assert_eq!(outcome.loaded.len(), 1);
        assert_eq!(outcome.errors.len(), 2);
        assert!(!outcome.is_complete());

        let failed: Vec<&str> = outcome.errors.iter().map(|e| e.layer.as_str()).collect();
        assert_eq!(failed, vec!["dpl", "dpm"]);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_feature_collection(b"[1, 2]").is_err());
        assert!(parse_feature_collection(LAYER.as_bytes()).is_ok());
    }
}
