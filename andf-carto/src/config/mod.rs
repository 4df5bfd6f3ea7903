//! Configuration de l'outil et catalogue des couches réglementaires

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use empietement::{CoordinateBounds, ProjectionKind};

/// Tuiles raster de fond par défaut
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Configuration principale, lue depuis l'environnement (et `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    /// Racine de l'API d'analyse (sans `/api`)
    pub api_url: String,
    /// Base HTTP des fichiers `<couche>.geojson`
    pub layers_url: Option<String>,
    /// Répertoire local des fichiers `<couche>.geojson`, prioritaire sur `layers_url`
    pub layers_dir: Option<PathBuf>,
    /// Répertoire de la session (dernier résultat d'analyse)
    pub session_dir: PathBuf,
    /// Modèle d'URL des tuiles raster
    pub tile_url: String,
    /// Projection des coordonnées saisies
    pub projection: ProjectionKind,
    /// Emprise acceptée pour les coordonnées saisies
    pub bounds: CoordinateBounds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            layers_url: None,
            layers_dir: None,
            session_dir: PathBuf::from(".andf"),
            tile_url: DEFAULT_TILE_URL.into(),
            projection: ProjectionKind::default(),
            bounds: CoordinateBounds::default(),
        }
    }
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement.
    ///
    /// Une projection inconnue est une erreur : elle n'est jamais remplacée
    /// par l'approximation linéaire.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_url: std::env::var("ANDF_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            layers_url: std::env::var("ANDF_LAYERS_URL")
                .ok()
                .map(|u| u.trim_end_matches('/').to_string()),
            layers_dir: std::env::var("ANDF_LAYERS_DIR").ok().map(PathBuf::from),
            session_dir: std::env::var("ANDF_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_dir),
            tile_url: std::env::var("ANDF_TILE_URL").unwrap_or(defaults.tile_url),
            projection: parse_projection(std::env::var("ANDF_PROJECTION").ok().as_deref())?,
            bounds: defaults.bounds,
        })
    }
}

/// Valeur de `ANDF_PROJECTION` ; absente ou vide : défaut
fn parse_projection(value: Option<&str>) -> Result<ProjectionKind> {
    match value.map(str::trim) {
        None | Some("") => Ok(ProjectionKind::default()),
        Some(v) => v
            .parse::<ProjectionKind>()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid ANDF_PROJECTION"),
    }
}

/// Définition d'une couche du catalogue
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDefinition {
    /// Clé utilisée dans le résultat d'analyse (`parcelle`, `enregistrement_individuel`, ...)
    pub key: String,
    /// Nom du fichier GeoJSON, sans extension
    pub file: String,
    /// Libellé affiché
    pub name: String,
    /// Couleur de remplissage
    pub color: String,
    /// Opacité du remplissage
    pub opacity: f64,
    /// Couleur du contour
    pub stroke_color: String,
    /// Épaisseur du contour
    pub stroke_width: f64,
    #[serde(default)]
    pub description: String,
}

/// Catalogue ordonné des couches réglementaires
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Catalog {
    pub layers: Vec<LayerDefinition>,
}

impl Catalog {
    /// Charge un catalogue depuis un fichier JSON
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read catalog file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse catalog JSON")
    }

    /// Charge un catalogue embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "andf" => Self::load_embedded(include_str!("presets/catalog.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: andf", preset),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded catalog")
    }

    /// Métadonnées d'une couche, par clé d'analyse ou par nom de fichier
    pub fn metadata(&self, name: &str) -> Option<&LayerDefinition> {
        self.layers
            .iter()
            .find(|l| l.key == name || l.file == name)
    }

    /// Clés des couches, dans l'ordre du catalogue
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.key.as_str())
    }

    /// Libellés par clé, pour les popups
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.layers
            .iter()
            .map(|l| (l.key.clone(), l.name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog() {
        let catalog = Catalog::from_preset("andf").unwrap();
        assert_eq!(catalog.len(), 13);

        let keys: Vec<&str> = catalog.keys().collect();
        assert_eq!(keys[0], "aif");
        assert!(keys.contains(&"dpm"));
        assert!(keys.contains(&"zone_inondable"));
    }

    #[test]
    fn test_metadata_by_key_or_file() {
        let catalog = Catalog::from_preset("andf").unwrap();

        let by_key = catalog.metadata("enregistrement_individuel").unwrap();
        let by_file = catalog.metadata("enregistrement individuel").unwrap();
        assert_eq!(by_key, by_file);
        assert_eq!(by_key.color, "#00b894");

        let parcelle = catalog.metadata("parcelles").unwrap();
        assert_eq!(parcelle.key, "parcelle");
        assert_eq!(parcelle.stroke_width, 1.0);

        assert!(catalog.metadata("inconnue").is_none());
    }

    #[tokio::test]
    async fn test_load_catalog_file() {
        let dir = std::env::temp_dir().join(format!("andf-catalog-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("catalog.json");
        tokio::fs::write(
            &path,
            r##"{"layers": [{"key": "aif", "file": "aif", "name": "AIF", "color": "#ff0000",
                "opacity": 0.5, "strokeColor": "#aa0000", "strokeWidth": 2.0}]}"##,
        )
        .await
        .unwrap();

        let catalog = Catalog::load(&path).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.metadata("aif").unwrap().stroke_color, "#aa0000");
        assert!(Catalog::load(&dir.join("absent.json")).await.is_err());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Catalog::from_preset("full").is_err());
    }

    #[test]
    fn test_parse_projection() {
        assert_eq!(parse_projection(None).unwrap(), ProjectionKind::Linear);
        assert_eq!(parse_projection(Some(" ")).unwrap(), ProjectionKind::Linear);
        assert_eq!(parse_projection(Some("UTM")).unwrap(), ProjectionKind::Utm);

        let err = parse_projection(Some("utn")).unwrap_err();
        assert!(format!("{:#}", err).contains("utn"), "{:#}", err);
        assert!(err.to_string().contains("ANDF_PROJECTION"));
    }

    #[test]
    fn test_from_env_rejects_unknown_projection() {
        // Seul test qui touche à ANDF_PROJECTION
        std::env::set_var("ANDF_PROJECTION", "utn");
        let result = Config::from_env();
        std::env::remove_var("ANDF_PROJECTION");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.projection, ProjectionKind::Linear);
        assert!(config.tile_url.contains("openstreetmap"));
        assert!(config.layers_dir.is_none());
    }
}
