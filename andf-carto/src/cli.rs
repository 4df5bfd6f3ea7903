//! Définition et implémentation des commandes CLI
//!
//! Flux principal : coordonnées ou levé → analyse → session → carte / rapport.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use andf_carto::api::{
    spawn_upload, AnalysisApi, Analyzer, HttpAnalysisApi, ImageUpload, LocalAnalysis, UploadEvent,
};
use andf_carto::config::{Catalog, Config};
use andf_carto::input::{parse_coordinates, parse_point};
use andf_carto::layers::{
    ConfiguredSource, FsLayerSource, HttpLayerSource, LayerCache, LayerLoader, LayerStats,
    LoadOutcome,
};
use andf_carto::render::{MapProps, MapRenderer, RegulatoryOverlay, StyleDocument};
use andf_carto::report::AnalysisReport;
use andf_carto::session::SessionStore;
use anyhow::{Context, Result};
use clap::Subcommand;
use empietement::{AnalysisResult, Composer, Coordinate, LngLat, Projector};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse a parcel from its projected coordinates (X Easting, Y Northing)
    Coords {
        /// File with one "X Y" pair per line, or a JSON array ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Vertex "X,Y" (repeat for each vertex)
        #[arg(short, long = "point")]
        points: Vec<String>,

        /// Run the analysis locally against projected layer files (ANDF_LAYERS_DIR)
        #[arg(long)]
        local: bool,

        /// Do not store the result in the session
        #[arg(long)]
        no_save: bool,
    },

    /// Upload a scanned survey plan (image or PDF) for analysis
    Image {
        /// Path to the survey file
        path: PathBuf,

        /// Do not store the result in the session
        #[arg(long)]
        no_save: bool,
    },

    /// Check that the analysis API is reachable
    Health,

    /// Load regulatory layers and show what was loaded
    Layers {
        /// Layer keys or file names (défaut : tout le catalogue)
        names: Vec<String>,

        /// Print feature count, geometry types and bounds per layer
        #[arg(long)]
        stats: bool,
    },

    /// Build the map scene of the last analysis
    Map {
        /// Output file (défaut : stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also draw the regulatory layers of the catalog
        #[arg(long)]
        overlays: bool,

        /// Write a GeoJSON FeatureCollection instead of a MapLibre style
        #[arg(long)]
        geojson: bool,
    },

    /// Convert a projected coordinate to longitude/latitude
    Project {
        x: f64,
        y: f64,

        /// Convert longitude/latitude back to projected coordinates
        #[arg(long)]
        inverse: bool,
    },

    /// Print the report of the last analysis
    Report {
        /// Save the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remove the stored analysis
        #[arg(long)]
        clear: bool,
    },
}

/// Source des couches selon la configuration (répertoire prioritaire)
fn layer_source(config: &Config) -> Result<ConfiguredSource> {
    if let Some(dir) = &config.layers_dir {
        return Ok(ConfiguredSource::Fs(FsLayerSource::new(dir)));
    }
    if let Some(url) = &config.layers_url {
        return Ok(ConfiguredSource::Http(HttpLayerSource::new(url.as_str())));
    }
    anyhow::bail!("Aucune source de couches: définir ANDF_LAYERS_DIR ou ANDF_LAYERS_URL")
}

fn loader(config: &Config, catalog: &Arc<Catalog>) -> Result<LayerLoader<ConfiguredSource>> {
    Ok(LayerLoader::new(
        layer_source(config)?,
        Arc::clone(catalog),
        Arc::new(LayerCache::new()),
    ))
}

/// Lit les sommets depuis `--point` ou depuis un fichier / stdin
async fn read_points(file: Option<&Path>, points: &[String]) -> Result<Vec<Coordinate>> {
    if !points.is_empty() {
        return points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                parse_point(p).with_context(|| format!("Point P{} illisible: '{}'", i + 1, p))
            })
            .collect();
    }

    let text = match file {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read coordinates file: {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read coordinates from stdin")?;
            buffer
        }
    };
    Ok(parse_coordinates(&text)?)
}

async fn analyse_with<A: AnalysisApi>(
    analyzer: &Analyzer<A>,
    points: &[Coordinate],
) -> Result<AnalysisResult> {
    let (parcel, result) = analyzer.analyse_coordinates(points).await?;
    debug!(points = parcel.len(), "Parcelle analysée");
    Ok(result)
}

async fn store_and_report(
    config: &Config,
    catalog: &Catalog,
    source: &str,
    result: &AnalysisResult,
    outcome: Option<&LoadOutcome>,
    save: bool,
) -> Result<()> {
    if save {
        let store = SessionStore::new(&config.session_dir);
        store
            .save(result)
            .await
            .context("Failed to store the analysis in the session")?;
        info!(path = %store.path().display(), "Analyse enregistrée");
    }

    let mut report = AnalysisReport::from_result(source, result, Some(catalog));
    if let Some(outcome) = outcome {
        report.record_load_errors(outcome);
    }
    report.display();
    info!("{}", report.summary());
    Ok(())
}

/// Exécute la commande coords
pub async fn cmd_coords(
    config: &Config,
    catalog: &Arc<Catalog>,
    file: Option<&Path>,
    points: &[String],
    local: bool,
    save: bool,
) -> Result<()> {
    let points = read_points(file, points).await?;

    if local {
        let loader = loader(config, catalog)?;
        let (backend, outcome) = LocalAnalysis::from_loader(&loader).await;
        let analyzer = Analyzer::new(backend, config.bounds);
        let result = analyse_with(&analyzer, &points).await?;
        store_and_report(config, catalog, "coords (local)", &result, Some(&outcome), save).await
    } else {
        let analyzer = Analyzer::new(HttpAnalysisApi::new(config.api_url.as_str()), config.bounds);
        let result = analyse_with(&analyzer, &points).await?;
        store_and_report(config, catalog, "coords", &result, None, save).await
    }
}

/// Exécute la commande image
pub async fn cmd_image(config: &Config, catalog: &Catalog, path: &Path, save: bool) -> Result<()> {
    let upload = ImageUpload::from_path(path).await?;
    let api = Arc::new(HttpAnalysisApi::new(config.api_url.as_str()));
    let mut task = spawn_upload(api, upload);

    let mut last_percent = None;
    while let Some(event) = task.events.recv().await {
        match &event {
            UploadEvent::Started { file_name, total } => {
                info!(file = %file_name, bytes = total, "Envoi du levé")
            }
            UploadEvent::Progress { .. } => {
                // Un log par palier de 10 %
                let percent = event.percent().map(|p| p / 10 * 10);
                if percent != last_percent {
                    info!(percent = ?percent, "Envoi en cours");
                    last_percent = percent;
                }
            }
            UploadEvent::Processing => info!("Analyse du levé en cours"),
            UploadEvent::Finished { success } => debug!(success, "Upload terminé"),
        }
    }

    let result = task.finish().await?;
    let source = path
        .file_name()
        .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().to_string());
    store_and_report(config, catalog, &source, &result, None, save).await
}

/// Exécute la commande health
pub async fn cmd_health(config: &Config) -> Result<()> {
    let api = HttpAnalysisApi::new(config.api_url.as_str());
    let status = api
        .health()
        .await
        .with_context(|| format!("L'API n'est pas accessible: {}", config.api_url))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Exécute la commande layers
pub async fn cmd_layers(
    config: &Config,
    catalog: &Arc<Catalog>,
    names: &[String],
    stats: bool,
) -> Result<()> {
    let loader = loader(config, catalog)?;
    let outcome = if names.is_empty() {
        loader.load_all().await
    } else {
        loader.load_many(names).await
    };

    println!(
        "{} couche(s) chargée(s), {} erreur(s)",
        outcome.loaded.len(),
        outcome.errors.len()
    );
    for (key, collection) in &outcome.loaded {
        let name = catalog.metadata(key).map_or(key.as_str(), |d| d.name.as_str());
        if stats {
            let s = LayerStats::of(collection);
            println!(
                "  {} ({}): {} features {:?}",
                key, name, s.total_features, s.geometry_types
            );
            if let Some(b) = s.bounds {
                println!(
                    "    emprise [{:.6}, {:.6}] - [{:.6}, {:.6}], centre {:?}",
                    b.min_lng,
                    b.min_lat,
                    b.max_lng,
                    b.max_lat,
                    b.center()
                );
            }
        } else {
            println!("  {} ({}): {} features", key, name, collection.features.len());
        }
    }
    for e in &outcome.errors {
        println!("  {}: {}", e.layer, e.error);
    }
    Ok(())
}

async fn load_session(config: &Config) -> Result<AnalysisResult> {
    SessionStore::new(&config.session_dir)
        .load()
        .await
        .context("Lancer d'abord une analyse (andf-carto coords / image)")
}

/// Exécute la commande map
pub async fn cmd_map(
    config: &Config,
    catalog: &Arc<Catalog>,
    output: Option<&Path>,
    overlays: bool,
    geojson: bool,
) -> Result<()> {
    let result = load_session(config).await?;
    let projector = Projector::new(config.projection)?;
    let composition = Composer::new(&projector)
        .with_labels(catalog.labels())
        .compose_result(&result)?;
    if !composition.skipped.is_empty() {
        warn!(layers = ?composition.skipped, "Géométries ignorées");
    }

    let json = if geojson {
        serde_json::to_value(composition.to_feature_collection())?
    } else {
        let outcome = if overlays {
            loader(config, catalog)?.load_all().await
        } else {
            LoadOutcome::default()
        };
        let layers: Vec<RegulatoryOverlay> = catalog
            .layers
            .iter()
            .filter_map(|def| {
                outcome.loaded.get(&def.key).map(|features| RegulatoryOverlay {
                    definition: def,
                    features: Arc::clone(features),
                })
            })
            .collect();

        let props = MapProps::for_composition(&composition)
            .with_catalog(catalog)
            .with_overlays(layers);
        let mut style = StyleDocument::new();
        MapRenderer::new(config.tile_url.as_str()).render(&mut style, &props);
        style.to_json()
    };

    let text = serde_json::to_string_pretty(&json)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write map: {}", path.display()))?;
            info!(path = %path.display(), "Carte écrite");
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Exécute la commande project
pub fn cmd_project(config: &Config, x: f64, y: f64, inverse: bool) -> Result<()> {
    let projector = Projector::new(config.projection)?;
    if inverse {
        let c = projector.unproject(LngLat::new(x, y))?;
        println!("X={:.3} Y={:.3}", c.x, c.y);
    } else {
        let p = projector.project(Coordinate::new(x, y))?;
        println!("lng={:.7} lat={:.7}", p.lng, p.lat);
    }
    debug!(projector = projector.description(), "Conversion effectuée");
    Ok(())
}

/// Exécute la commande report
pub async fn cmd_report(
    config: &Config,
    catalog: &Catalog,
    output: Option<&Path>,
    clear: bool,
) -> Result<()> {
    if clear {
        let removed = SessionStore::new(&config.session_dir).clear().await?;
        println!(
            "{}",
            if removed {
                "Analyse supprimée"
            } else {
                "Aucune analyse enregistrée"
            }
        );
        return Ok(());
    }

    let result = load_session(config).await?;
    let mut report = AnalysisReport::from_result("session", &result, Some(catalog));

    let projector = Projector::new(config.projection)?;
    let composition = Composer::new(&projector).compose_result(&result)?;
    report.record_skipped(&composition.skipped);

    report.display();
    if let Some(path) = output {
        report
            .save_to_file(path)
            .await
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Rapport écrit");
    }
    Ok(())
}
