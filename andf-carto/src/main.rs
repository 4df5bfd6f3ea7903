//! Point d'entrée CLI pour andf-carto

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use andf_carto::config::{Catalog, Config};
use empietement::ProjectionKind;

/// `.env` du répertoire courant (ou d'un parent), sinon celui placé à côté du binaire
fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Contrôle d'empiètement des parcelles sur les couches réglementaires ANDF
#[derive(Parser)]
#[command(name = "andf-carto")]
#[command(author, version)]
#[command(about = "Analyse d'empiètement des parcelles et carte des couches réglementaires ANDF")]
#[command(long_about = "Valide les coordonnées d'une parcelle, les envoie à l'API d'analyse (ou analyse en local), conserve le résultat et produit la carte et le rapport.\n\nVariables d'environnement : ANDF_API_URL, ANDF_LAYERS_URL, ANDF_LAYERS_DIR, ANDF_SESSION_DIR, ANDF_TILE_URL, ANDF_PROJECTION.")]
struct Cli {
    /// Verbosité des logs (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Analysis API root (défaut : env ANDF_API_URL / http://localhost:8000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory of <layer>.geojson files (défaut : env ANDF_LAYERS_DIR)
    #[arg(long, global = true)]
    layers_dir: Option<PathBuf>,

    /// Base URL of <layer>.geojson files (défaut : env ANDF_LAYERS_URL)
    #[arg(long, global = true)]
    layers_url: Option<String>,

    /// Session directory (défaut : env ANDF_SESSION_DIR / .andf)
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    /// Projection: linear, utm, proj (défaut : env ANDF_PROJECTION / linear)
    #[arg(long, global = true)]
    projection: Option<ProjectionKind>,

    /// Layer catalog JSON file (défaut : catalogue ANDF embarqué)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Configuration de l'environnement, surchargée par les options
    fn config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.layers_dir {
            config.layers_dir = Some(dir.clone());
        }
        if let Some(url) = &self.layers_url {
            config.layers_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(dir) = &self.session_dir {
            config.session_dir = dir.clone();
        }
        if let Some(kind) = self.projection {
            config.projection = kind;
        }
        Ok(config)
    }

    async fn catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(path).await,
            None => Catalog::from_preset("andf"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Les variables ANDF_* peuvent venir du .env
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = cli.config()?;
    let catalog = Arc::new(cli.catalog().await?);
    debug!(?config, layers = catalog.len(), "Configuration chargée");

    match cli.command {
        Commands::Coords {
            file,
            points,
            local,
            no_save,
        } => {
            cli::cmd_coords(&config, &catalog, file.as_deref(), &points, local, !no_save).await?;
        }
        Commands::Image { path, no_save } => {
            cli::cmd_image(&config, &catalog, &path, !no_save).await?;
        }
        Commands::Health => {
            cli::cmd_health(&config).await?;
        }
        Commands::Layers { names, stats } => {
            cli::cmd_layers(&config, &catalog, &names, stats).await?;
        }
        Commands::Map {
            output,
            overlays,
            geojson,
        } => {
            cli::cmd_map(&config, &catalog, output.as_deref(), overlays, geojson).await?;
        }
        Commands::Project { x, y, inverse } => {
            cli::cmd_project(&config, x, y, inverse)?;
        }
        Commands::Report { output, clear } => {
            cli::cmd_report(&config, &catalog, output.as_deref(), clear).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
