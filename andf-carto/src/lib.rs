//! # andf-carto
//!
//! Contrôle d'empiètement d'une parcelle sur les couches réglementaires ANDF.
//!
//! ## Features
//!
//! - Validation des coordonnées projetées saisies (X Easting, Y Northing)
//! - Client de l'API d'analyse (coordonnées, levé scanné avec progression)
//! - Analyse locale hors ligne sur les fichiers GeoJSON des couches
//! - Chargement concurrent des couches avec cache
//! - Scène cartographique (style MapLibre) et rapport
//!
//! ## Usage CLI
//!
//! ```bash
//! # Analyse par l'API, résultat conservé en session
//! andf-carto coords -p "395400,793850" -p "395500,793850" -p "395500,793950"
//!
//! # Levé scanné
//! andf-carto image ./leve.png
//!
//! # Carte et rapport de la dernière analyse
//! andf-carto map --overlays --output carte.json
//! andf-carto report --output rapport.json
//! ```

pub mod api;
pub mod config;
pub mod input;
pub mod layers;
pub mod render;
pub mod report;
pub mod session;

pub use config::{Catalog, Config, LayerDefinition};
pub use report::{AnalysisReport, AnalysisStatus};
pub use session::SessionStore;
