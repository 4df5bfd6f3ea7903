//! # empietement
//!
//! Modèle de données et géométrie pour le contrôle d'empiètement des parcelles
//! sur les couches réglementaires de l'ANDF (Bénin).
//!
//! ## Features
//!
//! - Validation des coordonnées saisies (au moins 3 sommets, bornes configurables)
//! - Projection des coordonnées locales vers WGS84 (linéaire, UTM 31N, PROJ)
//! - Lecture tolérante des résultats d'analyse (géométries WKT ou GeoJSON)
//! - Composition parcelle + couches en `Feature` GeoJSON prêtes à afficher
//! - Analyse d'empiètement locale, parallélisée par couche (rayon)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use empietement::{validate_parcel, Composer, CoordinateBounds, Coordinate, Projector};
//!
//! let parcel = validate_parcel(&points, &CoordinateBounds::default())?;
//! let result = empietement::AnalysisResult::from_json(&body)?;
//!
//! let projector = Projector::default();
//! let scene = Composer::new(&projector).compose(&parcel, &result)?;
//! println!("{}", scene.to_feature_collection());
//! ```

pub mod compose;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod project;
pub mod types;
pub mod validate;

pub use compose::{ComposedFeature, Composer, Composition, FeatureKind};
pub use engine::{EncroachmentEngine, ReferenceLayer};
pub use error::{EmpietementError, Result};
pub use geometry::{to_geojson, Envelope};
pub use project::{ProjectionKind, Projector};
pub use types::{
    AnalysisResult, Coordinate, GeometryPayload, LayerOutcome, LngLat, Parcel,
    ParcelCoordinates,
};
pub use validate::{validate_parcel, CoordinateBounds};
