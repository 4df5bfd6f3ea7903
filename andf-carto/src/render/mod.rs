//! Rendu de la scène cartographique
//!
//! Le rendu est une fonction de ses propriétés : chaque appel à `render`
//! supprime ce que le rendu précédent avait créé avant de tout redessiner.

mod surface;

pub use surface::{LayerPaint, LayerSpec, MapSurface, SourceData, StyleDocument};

use std::collections::BTreeMap;
use std::sync::Arc;

use empietement::{ComposedFeature, Composition, Envelope, FeatureKind};
use geojson::{FeatureCollection, GeoJson};
use tracing::debug;

use crate::config::{Catalog, LayerDefinition, DEFAULT_TILE_URL};
use crate::layers::LayerStats;

pub const DEFAULT_ZOOM: f64 = 16.0;
pub const FILL_OPACITY: f64 = 0.4;
pub const LINE_WIDTH: f64 = 3.0;
/// Marge du cadrage au clic sur une couche
pub const CLICK_PADDING: u32 = 20;
/// Marge du cadrage initial sur la parcelle
pub const CENTER_PADDING: u32 = 120;

pub const PARCEL_COLOR: &str = "#3B82F6";
pub const PARCEL_CONFLICT_COLOR: &str = "#EF4444";
pub const ENCROACHMENT_COLOR: &str = "red";
pub const FREE_AREA_COLOR: &str = "green";

const BASE_SOURCE: &str = "osm-tiles";
const BASE_LAYER: &str = "osm-base";
const BORDER_SUFFIX: &str = "-border";
const ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

/// Couche réglementaire à afficher
#[derive(Debug, Clone)]
pub struct RegulatoryOverlay<'a> {
    pub definition: &'a LayerDefinition,
    pub features: Arc<FeatureCollection>,
}

/// Propriétés d'un rendu
#[derive(Debug, Clone)]
pub struct MapProps<'a> {
    pub center: [f64; 2],
    pub zoom: f64,
    pub composition: &'a Composition,
    pub overlays: Vec<RegulatoryOverlay<'a>>,
    /// Pour colorer les intersections comme leur couche
    pub catalog: Option<&'a Catalog>,
}

impl<'a> MapProps<'a> {
    /// Vue centrée sur la parcelle (sinon sur l'ensemble), zoom par défaut
    pub fn for_composition(composition: &'a Composition) -> Self {
        let center = focus(composition).map_or([0.0, 0.0], |e| e.center());
        Self {
            center,
            zoom: DEFAULT_ZOOM,
            composition,
            overlays: Vec::new(),
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: &'a Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_overlays(mut self, overlays: Vec<RegulatoryOverlay<'a>>) -> Self {
        self.overlays = overlays;
        self
    }
}

/// Rendu de la scène sur une `MapSurface`
#[derive(Debug)]
pub struct MapRenderer {
    tile_url: String,
    layers: Vec<String>,
    sources: Vec<String>,
    popups: BTreeMap<String, String>,
    extents: BTreeMap<String, Envelope>,
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_URL)
    }
}

impl MapRenderer {
    pub fn new(tile_url: impl Into<String>) -> Self {
        Self {
            tile_url: tile_url.into(),
            layers: Vec::new(),
            sources: Vec::new(),
            popups: BTreeMap::new(),
            extents: BTreeMap::new(),
        }
    }

    /// Identifiants des couches créées par le dernier rendu
    pub fn rendered_layers(&self) -> &[String] {
        &self.layers
    }

    pub fn render<S: MapSurface>(&mut self, surface: &mut S, props: &MapProps<'_>) {
        self.teardown(surface);
        surface.set_view(props.center, props.zoom);

        surface.add_source(
            BASE_SOURCE,
            SourceData::Raster {
                tiles: expand_subdomains(&self.tile_url),
                tile_size: 256,
                attribution: ATTRIBUTION.into(),
            },
        );
        self.sources.push(BASE_SOURCE.into());
        surface.add_layer(LayerSpec {
            id: BASE_LAYER.into(),
            source: BASE_SOURCE.into(),
            paint: LayerPaint::Raster,
        });
        self.layers.push(BASE_LAYER.into());

        // Couches réglementaires sous les résultats d'analyse
        for overlay in &props.overlays {
            let def = overlay.definition;
            let id = format!("couche_{}", def.key);
            self.add_pair(
                surface,
                &id,
                GeoJson::FeatureCollection((*overlay.features).clone()),
                LayerPaint::Fill {
                    color: def.color.clone(),
                    opacity: def.opacity,
                },
                LayerPaint::Line {
                    color: def.stroke_color.clone(),
                    width: def.stroke_width,
                },
                &def.name,
                LayerStats::of(&overlay.features).bounds,
            );
        }

        let composition = props.composition;
        let analysis = composition
            .free_area
            .iter()
            .chain(composition.union_intersections.iter())
            .chain(composition.intersections.iter())
            .chain(composition.parcel.iter());
        for feature in analysis {
            let color = feature_color(feature, composition.empietement, props.catalog);
            self.add_pair(
                surface,
                &feature.id,
                GeoJson::Feature(feature.to_geojson()),
                LayerPaint::Fill {
                    color: color.clone(),
                    opacity: FILL_OPACITY,
                },
                LayerPaint::Line {
                    color,
                    width: LINE_WIDTH,
                },
                &feature.popup,
                feature.envelope(),
            );
        }

        if let Some(envelope) = focus(composition) {
            surface.fit_bounds(envelope.corners(), CENTER_PADDING);
        }

        debug!(
            layers = self.layers.len(),
            sources = self.sources.len(),
            empietement = composition.empietement,
            "Carte rendue"
        );
    }

    /// Texte de la popup d'une couche (remplissage ou contour)
    pub fn popup(&self, layer_id: &str) -> Option<&str> {
        let id = layer_id.strip_suffix(BORDER_SUFFIX).unwrap_or(layer_id);
        self.popups.get(id).map(String::as_str)
    }

    /// Clic sur une couche : popup et cadrage sur l'emprise de l'entité
    pub fn click<S: MapSurface>(&self, surface: &mut S, layer_id: &str) -> Option<&str> {
        let id = layer_id.strip_suffix(BORDER_SUFFIX).unwrap_or(layer_id);
        let popup = self.popups.get(id)?;
        if let Some(extent) = self.extents.get(id) {
            surface.fit_bounds(extent.corners(), CLICK_PADDING);
        }
        Some(popup.as_str())
    }

    /// Supprime tout ce que le renderer a créé
    pub fn unmount<S: MapSurface>(&mut self, surface: &mut S) {
        self.teardown(surface);
    }

    #[allow(clippy::too_many_arguments)]
    fn add_pair<S: MapSurface>(
        &mut self,
        surface: &mut S,
        id: &str,
        data: GeoJson,
        fill: LayerPaint,
        line: LayerPaint,
        popup: &str,
        extent: Option<Envelope>,
    ) {
        surface.add_source(id, SourceData::GeoJson(data));
        self.sources.push(id.to_string());

        let border = format!("{}{}", id, BORDER_SUFFIX);
        surface.add_layer(LayerSpec {
            id: id.to_string(),
            source: id.to_string(),
            paint: fill,
        });
        surface.add_layer(LayerSpec {
            id: border.clone(),
            source: id.to_string(),
            paint: line,
        });
        self.layers.push(id.to_string());
        self.layers.push(border);

        self.popups.insert(id.to_string(), popup.to_string());
        if let Some(extent) = extent {
            self.extents.insert(id.to_string(), extent);
        }
    }

    /// Les couches d'abord, puis les sources qu'elles utilisent
    fn teardown<S: MapSurface>(&mut self, surface: &mut S) {
        for id in self.layers.drain(..).rev() {
            surface.remove_layer(&id);
        }
        for id in self.sources.drain(..) {
            surface.remove_source(&id);
        }
        self.popups.clear();
        self.extents.clear();
    }
}

/// Emprise de cadrage : la parcelle, ou toutes les features sans parcelle
fn focus(composition: &Composition) -> Option<Envelope> {
    composition
        .parcel
        .as_ref()
        .and_then(ComposedFeature::envelope)
        .or_else(|| composition.envelope())
}

fn feature_color(feature: &ComposedFeature, empietement: bool, catalog: Option<&Catalog>) -> String {
    match &feature.kind {
        FeatureKind::Parcel if empietement => PARCEL_CONFLICT_COLOR.into(),
        FeatureKind::Parcel => PARCEL_COLOR.into(),
        FeatureKind::Encroachment => ENCROACHMENT_COLOR.into(),
        FeatureKind::FreeArea => FREE_AREA_COLOR.into(),
        FeatureKind::LayerIntersection { layer } => catalog
            .and_then(|c| c.metadata(layer))
            .map_or_else(|| ENCROACHMENT_COLOR.into(), |def| def.stroke_color.clone()),
    }
}

/// `{s}` n'est pas compris par MapLibre : une URL par sous-domaine
fn expand_subdomains(template: &str) -> Vec<String> {
    if template.contains("{s}") {
        ["a", "b", "c"]
            .iter()
            .map(|s| template.replace("{s}", s))
            .collect()
    } else {
        vec![template.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use empietement::{AnalysisResult, Composer, Coordinate, Parcel, Projector};

    fn composition(empietement: bool) -> Composition {
        let parcel = Parcel::new(vec![
            Coordinate::new(395400.0, 793850.0),
            Coordinate::new(395500.0, 793850.0),
            Coordinate::new(395500.0, 793950.0),
        ])
        .unwrap();
        let json = format!(
            r#"{{
                "aif": {{"has_intersection": {e}, "intersections_sur_couche": "POLYGON ((395400 793850, 395450 793850, 395450 793900, 395400 793850))", "reste_sur_couche": null}},
                "parcelle_libre_finale": null,
                "union_intersections": null,
                "empietement": {e},
                "coordonnees_parcelle": []
            }}"#,
            e = empietement
        );
        let result = AnalysisResult::from_json(&json).unwrap();
        Composer::new(&Projector::default())
            .compose(&parcel, &result)
            .unwrap()
    }

    fn fill_color(doc: &StyleDocument, id: &str) -> String {
        match &doc.layer(id).unwrap().paint {
            LayerPaint::Fill { color, .. } => color.clone(),
            other => panic!("Expected fill layer, got {:?}", other),
        }
    }

    #[test]
    fn test_parcel_color_follows_empietement() {
        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();

        let conflict = composition(true);
        renderer.render(&mut doc, &MapProps::for_composition(&conflict));
        assert_eq!(fill_color(&doc, "parcelle_entiere"), PARCEL_CONFLICT_COLOR);

        let clean = composition(false);
        renderer.render(&mut doc, &MapProps::for_composition(&clean));
        assert_eq!(fill_color(&doc, "parcelle_entiere"), PARCEL_COLOR);
        assert!(doc.layer("intersection_aif").is_none());
    }

    #[test]
    fn test_rerender_does_not_duplicate() {
        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();
        let scene = composition(true);
        let props = MapProps::for_composition(&scene);

        renderer.render(&mut doc, &props);
        let first: Vec<String> = doc.layer_ids().map(String::from).collect();
        renderer.render(&mut doc, &props);
        let second: Vec<String> = doc.layer_ids().map(String::from).collect();

        assert_eq!(first, second);
        // fond + (parcelle + intersection aif) x (remplissage + contour)
        assert_eq!(first.len(), 5);
        assert_eq!(doc.zoom(), Some(DEFAULT_ZOOM));
    }

    #[test]
    fn test_unmount_removes_everything() {
        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();
        let scene = composition(true);
        renderer.render(&mut doc, &MapProps::for_composition(&scene));

        renderer.unmount(&mut doc);
        assert_eq!(doc.layer_ids().count(), 0);
        assert_eq!(doc.source_count(), 0);
        assert!(renderer.rendered_layers().is_empty());
    }

    #[test]
    fn test_click_popup_and_fit() {
        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();
        let scene = composition(true);
        renderer.render(&mut doc, &MapProps::for_composition(&scene));
        assert_eq!(doc.fitted_bounds().unwrap().1, CENTER_PADDING);

        let popup = renderer.click(&mut doc, "intersection_aif-border").unwrap();
        assert_eq!(popup, "Empiètement sur aif");
        assert_eq!(doc.fitted_bounds().unwrap().1, CLICK_PADDING);

        assert!(renderer.click(&mut doc, "inconnue").is_none());
    }

    #[test]
    fn test_overlay_uses_catalog_style() {
        let catalog = Catalog::from_preset("andf").unwrap();
        let def = catalog.metadata("dpm").unwrap();
        let features = Arc::new(FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        });

        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();
        let scene = composition(true);
        let props = MapProps::for_composition(&scene)
            .with_catalog(&catalog)
            .with_overlays(vec![RegulatoryOverlay {
                definition: def,
                features,
            }]);
        renderer.render(&mut doc, &props);

        assert_eq!(fill_color(&doc, "couche_dpm"), "#45b7d1");
        assert_eq!(fill_color(&doc, "intersection_aif"), "#d63031");
        assert_eq!(renderer.popup("couche_dpm"), Some(def.name.as_str()));
    }

    #[test]
    fn test_render_without_parcel() {
        let result = AnalysisResult::from_json(
            r#"{
                "aif": {"has_intersection": true, "intersections_sur_couche": "POLYGON ((395400 793850, 395450 793850, 395450 793900, 395400 793850))", "reste_sur_couche": null},
                "parcelle_libre_finale": null,
                "union_intersections": null,
                "empietement": true,
                "coordonnees_parcelle": null
            }"#,
        )
        .unwrap();
        let scene = Composer::new(&Projector::default())
            .compose_result(&result)
            .unwrap();

        let mut doc = StyleDocument::new();
        let mut renderer = MapRenderer::default();
        renderer.render(&mut doc, &MapProps::for_composition(&scene));

        assert!(doc.layer("parcelle_entiere").is_none());
        assert!(doc.layer("intersection_aif").is_some());
        // Cadrage sur l'intersection faute de parcelle
        let (bounds, padding) = doc.fitted_bounds().unwrap();
        assert_eq!(padding, CENTER_PADDING);
        assert!((bounds[0][0] - 2.3544).abs() < 1e-9);
        assert!(doc.center().unwrap()[0] > 2.3544);
    }

    #[test]
    fn test_expand_subdomains() {
        let tiles = expand_subdomains(DEFAULT_TILE_URL);
        assert_eq!(tiles.len(), 3);
        assert!(tiles[0].starts_with("https://a.tile"));
        assert_eq!(expand_subdomains("http://t/{z}/{x}/{y}.png").len(), 1);
    }
}
