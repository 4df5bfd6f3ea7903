//! Surface de dessin et document de style MapLibre

use serde_json::{json, Map, Value};

/// Données d'une source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    /// Tuiles raster XYZ
    Raster {
        tiles: Vec<String>,
        tile_size: u32,
        attribution: String,
    },
    /// Données GeoJSON (Feature ou FeatureCollection)
    GeoJson(geojson::GeoJson),
}

/// Type et peinture d'une couche
#[derive(Debug, Clone, PartialEq)]
pub enum LayerPaint {
    Raster,
    Fill { color: String, opacity: f64 },
    Line { color: String, width: f64 },
}

/// Couche à dessiner
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: LayerPaint,
}

/// Ce que le rendu attend d'une carte
pub trait MapSurface {
    fn add_source(&mut self, id: &str, data: SourceData);
    fn add_layer(&mut self, layer: LayerSpec);
    /// Retourne vrai si la couche existait
    fn remove_layer(&mut self, id: &str) -> bool;
    /// Retourne vrai si la source existait
    fn remove_source(&mut self, id: &str) -> bool;
    fn set_view(&mut self, center: [f64; 2], zoom: f64);
    /// Cadre la vue sur `[[min_lng, min_lat], [max_lng, max_lat]]`
    fn fit_bounds(&mut self, bounds: [[f64; 2]; 2], padding: u32);
}

/// Document de style MapLibre (version 8) construit en mémoire
#[derive(Debug, Clone, Default)]
pub struct StyleDocument {
    sources: Vec<(String, SourceData)>,
    layers: Vec<LayerSpec>,
    center: Option<[f64; 2]>,
    zoom: Option<f64>,
    fit: Option<([[f64; 2]; 2], u32)>,
}

impl StyleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceData> {
        self.sources.iter().find(|(s, _)| s == id).map(|(_, d)| d)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn center(&self) -> Option<[f64; 2]> {
        self.center
    }

    pub fn zoom(&self) -> Option<f64> {
        self.zoom
    }

    /// Dernier cadrage demandé
    pub fn fitted_bounds(&self) -> Option<([[f64; 2]; 2], u32)> {
        self.fit
    }

    /// Sérialise en style MapLibre ; le cadrage est rangé dans `metadata`
    pub fn to_json(&self) -> Value {
        let mut sources = Map::new();
        for (id, data) in &self.sources {
            let value = match data {
                SourceData::Raster {
                    tiles,
                    tile_size,
                    attribution,
                } => json!({
                    "type": "raster",
                    "tiles": tiles,
                    "tileSize": tile_size,
                    "attribution": attribution,
                }),
                SourceData::GeoJson(data) => json!({ "type": "geojson", "data": data }),
            };
            sources.insert(id.clone(), value);
        }

        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|l| match &l.paint {
                LayerPaint::Raster => json!({ "id": l.id, "type": "raster", "source": l.source }),
                LayerPaint::Fill { color, opacity } => json!({
                    "id": l.id,
                    "type": "fill",
                    "source": l.source,
                    "paint": {
                        "fill-color": color,
                        "fill-opacity": opacity,
                        "fill-outline-color": color,
                    },
                }),
                LayerPaint::Line { color, width } => json!({
                    "id": l.id,
                    "type": "line",
                    "source": l.source,
                    "paint": { "line-color": color, "line-width": width },
                }),
            })
            .collect();

        let mut style = json!({
            "version": 8,
            "sources": sources,
            "layers": layers,
        });
        if let Some(center) = self.center {
            style["center"] = json!(center);
        }
        if let Some(zoom) = self.zoom {
            style["zoom"] = json!(zoom);
        }
        if let Some((bounds, padding)) = self.fit {
            style["metadata"] = json!({ "andf:fitBounds": { "bounds": bounds, "padding": padding } });
        }
        style
    }
}

impl MapSurface for StyleDocument {
    fn add_source(&mut self, id: &str, data: SourceData) {
        self.remove_source(id);
        self.sources.push((id.to_string(), data));
    }

    fn add_layer(&mut self, layer: LayerSpec) {
        self.remove_layer(&layer.id);
        self.layers.push(layer);
    }

    fn remove_layer(&mut self, id: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        self.layers.len() != before
    }

    fn remove_source(&mut self, id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|(s, _)| s != id);
        self.sources.len() != before
    }

    fn set_view(&mut self, center: [f64; 2], zoom: f64) {
        self.center = Some(center);
        self.zoom = Some(zoom);
    }

    fn fit_bounds(&mut self, bounds: [[f64; 2]; 2], padding: u32) {
        self.fit = Some((bounds, padding));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_json() {
        let mut doc = StyleDocument::new();
        doc.add_source(
            "osm",
            SourceData::Raster {
                tiles: vec!["https://a.tile.openstreetmap.org/{z}/{x}/{y}.png".into()],
                tile_size: 256,
                attribution: "OSM".into(),
            },
        );
        doc.add_layer(LayerSpec {
            id: "osm-base".into(),
            source: "osm".into(),
            paint: LayerPaint::Raster,
        });
        doc.set_view([2.3544, 6.3725], 16.0);

        let style = doc.to_json();
        assert_eq!(style["version"], 8);
        assert_eq!(style["sources"]["osm"]["type"], "raster");
        assert_eq!(style["layers"][0]["id"], "osm-base");
        assert_eq!(style["zoom"], 16.0);
        assert!(style.get("metadata").is_none());
    }

    #[test]
    fn test_add_replaces_same_id() {
        let mut doc = StyleDocument::new();
        for opacity in [0.2, 0.4] {
            doc.add_layer(LayerSpec {
                id: "zone_libre".into(),
                source: "zone_libre".into(),
                paint: LayerPaint::Fill {
                    color: "green".into(),
                    opacity,
                },
            });
        }
        assert_eq!(doc.layer_ids().count(), 1);
        assert!(doc.remove_layer("zone_libre"));
        assert!(!doc.remove_layer("zone_libre"));
    }
}
