//! Cache explicite des couches chargées

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use geojson::FeatureCollection;

/// Couches déjà chargées, partagées par `Arc`.
///
/// Une entrée n'est retirée que par `invalidate` ou `clear`.
#[derive(Debug, Default)]
pub struct LayerCache {
    entries: Mutex<HashMap<String, Arc<FeatureCollection>>>,
}

impl LayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<FeatureCollection>>> {
        // Aucune section critique ne peut laisser la table incohérente
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<Arc<FeatureCollection>> {
        self.lock().get(name).cloned()
    }

    /// Insère et retourne l'entrée en cache ; la première insertion gagne
    pub fn insert(&self, name: &str, layer: FeatureCollection) -> Arc<FeatureCollection> {
        self.lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(layer))
            .clone()
    }

    /// Retire une couche, retourne vrai si elle était présente
    pub fn invalidate(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        }
    }

    #[test]
    fn test_insert_get_invalidate() {
        let cache = LayerCache::new();
        let a = cache.insert("aif", empty());
        let b = cache.get("aif").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        assert!(cache.invalidate("aif"));
        assert!(!cache.invalidate("aif"));
        assert!(cache.get("aif").is_none());
    }

    #[test]
    fn test_clear() {
        let cache = LayerCache::new();
        cache.insert("aif", empty());
        cache.insert("dpm", empty());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
