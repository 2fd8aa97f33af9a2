//! The process-wide set of typed registries.

use super::handle::{ArtRef, DictionaryRef, DocumentRef, LayerRef};
use super::owning::OwningRegistry;
use super::slots::Registry;
use super::GenerationalRegistry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Snapshot of a document's layout properties, built and owned by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub units: String,
    pub ruler_origin: [f64; 2],
    pub layer_count: usize,
}

/// Size and generation of one registry, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySize {
    pub name: &'static str,
    pub size: usize,
    pub generation: u32,
}

/// One registry per host object category.
///
/// Registries lock independently; nothing ever holds two of their locks at
/// once. The only aggregate operation is [`invalidate_all`](Self::invalidate_all).
pub struct RegistryGroup {
    pub art: Registry<ArtRef>,
    pub layers: Registry<LayerRef>,
    pub documents: Registry<DocumentRef>,
    pub dictionaries: Registry<DictionaryRef>,
    pub layouts: OwningRegistry<DocumentLayout>,
    invalidations: AtomicU64,
}

impl RegistryGroup {
    pub fn new() -> Self {
        Self {
            art: Registry::new("art"),
            layers: Registry::new("layer"),
            documents: Registry::new("document"),
            dictionaries: Registry::new("dictionary"),
            layouts: OwningRegistry::new("layout"),
            invalidations: AtomicU64::new(0),
        }
    }

    fn members(&self) -> [&dyn GenerationalRegistry; 5] {
        [
            &self.art,
            &self.layers,
            &self.documents,
            &self.dictionaries,
            &self.layouts,
        ]
    }

    /// Bump the generation of every member registry.
    ///
    /// Called on document switch, undo, redo, and document open/create/close.
    /// Returns the total number of invalidations performed so far.
    pub fn invalidate_all(&self) -> u64 {
        let mut cleared = 0;
        for registry in self.members() {
            cleared += registry.size();
            registry.bump_generation();
        }
        let count = self.invalidations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Invalidated all handles ({} live slot(s) dropped, invalidation #{})",
            cleared, count
        );
        count
    }

    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn sizes(&self) -> Vec<RegistrySize> {
        self.members()
            .into_iter()
            .map(|registry| RegistrySize {
                name: registry.name(),
                size: registry.size(),
                generation: registry.generation(),
            })
            .collect()
    }
}

impl Default for RegistryGroup {
    fn default() -> Self {
        Self::new()
    }
}
