//! In-memory host used by the binary and the tests.
//!
//! Models documents, layers and art objects with opaque addresses, a global
//! undo/redo history of document snapshots, and the raw notifications a real
//! host would raise.

use super::{
    ArtInfo, ArtKind, Bounds, DocumentInfo, HostApi, HostNotification, LayerInfo,
};
use hostbridge_core::registry::{ArtRef, DictionaryRef, DocumentRef, LayerRef};
use hostbridge_core::{BridgeError, DocumentLayout, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const MAX_UNDO_DEPTH: usize = 64;
const ADDR_STRIDE: usize = 0x10;

#[derive(Debug, Clone)]
struct SimArt {
    addr: usize,
    name: String,
    kind: ArtKind,
    bounds: Bounds,
    selected: bool,
}

#[derive(Debug, Clone)]
struct SimLayer {
    addr: usize,
    name: String,
    visible: bool,
    locked: bool,
    art: Vec<SimArt>,
}

#[derive(Debug, Clone)]
struct SimDocument {
    addr: usize,
    name: String,
    width: f64,
    height: f64,
    dictionary_addr: usize,
    dictionary: BTreeMap<String, Value>,
    layers: Vec<SimLayer>,
}

/// Simulated single-threaded host application.
#[derive(Debug)]
pub struct SimulatedHost {
    documents: Vec<SimDocument>,
    active: Option<usize>,
    undo_stack: Vec<Vec<SimDocument>>,
    redo_stack: Vec<Vec<SimDocument>>,
    next_addr: usize,
    notifications: Vec<HostNotification>,
}

impl SimulatedHost {
    /// A host with no open documents.
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            active: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            next_addr: 0x1000,
            notifications: Vec::new(),
        }
    }

    /// A host with one open document holding two layers and a few art objects.
    pub fn with_sample_document() -> Self {
        let mut host = Self::new();
        let document = host.new_document("Untitled-1", 612.0, 792.0);
        let background = host.document_mut(document).map(|d| d.layers[0].addr);
        if let Ok(layer) = background {
            let layer = LayerRef::from_addr(layer);
            let _ = host.new_art(
                layer,
                ArtKind::Path,
                "Frame",
                Bounds {
                    left: 0.0,
                    top: 792.0,
                    right: 612.0,
                    bottom: 0.0,
                },
            );
        }
        if let Ok(artwork) = host.new_layer(document, "Artwork") {
            let _ = host.new_art(
                artwork,
                ArtKind::Path,
                "Circle",
                Bounds {
                    left: 100.0,
                    top: 400.0,
                    right: 300.0,
                    bottom: 200.0,
                },
            );
            let _ = host.new_art(
                artwork,
                ArtKind::Text,
                "Title",
                Bounds {
                    left: 72.0,
                    top: 720.0,
                    right: 540.0,
                    bottom: 680.0,
                },
            );
        }
        host.undo_stack.clear();
        host.notifications.clear();
        host
    }

    fn alloc(&mut self) -> usize {
        let addr = self.next_addr;
        self.next_addr += ADDR_STRIDE;
        addr
    }

    fn notify(&mut self, name: &'static str, payload: Value) {
        self.notifications.push(HostNotification { name, payload });
    }

    fn checkpoint(&mut self) {
        self.undo_stack.push(self.documents.clone());
        if self.undo_stack.len() > MAX_UNDO_DEPTH {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn document_index(&self, document: DocumentRef) -> Result<usize> {
        self.documents
            .iter()
            .position(|d| d.addr == document.addr())
            .ok_or_else(|| BridgeError::host(format!("unknown document {:?}", document)))
    }

    fn document(&self, document: DocumentRef) -> Result<&SimDocument> {
        let index = self.document_index(document)?;
        Ok(&self.documents[index])
    }

    fn document_mut(&mut self, document: DocumentRef) -> Result<&mut SimDocument> {
        let index = self.document_index(document)?;
        Ok(&mut self.documents[index])
    }

    fn locate_layer(&self, layer: LayerRef) -> Result<(usize, usize)> {
        for (d, document) in self.documents.iter().enumerate() {
            if let Some(l) = document.layers.iter().position(|l| l.addr == layer.addr()) {
                return Ok((d, l));
            }
        }
        Err(BridgeError::host(format!("unknown layer {:?}", layer)))
    }

    fn locate_art(&self, art: ArtRef) -> Result<(usize, usize, usize)> {
        for (d, document) in self.documents.iter().enumerate() {
            for (l, layer) in document.layers.iter().enumerate() {
                if let Some(a) = layer.art.iter().position(|a| a.addr == art.addr()) {
                    return Ok((d, l, a));
                }
            }
        }
        Err(BridgeError::host(format!("unknown art object {:?}", art)))
    }

    fn dictionary_index(&self, dictionary: DictionaryRef) -> Result<usize> {
        self.documents
            .iter()
            .position(|d| d.dictionary_addr == dictionary.addr())
            .ok_or_else(|| BridgeError::host(format!("unknown dictionary {:?}", dictionary)))
    }

    fn selection_count(&self) -> usize {
        self.selection().len()
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostApi for SimulatedHost {
    fn documents(&self) -> Vec<DocumentRef> {
        self.documents
            .iter()
            .map(|d| DocumentRef::from_addr(d.addr))
            .collect()
    }

    fn active_document(&self) -> Option<DocumentRef> {
        self.active.map(DocumentRef::from_addr)
    }

    fn document_info(&self, document: DocumentRef) -> Result<DocumentInfo> {
        let doc = self.document(document)?;
        Ok(DocumentInfo {
            name: doc.name.clone(),
            width: doc.width,
            height: doc.height,
            layer_count: doc.layers.len(),
        })
    }

    fn document_layout(&self, document: DocumentRef) -> Result<DocumentLayout> {
        let doc = self.document(document)?;
        Ok(DocumentLayout {
            name: doc.name.clone(),
            width: doc.width,
            height: doc.height,
            units: "pt".to_string(),
            ruler_origin: [0.0, doc.height],
            layer_count: doc.layers.len(),
        })
    }

    fn new_document(&mut self, name: &str, width: f64, height: f64) -> DocumentRef {
        let addr = self.alloc();
        let dictionary_addr = self.alloc();
        let layer_addr = self.alloc();
        self.documents.push(SimDocument {
            addr,
            name: name.to_string(),
            width,
            height,
            dictionary_addr,
            dictionary: BTreeMap::new(),
            layers: vec![SimLayer {
                addr: layer_addr,
                name: "Layer 1".to_string(),
                visible: true,
                locked: false,
                art: Vec::new(),
            }],
        });
        self.active = Some(addr);
        self.clear_history();
        self.notify("Document New Notifier", json!({ "name": name }));
        DocumentRef::from_addr(addr)
    }

    fn activate_document(&mut self, document: DocumentRef) -> Result<()> {
        let index = self.document_index(document)?;
        if self.active == Some(document.addr()) {
            return Ok(());
        }
        self.active = Some(document.addr());
        let name = self.documents[index].name.clone();
        self.notify("Document Activated Notifier", json!({ "name": name }));
        Ok(())
    }

    fn close_document(&mut self, document: DocumentRef) -> Result<()> {
        let index = self.document_index(document)?;
        let closed = self.documents.remove(index);
        if self.active == Some(closed.addr) {
            self.active = self.documents.first().map(|d| d.addr);
        }
        self.clear_history();
        self.notify("Document Closed Notifier", json!({ "name": closed.name }));
        Ok(())
    }

    fn document_dictionary(&self, document: DocumentRef) -> Result<DictionaryRef> {
        let doc = self.document(document)?;
        Ok(DictionaryRef::from_addr(doc.dictionary_addr))
    }

    fn dictionary_get(&self, dictionary: DictionaryRef, key: &str) -> Result<Option<Value>> {
        let index = self.dictionary_index(dictionary)?;
        Ok(self.documents[index].dictionary.get(key).cloned())
    }

    fn dictionary_set(
        &mut self,
        dictionary: DictionaryRef,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let index = self.dictionary_index(dictionary)?;
        self.documents[index]
            .dictionary
            .insert(key.to_string(), value);
        self.notify(
            "Document Changed Notifier",
            json!({ "reason": "dictionary", "key": key }),
        );
        Ok(())
    }

    fn layers(&self, document: DocumentRef) -> Result<Vec<LayerRef>> {
        let doc = self.document(document)?;
        Ok(doc
            .layers
            .iter()
            .map(|l| LayerRef::from_addr(l.addr))
            .collect())
    }

    fn layer_info(&self, layer: LayerRef) -> Result<LayerInfo> {
        let (d, l) = self.locate_layer(layer)?;
        let layer = &self.documents[d].layers[l];
        Ok(LayerInfo {
            name: layer.name.clone(),
            visible: layer.visible,
            locked: layer.locked,
            art_count: layer.art.len(),
        })
    }

    fn new_layer(&mut self, document: DocumentRef, name: &str) -> Result<LayerRef> {
        let index = self.document_index(document)?;
        self.checkpoint();
        let addr = self.alloc();
        self.documents[index].layers.push(SimLayer {
            addr,
            name: name.to_string(),
            visible: true,
            locked: false,
            art: Vec::new(),
        });
        self.notify("Layer List Changed Notifier", json!({ "name": name }));
        Ok(LayerRef::from_addr(addr))
    }

    fn set_layer_visible(&mut self, layer: LayerRef, visible: bool) -> Result<()> {
        let (d, l) = self.locate_layer(layer)?;
        self.checkpoint();
        self.documents[d].layers[l].visible = visible;
        self.notify("Layer List Changed Notifier", json!({ "visible": visible }));
        Ok(())
    }

    fn layer_art(&self, layer: LayerRef) -> Result<Vec<ArtRef>> {
        let (d, l) = self.locate_layer(layer)?;
        Ok(self.documents[d].layers[l]
            .art
            .iter()
            .map(|a| ArtRef::from_addr(a.addr))
            .collect())
    }

    fn selection(&self) -> Vec<ArtRef> {
        let Some(active) = self.active else {
            return Vec::new();
        };
        self.documents
            .iter()
            .filter(|d| d.addr == active)
            .flat_map(|d| d.layers.iter())
            .flat_map(|l| l.art.iter())
            .filter(|a| a.selected)
            .map(|a| ArtRef::from_addr(a.addr))
            .collect()
    }

    fn art_info(&self, art: ArtRef) -> Result<ArtInfo> {
        let (d, l, a) = self.locate_art(art)?;
        let layer = &self.documents[d].layers[l];
        let object = &layer.art[a];
        Ok(ArtInfo {
            name: object.name.clone(),
            kind: object.kind,
            bounds: object.bounds,
            selected: object.selected,
            layer: LayerRef::from_addr(layer.addr),
        })
    }

    fn new_art(
        &mut self,
        layer: LayerRef,
        kind: ArtKind,
        name: &str,
        bounds: Bounds,
    ) -> Result<ArtRef> {
        let (d, l) = self.locate_layer(layer)?;
        if self.documents[d].layers[l].locked {
            return Err(BridgeError::host(format!("layer {:?} is locked", layer)));
        }
        self.checkpoint();
        let addr = self.alloc();
        self.documents[d].layers[l].art.push(SimArt {
            addr,
            name: name.to_string(),
            kind,
            bounds,
            selected: false,
        });
        self.notify(
            "Document Changed Notifier",
            json!({ "reason": "art_created", "name": name }),
        );
        Ok(ArtRef::from_addr(addr))
    }

    fn delete_art(&mut self, art: ArtRef) -> Result<()> {
        let (d, l, a) = self.locate_art(art)?;
        self.checkpoint();
        let removed = self.documents[d].layers[l].art.remove(a);
        self.notify(
            "Document Changed Notifier",
            json!({ "reason": "art_deleted", "name": removed.name }),
        );
        if removed.selected {
            let count = self.selection_count();
            self.notify("Art Selection Changed Notifier", json!({ "count": count }));
        }
        Ok(())
    }

    fn set_art_selected(&mut self, art: ArtRef, selected: bool) -> Result<()> {
        let (d, l, a) = self.locate_art(art)?;
        self.documents[d].layers[l].art[a].selected = selected;
        let count = self.selection_count();
        self.notify("Art Selection Changed Notifier", json!({ "count": count }));
        Ok(())
    }

    fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.documents, previous);
        self.redo_stack.push(current);
        self.notify("Undo Notifier", json!({}));
        true
    }

    fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.documents, next);
        self.undo_stack.push(current);
        self.notify("Redo Notifier", json!({}));
        true
    }

    fn take_notifications(&mut self) -> Vec<HostNotification> {
        std::mem::take(&mut self.notifications)
    }
}
