//! The host application seam.
//!
//! [`HostApi`] stands in for the host's API suites. Every method must be called
//! on the host's main thread, which is why implementations are not required to
//! be `Send` and only ever live inside a [`HostSession`].

mod session;
mod simulated;

pub use session::{run_host_loop, HostSession};
pub use simulated::SimulatedHost;

use hostbridge_core::registry::{ArtRef, DictionaryRef, DocumentRef, LayerRef};
use hostbridge_core::{DocumentLayout, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of an art object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtKind {
    Path,
    Text,
    Group,
    Placed,
}

impl ArtKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "path" => Some(ArtKind::Path),
            "text" => Some(ArtKind::Text),
            "group" => Some(ArtKind::Group),
            "placed" => Some(ArtKind::Placed),
            _ => None,
        }
    }
}

/// Axis-aligned bounds: left, top, right, bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub layer_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub art_count: usize,
}

/// Art object properties. `layer` is the owning layer, registered by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtInfo {
    pub name: String,
    pub kind: ArtKind,
    pub bounds: Bounds,
    pub selected: bool,
    pub layer: LayerRef,
}

/// A raw notification emitted by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostNotification {
    pub name: &'static str,
    pub payload: Value,
}

/// Host API suites used by the bridge's operations.
pub trait HostApi {
    // Documents
    fn documents(&self) -> Vec<DocumentRef>;
    fn active_document(&self) -> Option<DocumentRef>;
    fn document_info(&self, document: DocumentRef) -> Result<DocumentInfo>;
    fn document_layout(&self, document: DocumentRef) -> Result<DocumentLayout>;
    fn new_document(&mut self, name: &str, width: f64, height: f64) -> DocumentRef;
    fn activate_document(&mut self, document: DocumentRef) -> Result<()>;
    fn close_document(&mut self, document: DocumentRef) -> Result<()>;

    // Dictionaries
    fn document_dictionary(&self, document: DocumentRef) -> Result<DictionaryRef>;
    fn dictionary_get(&self, dictionary: DictionaryRef, key: &str) -> Result<Option<Value>>;
    fn dictionary_set(&mut self, dictionary: DictionaryRef, key: &str, value: Value)
        -> Result<()>;

    // Layers
    fn layers(&self, document: DocumentRef) -> Result<Vec<LayerRef>>;
    fn layer_info(&self, layer: LayerRef) -> Result<LayerInfo>;
    fn new_layer(&mut self, document: DocumentRef, name: &str) -> Result<LayerRef>;
    fn set_layer_visible(&mut self, layer: LayerRef, visible: bool) -> Result<()>;

    // Art
    fn layer_art(&self, layer: LayerRef) -> Result<Vec<ArtRef>>;
    fn selection(&self) -> Vec<ArtRef>;
    fn art_info(&self, art: ArtRef) -> Result<ArtInfo>;
    fn new_art(&mut self, layer: LayerRef, kind: ArtKind, name: &str, bounds: Bounds)
        -> Result<ArtRef>;
    fn delete_art(&mut self, art: ArtRef) -> Result<()>;
    fn set_art_selected(&mut self, art: ArtRef, selected: bool) -> Result<()>;

    // Edit history
    fn undo(&mut self) -> bool;
    fn redo(&mut self) -> bool;

    /// Take the notifications raised since the last call.
    fn take_notifications(&mut self) -> Vec<HostNotification>;
}
