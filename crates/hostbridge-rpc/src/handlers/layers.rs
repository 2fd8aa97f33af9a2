//! Layer operations.

use super::documents::target_document;
use super::{require_bool_param, require_handle_param, require_str_param, OperationTable};
use crate::host::HostSession;
use hostbridge_core::Result;
use serde_json::{json, Value};

pub(super) fn register(table: &mut OperationTable) {
    table.insert("layer", "list", list);
    table.insert("layer", "info", info);
    table.insert("layer", "new", new_layer);
    table.insert("layer", "set_visible", set_visible);
}

fn list(session: &mut HostSession, params: &Value) -> Result<Value> {
    let document = target_document(session, params)?;
    let mut layers = Vec::new();
    for layer in session.host().layers(document)? {
        let info = session.host().layer_info(layer)?;
        let id = session.registries().layers.register(layer);
        layers.push(json!({
            "layer_id": id,
            "name": info.name,
            "visible": info.visible,
            "locked": info.locked,
            "art_count": info.art_count,
        }));
    }
    Ok(json!({ "layers": layers }))
}

fn info(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layer_id", "layerId")?;
    let layer = session.registries().layers.resolve(id)?;
    let info = session.host().layer_info(layer)?;
    Ok(json!({
        "layer_id": id,
        "name": info.name,
        "visible": info.visible,
        "locked": info.locked,
        "art_count": info.art_count,
    }))
}

fn new_layer(session: &mut HostSession, params: &Value) -> Result<Value> {
    let name = require_str_param(params, "name", "name")?;
    let document = target_document(session, params)?;
    let layer = session.host_mut().new_layer(document, &name)?;
    session.pump_notifications();
    let id = session.registries().layers.register(layer);
    Ok(json!({ "layer_id": id }))
}

fn set_visible(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layer_id", "layerId")?;
    let visible = require_bool_param(params, "visible", "visible")?;
    let layer = session.registries().layers.resolve(id)?;
    session.host_mut().set_layer_visible(layer, visible)?;
    session.pump_notifications();
    Ok(json!({ "success": true }))
}
