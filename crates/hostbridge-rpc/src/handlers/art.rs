//! Art object operations.

use super::{
    get_bool_param, get_str_param, require_handle_param, require_str_param, OperationTable,
};
use crate::host::{ArtKind, Bounds, HostSession};
use hostbridge_core::registry::ArtRef;
use hostbridge_core::{BridgeError, Result};
use serde_json::{json, Value};

pub(super) fn register(table: &mut OperationTable) {
    table.insert("art", "selection", selection);
    table.insert("art", "list", list);
    table.insert("art", "info", info);
    table.insert("art", "new", new_art);
    table.insert("art", "delete", delete);
    table.insert("art", "select", select);
}

fn register_all(session: &HostSession, art: Vec<ArtRef>) -> Vec<i64> {
    art.into_iter()
        .map(|a| session.registries().art.register(a))
        .collect()
}

fn selection(session: &mut HostSession, _params: &Value) -> Result<Value> {
    let selected = session.host().selection();
    Ok(json!({ "art": register_all(session, selected) }))
}

fn list(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layer_id", "layerId")?;
    let layer = session.registries().layers.resolve(id)?;
    let art = session.host().layer_art(layer)?;
    Ok(json!({ "art": register_all(session, art) }))
}

fn info(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "art_id", "artId")?;
    let art = session.registries().art.resolve(id)?;
    let info = session.host().art_info(art)?;
    let layer_id = session.registries().layers.register(info.layer);
    Ok(json!({
        "art_id": id,
        "name": info.name,
        "kind": info.kind,
        "bounds": info.bounds,
        "selected": info.selected,
        "layer_id": layer_id,
    }))
}

fn new_art(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layer_id", "layerId")?;
    let name = require_str_param(params, "name", "name")?;
    let kind = match get_str_param(params, "kind", "kind") {
        Some(kind) => ArtKind::from_str(kind)
            .ok_or_else(|| BridgeError::invalid_params(format!("Unknown art kind: {}", kind)))?,
        None => ArtKind::Path,
    };
    let bounds: Bounds = match params.get("bounds") {
        Some(bounds) => serde_json::from_value(bounds.clone())
            .map_err(|e| BridgeError::invalid_params(format!("Invalid bounds: {}", e)))?,
        None => Bounds {
            left: 0.0,
            top: 100.0,
            right: 100.0,
            bottom: 0.0,
        },
    };

    let layer = session.registries().layers.resolve(id)?;
    let art = session.host_mut().new_art(layer, kind, &name, bounds)?;
    session.pump_notifications();
    let id = session.registries().art.register(art);
    Ok(json!({ "art_id": id }))
}

fn delete(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "art_id", "artId")?;
    let art = session.registries().art.resolve(id)?;
    session.host_mut().delete_art(art)?;
    // The host may reuse the address; drop every id that still points at it.
    let invalidated = session.registries().art.invalidate(art);
    session.pump_notifications();
    Ok(json!({ "deleted": true, "invalidated": invalidated }))
}

fn select(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "art_id", "artId")?;
    let selected = get_bool_param(params, "selected", "selected").unwrap_or(true);
    let art = session.registries().art.resolve(id)?;
    session.host_mut().set_art_selected(art, selected)?;
    session.pump_notifications();
    Ok(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, sample_session};
    use hostbridge_core::BridgeError;
    use serde_json::json;

    fn artwork_layer(session: &mut crate::host::HostSession) -> i64 {
        let list = call(session, "layer.list", json!({})).unwrap();
        list["layers"][1]["layer_id"].as_i64().unwrap()
    }

    #[test]
    fn test_select_keeps_handles_alive() {
        let mut session = sample_session();
        let layer = artwork_layer(&mut session);
        let art = call(&mut session, "art.list", json!({"layer_id": layer})).unwrap()["art"][0]
            .as_i64()
            .unwrap();

        call(&mut session, "art.select", json!({"art_id": art})).unwrap();
        let selection = call(&mut session, "art.selection", json!({})).unwrap();
        assert_eq!(selection["art"].as_array().unwrap().len(), 1);

        let info = call(&mut session, "art.info", json!({"art_id": art})).unwrap();
        assert_eq!(info["name"], "Circle");
        assert_eq!(info["kind"], "path");
        assert_eq!(info["selected"], true);
    }

    #[test]
    fn test_delete_invalidates_every_alias() {
        let mut session = sample_session();
        let layer = artwork_layer(&mut session);
        let first = call(&mut session, "art.list", json!({"layer_id": layer})).unwrap()["art"][0]
            .as_i64()
            .unwrap();
        let alias = call(&mut session, "art.list", json!({"layer_id": layer})).unwrap()["art"][0]
            .as_i64()
            .unwrap();
        assert_ne!(first, alias);

        let result = call(&mut session, "art.delete", json!({"art_id": first})).unwrap();
        assert_eq!(result["invalidated"], 2);
        let err = call(&mut session, "art.info", json!({"art_id": alias})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { category: "art", .. }));
    }

    #[test]
    fn test_new_art_validates_kind() {
        let mut session = sample_session();
        let layer = artwork_layer(&mut session);
        let err = call(
            &mut session,
            "art.new",
            json!({"layer_id": layer, "name": "X", "kind": "blob"}),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParams { .. }));

        let created = call(
            &mut session,
            "art.new",
            json!({
                "layer_id": layer,
                "name": "Caption",
                "kind": "text",
                "bounds": {"left": 1.0, "top": 2.0, "right": 3.0, "bottom": 0.0}
            }),
        )
        .unwrap();
        let id = created["art_id"].as_i64().unwrap();
        let info = call(&mut session, "art.info", json!({"art_id": id})).unwrap();
        assert_eq!(info["bounds"]["right"], 3.0);
    }
}
