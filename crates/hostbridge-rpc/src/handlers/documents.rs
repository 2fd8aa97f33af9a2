//! Document, layout snapshot, dictionary and edit history operations.

use super::{
    get_f64_param, get_handle_param, get_str_param, require_handle_param, require_str_param,
    OperationTable,
};
use crate::host::HostSession;
use hostbridge_core::registry::DocumentRef;
use hostbridge_core::{BridgeError, Result};
use serde_json::{json, Value};

pub(super) fn register(table: &mut OperationTable) {
    table.insert("document", "list", list);
    table.insert("document", "active", active);
    table.insert("document", "info", info);
    table.insert("document", "new", new_document);
    table.insert("document", "activate", activate);
    table.insert("document", "close", close);
    table.insert("document", "layout", layout);

    table.insert("layout", "get", layout_get);
    table.insert("layout", "release", layout_release);

    table.insert("dictionary", "get", dictionary_get);
    table.insert("dictionary", "get_entry", dictionary_get_entry);
    table.insert("dictionary", "set_entry", dictionary_set_entry);

    table.insert("edit", "undo", undo);
    table.insert("edit", "redo", redo);
}

/// The document named by `document_id`, or the active document when absent.
pub(super) fn target_document(session: &HostSession, params: &Value) -> Result<DocumentRef> {
    match get_handle_param(params, "document_id", "documentId") {
        Some(id) => session.registries().documents.resolve(id),
        None => session
            .host()
            .active_document()
            .ok_or_else(|| BridgeError::host("No document is open")),
    }
}

fn list(session: &mut HostSession, _params: &Value) -> Result<Value> {
    let active = session.host().active_document();
    let mut documents = Vec::new();
    for document in session.host().documents() {
        let info = session.host().document_info(document)?;
        let id = session.registries().documents.register(document);
        documents.push(json!({
            "document_id": id,
            "name": info.name,
            "active": Some(document) == active,
        }));
    }
    Ok(json!({ "documents": documents }))
}

fn active(session: &mut HostSession, _params: &Value) -> Result<Value> {
    let id = match session.host().active_document() {
        Some(document) => session.registries().documents.register(document),
        None => hostbridge_core::NULL_HANDLE,
    };
    Ok(json!({ "document_id": id }))
}

fn info(session: &mut HostSession, params: &Value) -> Result<Value> {
    let document = target_document(session, params)?;
    let info = session.host().document_info(document)?;
    let id = session.registries().documents.register(document);
    Ok(json!({
        "document_id": id,
        "name": info.name,
        "width": info.width,
        "height": info.height,
        "layer_count": info.layer_count,
    }))
}

fn new_document(session: &mut HostSession, params: &Value) -> Result<Value> {
    let name = get_str_param(params, "name", "name").unwrap_or("Untitled");
    let width = get_f64_param(params, "width", "width").unwrap_or(612.0);
    let height = get_f64_param(params, "height", "height").unwrap_or(792.0);
    if width <= 0.0 || height <= 0.0 {
        return Err(BridgeError::invalid_params("width and height must be positive"));
    }

    let document = session.host_mut().new_document(name, width, height);
    // Creating a document invalidates every handle; register after the flush.
    session.pump_notifications();
    let id = session.registries().documents.register(document);
    Ok(json!({ "document_id": id }))
}

fn activate(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "document_id", "documentId")?;
    let document = session.registries().documents.resolve(id)?;
    session.host_mut().activate_document(document)?;
    session.pump_notifications();
    let id = session.registries().documents.register(document);
    Ok(json!({ "document_id": id }))
}

fn close(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "document_id", "documentId")?;
    let document = session.registries().documents.resolve(id)?;
    session.host_mut().close_document(document)?;
    session.pump_notifications();
    Ok(json!({ "closed": true }))
}

fn layout(session: &mut HostSession, params: &Value) -> Result<Value> {
    let document = target_document(session, params)?;
    let layout = session.host().document_layout(document)?;
    let snapshot = serde_json::to_value(&layout)?;
    let id = session.registries().layouts.register(layout);
    Ok(json!({ "layout_id": id, "layout": snapshot }))
}

fn layout_get(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layout_id", "layoutId")?;
    let layout = session.registries().layouts.resolve(id)?;
    Ok(serde_json::to_value(layout)?)
}

fn layout_release(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "layout_id", "layoutId")?;
    let released = session.registries().layouts.remove(id);
    Ok(json!({ "released": released }))
}

fn dictionary_get(session: &mut HostSession, params: &Value) -> Result<Value> {
    let document = target_document(session, params)?;
    let dictionary = session.host().document_dictionary(document)?;
    let id = session.registries().dictionaries.register(dictionary);
    Ok(json!({ "dictionary_id": id }))
}

fn dictionary_get_entry(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "dictionary_id", "dictionaryId")?;
    let key = require_str_param(params, "key", "key")?;
    let dictionary = session.registries().dictionaries.resolve(id)?;
    let value = session.host().dictionary_get(dictionary, &key)?;
    Ok(json!({ "key": key, "value": value }))
}

fn dictionary_set_entry(session: &mut HostSession, params: &Value) -> Result<Value> {
    let id = require_handle_param(params, "dictionary_id", "dictionaryId")?;
    let key = require_str_param(params, "key", "key")?;
    let value = params
        .get("value")
        .cloned()
        .ok_or_else(|| BridgeError::invalid_params("Missing required parameter: value"))?;
    let dictionary = session.registries().dictionaries.resolve(id)?;
    session.host_mut().dictionary_set(dictionary, &key, value)?;
    session.pump_notifications();
    Ok(json!({ "success": true }))
}

fn undo(session: &mut HostSession, _params: &Value) -> Result<Value> {
    let performed = session.host_mut().undo();
    session.pump_notifications();
    Ok(json!({ "performed": performed }))
}

fn redo(session: &mut HostSession, _params: &Value) -> Result<Value> {
    let performed = session.host_mut().redo();
    session.pump_notifications();
    Ok(json!({ "performed": performed }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, sample_session};
    use hostbridge_core::BridgeError;
    use serde_json::json;

    #[test]
    fn test_new_document_handle_survives_its_own_invalidation() {
        let mut session = sample_session();
        let result = call(&mut session, "document.new", json!({"name": "Poster"})).unwrap();
        let id = result["document_id"].as_i64().unwrap();

        let info = call(&mut session, "document.info", json!({"document_id": id})).unwrap();
        assert_eq!(info["name"], "Poster");
        assert_eq!(session.registries().invalidation_count(), 1);
    }

    #[test]
    fn test_activate_invalidates_previous_handles() {
        let mut session = sample_session();
        let first = call(&mut session, "document.active", json!({})).unwrap()["document_id"]
            .as_i64()
            .unwrap();
        call(&mut session, "document.new", json!({"name": "Second"})).unwrap();

        let err = call(&mut session, "document.activate", json!({"document_id": first}))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { .. }));

        let list = call(&mut session, "document.list", json!({})).unwrap();
        let documents = list["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 2);
        let untitled = documents
            .iter()
            .find(|d| d["name"] == "Untitled-1")
            .unwrap()["document_id"]
            .as_i64()
            .unwrap();
        let result = call(&mut session, "document.activate", json!({"documentId": untitled}))
            .unwrap();
        assert!(result["document_id"].as_i64().unwrap() > untitled);
    }

    #[test]
    fn test_layout_snapshot_lifecycle() {
        let mut session = sample_session();
        let result = call(&mut session, "document.layout", json!({})).unwrap();
        let id = result["layout_id"].as_i64().unwrap();
        assert_eq!(result["layout"]["units"], "pt");

        let layout = call(&mut session, "layout.get", json!({"layout_id": id})).unwrap();
        assert_eq!(layout["width"], 612.0);

        let released = call(&mut session, "layout.release", json!({"layout_id": id})).unwrap();
        assert_eq!(released["released"], true);
        assert!(call(&mut session, "layout.get", json!({"layout_id": id})).is_err());
    }

    #[test]
    fn test_dictionary_entries() {
        let mut session = sample_session();
        let id = call(&mut session, "dictionary.get", json!({})).unwrap()["dictionary_id"]
            .as_i64()
            .unwrap();
        call(
            &mut session,
            "dictionary.set_entry",
            json!({"dictionary_id": id, "key": "author", "value": "me"}),
        )
        .unwrap();
        let entry = call(
            &mut session,
            "dictionary.get_entry",
            json!({"dictionary_id": id, "key": "author"}),
        )
        .unwrap();
        assert_eq!(entry["value"], "me");

        let missing = call(&mut session, "dictionary.set_entry", json!({"dictionary_id": id}));
        assert!(matches!(missing, Err(BridgeError::InvalidParams { .. })));
    }

    #[test]
    fn test_undo_with_empty_history() {
        let mut session = sample_session();
        let result = call(&mut session, "edit.undo", json!({})).unwrap();
        assert_eq!(result["performed"], false);
        assert_eq!(session.registries().invalidation_count(), 0);
    }
}
