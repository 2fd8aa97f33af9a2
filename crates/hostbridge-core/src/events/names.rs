//! Raw host notification names and their public event types.

/// Raw host notifier name -> public event type.
const EVENT_NAMES: &[(&str, &str)] = &[
    ("Art Selection Changed Notifier", "selection_changed"),
    ("Art Properties Changed Notifier", "art_changed"),
    ("Document Opened Notifier", "document_opened"),
    ("Document New Notifier", "document_created"),
    ("Document Closed Notifier", "document_closed"),
    ("Document Activated Notifier", "document_switched"),
    ("Document Changed Notifier", "document_changed"),
    ("Document Saved Notifier", "document_saved"),
    ("Layer List Changed Notifier", "layers_changed"),
    ("Undo Notifier", "undo"),
    ("Redo Notifier", "redo"),
];

/// Translate a raw host notification name. Unknown names pass through unchanged.
pub fn public_event_name(raw: &str) -> &str {
    EVENT_NAMES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, public)| *public)
        .unwrap_or(raw)
}

/// Every public event type the bridge knows about.
pub fn known_event_types() -> impl Iterator<Item = &'static str> {
    EVENT_NAMES.iter().map(|(_, public)| *public)
}
