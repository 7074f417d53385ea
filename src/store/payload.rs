//! Conversion between [`Entry`] values and backend payloads.

use crate::store::types::{Entry, Metadata};
use serde_json::{Map, Value};

pub(crate) const DOCUMENT_KEY: &str = "document";
pub(crate) const METADATA_KEY: &str = "metadata";
/// Older payloads stored the content under `text`.
const LEGACY_TEXT_KEY: &str = "text";

/// Build the payload stored alongside each embedded entry.
pub(crate) fn build_payload(entry: &Entry) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(DOCUMENT_KEY.into(), Value::String(entry.content.clone()));
    payload.insert(
        METADATA_KEY.into(),
        entry
            .metadata
            .clone()
            .map(Value::Object)
            .unwrap_or(Value::Null),
    );
    payload
}

/// Map a stored payload back to an [`Entry`].
///
/// Returns `None` when the payload carries no textual content.
pub fn entry_from_payload(mut payload: Map<String, Value>) -> Option<Entry> {
    let content = match payload.remove(DOCUMENT_KEY) {
        Some(Value::String(text)) => text,
        _ => match payload.remove(LEGACY_TEXT_KEY) {
            Some(Value::String(text)) => text,
            _ => return None,
        },
    };

    let metadata: Option<Metadata> = match payload.remove(METADATA_KEY) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };

    Some(Entry { content, metadata })
}
