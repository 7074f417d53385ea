//! URL and response helpers shared by the REST backends.

use crate::store::types::BackendError;
use serde_json::Value;

pub(crate) fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

/// Reject collection names that would change the meaning of a request path.
///
/// Names travel as a single path segment, so dot segments, control characters and the
/// backend's `reserved` characters are refused before any request is built.
pub(crate) fn check_collection_name(name: &str, reserved: &[char]) -> Result<(), BackendError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|ch| ch.is_control() || reserved.contains(&ch));
    if invalid {
        return Err(BackendError::Rejected(format!(
            "invalid collection name `{name}`"
        )));
    }
    Ok(())
}

pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

pub(crate) async fn unexpected_status(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    BackendError::UnexpectedStatus { status, body }
}

pub(crate) fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
