//! JSON schema builders for MCP tools.

use serde_json::{Map, Value};

/// Build the schema describing the store tool input.
pub(crate) fn store_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "information".into(),
        string_schema("Text of the memory to store"),
    );

    let mut metadata_schema = Map::new();
    metadata_schema.insert("type".into(), Value::String("object".into()));
    metadata_schema.insert(
        "description".into(),
        Value::String("Optional JSON metadata stored with the memory and returned on find".into()),
    );
    properties.insert("metadata".into(), Value::Object(metadata_schema));
    properties.insert(
        "collection_name".into(),
        string_schema("Collection to store into; defaults to the configured collection"),
    );

    finalize_object_schema(properties, &["information"])
}

/// Build the schema describing the find tool input.
pub(crate) fn find_input_schema(default_limit: usize) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("query".into(), string_schema("What to search for"));
    properties.insert(
        "collection_name".into(),
        string_schema("Collection to search; defaults to the configured collection"),
    );

    let mut limit_schema = Map::new();
    limit_schema.insert("type".into(), Value::String("integer".into()));
    limit_schema.insert(
        "description".into(),
        Value::String("Maximum number of memories to return".into()),
    );
    limit_schema.insert("minimum".into(), Value::from(1));
    limit_schema.insert("default".into(), Value::from(default_limit));
    properties.insert("limit".into(), Value::Object(limit_schema));

    finalize_object_schema(properties, &["query"])
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
