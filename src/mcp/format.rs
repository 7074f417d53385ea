//! Text rendering of memories returned by the find tool.

use crate::store::Entry;

/// Render an entry as the tagged text block handed back to the model.
pub fn format_entry(entry: &Entry) -> String {
    let metadata = entry
        .metadata
        .as_ref()
        .filter(|metadata| !metadata.is_empty())
        .and_then(|metadata| serde_json::to_string(metadata).ok())
        .unwrap_or_default();
    format!(
        "<entry><content>{}</content><metadata>{}</metadata></entry>",
        entry.content.trim(),
        metadata
    )
}

pub(crate) fn results_header(query: &str) -> String {
    format!("Results for the query: '{query}'")
}

pub(crate) fn no_results_message(query: &str) -> String {
    format!("No information found for the query: '{query}'")
}

pub(crate) fn stored_message(information: &str, collection: &str) -> String {
    format!("Stored: {information} in collection {collection}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Metadata;
    use serde_json::json;

    #[test]
    fn format_entry_renders_compact_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("tag".into(), json!("pets"));
        let entry = Entry::new("  cats are great \n").with_metadata(metadata);

        assert_eq!(
            format_entry(&entry),
            "<entry><content>cats are great</content><metadata>{\"tag\":\"pets\"}</metadata></entry>"
        );
    }

    #[test]
    fn format_entry_leaves_metadata_empty_when_absent() {
        assert_eq!(
            format_entry(&Entry::new("plain")),
            "<entry><content>plain</content><metadata></metadata></entry>"
        );
        assert_eq!(
            format_entry(&Entry::new("plain").with_metadata(Metadata::new())),
            "<entry><content>plain</content><metadata></metadata></entry>"
        );
    }

    #[test]
    fn messages_quote_the_query() {
        assert_eq!(results_header("cats"), "Results for the query: 'cats'");
        assert_eq!(
            no_results_message("dogs"),
            "No information found for the query: 'dogs'"
        );
        assert_eq!(
            stored_message("note", "memories"),
            "Stored: note in collection memories"
        );
    }
}
