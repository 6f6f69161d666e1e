//! Extension negotiation helpers for the `X-A2A-Extensions` header.

use std::collections::HashSet;

use crate::types::{AgentCard, AgentExtension};

pub use crate::utils::constants::HTTP_EXTENSION_HEADER;

/// Parses the set of requested extension URIs from header values.
///
/// Tolerant of repeated header values, comma-separated entries, and
/// surrounding whitespace; empty entries are dropped.
///
/// # Example
///
/// ```
/// use a2a_sdk::utils::get_requested_extensions;
///
/// let exts = get_requested_extensions(&["foo, bar".to_string(), "baz".to_string()]);
/// assert_eq!(exts.len(), 3);
/// ```
pub fn get_requested_extensions(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Formats a set of activated extension URIs for a response header: sorted,
/// comma-joined.
pub fn format_activated_extensions(extensions: &HashSet<String>) -> String {
    let mut sorted: Vec<&str> = extensions.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(",")
}

/// Finds an extension on an agent card by URI.
pub fn find_extension_by_uri<'a>(card: &'a AgentCard, uri: &str) -> Option<&'a AgentExtension> {
    card.capabilities
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.uri == uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handles_commas_whitespace_and_repeats() {
        let values = vec![
            " https://ext.example/a ,https://ext.example/b".to_string(),
            "https://ext.example/b".to_string(),
            " ,, ".to_string(),
        ];
        let parsed = get_requested_extensions(&values);
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("https://ext.example/a"));
        assert!(parsed.contains("https://ext.example/b"));
    }

    #[test]
    fn format_sorts_uris() {
        let mut set = HashSet::new();
        set.insert("b".to_string());
        set.insert("a".to_string());
        set.insert("c".to_string());
        assert_eq!(format_activated_extensions(&set), "a,b,c");
    }

    #[test]
    fn format_empty_set() {
        assert_eq!(format_activated_extensions(&HashSet::new()), "");
    }
}
