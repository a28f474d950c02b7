pub mod lead;
pub mod rep;
pub mod routing_log;
pub mod rule;

/// Canonical form for every value that takes part in rule matching.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Normalizes an optional attribute; blank values collapse to `None`.
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_key).filter(|value| !value.is_empty())
}
