//! Naive English singularization for resource names.
//!
//! Covers the regular forms the Foreman API uses (payload wrap keys,
//! `_ids` attribute names); this is not a general-purpose inflector.

/// Singular form of a resource word: `domains` becomes `domain`,
/// `smart_proxies` becomes `smart_proxy`. Singular words pass through.
#[must_use]
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    word.strip_suffix('s').map_or_else(|| word.to_string(), str::to_string)
}
