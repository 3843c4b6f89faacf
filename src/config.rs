use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_max_html_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_dom_nodes() -> usize {
    50_000
}

fn default_max_text_bytes() -> usize {
    1024 * 1024
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    20
}

fn default_cache_ttl_seconds() -> u64 {
    90
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration accepted by [`crate::pipeline::build_page_map`].
///
/// Mirrors the defaulted-field convention of the teacher's `AppConfig`:
/// every field has a documented default and deserializes cleanly from a
/// partial document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMapConfig {
    /// Hard cap on raw HTML input size before normalization begins.
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,

    /// Hard cap on the number of DOM elements the normalizer will walk.
    #[serde(default = "default_max_dom_nodes")]
    pub max_dom_nodes: usize,

    /// Hard cap on the serialized text payload of the assembled page map.
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,

    /// Hard cap on any embedded image payload surfaced in the page map.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Number of (url, fingerprint) entries the LRU cache retains.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Safety TTL after which a cache entry is treated as stale regardless
    /// of fingerprint agreement.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Locale used when no URL/host table entry or `<html lang>` attribute
    /// resolves one.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Overrides/extends the built-in host -> locale table (C1).
    #[serde(default)]
    pub locale_table: HashMap<String, String>,

    /// Enables the dominant-script disagreement filter in C5 stage 5.
    #[serde(default = "default_true")]
    pub language_filter_enabled: bool,

    /// Whether snapshots sourced from local/private network hosts are
    /// accepted. Enforcement is the driver's responsibility, not the
    /// core's (this crate does no network I/O); the flag is recorded
    /// verbatim on every `PageMap` built under it (`PageMap.allow_local_network`)
    /// so a consumer auditing a page map afterwards can see what policy was
    /// in effect, per spec §6.
    #[serde(default)]
    pub allow_local_network: bool,

    /// The core never fetches robots.txt itself; this flag is carried only
    /// so callers can record the policy that was in effect. Not currently
    /// surfaced on `PageMap` or `PageMapStats` — recorded here purely as
    /// caller-supplied config, unlike `allow_local_network`.
    #[serde(default)]
    pub ignore_robots: bool,
}

impl Default for PageMapConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: default_max_html_bytes(),
            max_dom_nodes: default_max_dom_nodes(),
            max_text_bytes: default_max_text_bytes(),
            max_image_bytes: default_max_image_bytes(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            default_locale: default_locale(),
            locale_table: HashMap::new(),
            language_filter_enabled: true,
            allow_local_network: false,
            ignore_robots: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PageMapConfig::default();
        assert_eq!(cfg.max_html_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.max_dom_nodes, 50_000);
        assert_eq!(cfg.cache_capacity, 20);
        assert_eq!(cfg.cache_ttl_seconds, 90);
        assert_eq!(cfg.default_locale, "en");
        assert!(cfg.language_filter_enabled);
        assert!(!cfg.allow_local_network);
    }

    #[test]
    fn deserializes_from_partial_document() {
        let json = r#"{"max_html_bytes": 1024}"#;
        let cfg: PageMapConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_html_bytes, 1024);
        assert_eq!(cfg.max_dom_nodes, 50_000);
    }
}
