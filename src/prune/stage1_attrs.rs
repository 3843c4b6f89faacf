//! Stage 1 — Attribute strip & preprocessing.
//!
//! `style` and most `class`/`data-*` attributes carry no semantic value
//! downstream and are dropped when chunks are built in stage 4; this module
//! is the single allowlist both stage 4 (attribute carry-forward) and
//! stage 3 (price/rating class sniffing) consult, so the two stages never
//! disagree about what "semantic" means.

/// Attribute names carried forward onto an [`super::HtmlChunk`], because a
/// downstream compressor (C7) needs them — e.g. the product compressor's
/// price-recovery cascade scans `class` for `.*price.*` and reads
/// `data-price`/`data-value` directly.
pub fn allowed_attribute_names() -> Vec<&'static str> {
    vec!["itemprop", "class", "aria-label", "data-price", "data-value", "role"]
}

/// `class` is carried forward only when it plausibly carries price/rating/
/// `itemprop`-like semantics; pure presentational classes (`flex`,
/// `mt-4`, ...) are noise stage 4 should not bother keeping.
pub fn class_is_semantic(class: &str) -> bool {
    let lower = class.to_lowercase();
    ["price", "rating", "review", "stars", "amount", "currency", "sale", "discount"]
        .iter()
        .any(|kw| lower.contains(kw))
}

/// Reduces a `srcset` attribute value to its largest-width candidate URL.
pub fn largest_srcset_candidate(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let candidate = candidate.trim();
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let descriptor = parts.next().unwrap_or("1x");
            let width: u32 = descriptor
                .trim_end_matches(['w', 'x'])
                .parse()
                .unwrap_or(0);
            Some((width, url.to_string()))
        })
        .max_by_key(|(width, _)| *width)
        .map(|(_, url)| url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_class_detection() {
        assert!(class_is_semantic("product-price-large"));
        assert!(!class_is_semantic("flex items-center mt-4"));
    }

    #[test]
    fn picks_largest_srcset_candidate() {
        let srcset = "a.jpg 320w, b.jpg 640w, c.jpg 1024w";
        assert_eq!(largest_srcset_candidate(srcset).as_deref(), Some("c.jpg"));
    }
}
