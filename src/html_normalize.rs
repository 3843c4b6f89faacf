//! C2 — HTML Normalizer.
//!
//! Parses with `scraper` (html5ever-based, forgiving), enforces the size
//! and node-count guards, and removes effectively-invisible subtrees before
//! the rest of the pipeline ever sees them. Grounded on the link-density /
//! boilerplate-removal idiom of the corpus's extraction repos (`justext-rs`,
//! `riptidecrawler`) since the teacher itself parses nothing — it drives a
//! live rendered browser instead.

use crate::config::PageMapConfig;
use crate::error::{PageMapError, ResourceKind, Result};
use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;

static DISPLAY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)display\s*:\s*none").expect("static pattern"));
static VISIBILITY_HIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)visibility\s*:\s*hidden").expect("static pattern"));
// `(?!\.)` refuses to match when the zero is followed by a decimal point, so
// `opacity:0.5` never trips this rule.
static OPACITY_ZERO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)opacity\s*:\s*0(?!\.)\s*(?:;|$)").expect("static pattern"));
// Same guard for font-size: `font-size:0` / `font-size:0px` match, but
// `font-size:0.5rem` / `font-size:0.875em` do not, because the `0` there is
// immediately followed by `.`.
static FONT_SIZE_ZERO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)font-size\s*:\s*0(?!\.)[a-z%]*\s*(?:;|$)").expect("static pattern")
});
static OFFSCREEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)position\s*:\s*(?:absolute|fixed)[^;]*;\s*(?:left|top)\s*:\s*-\d{4,}px")
        .expect("static pattern")
});
// Matches one `.class-name { ...declarations... }` rule inside a `<style>`
// block, capturing the selector's class name(s) and the declaration body so
// the body can be re-checked against the same hidden-style predicate used
// for inline `style=""` attributes.
static STYLE_BLOCK_CLASS_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\.([a-zA-Z0-9_-]+)\s*\{([^}]*)\}").expect("static pattern")
});

/// True if an inline `style` attribute value renders its element invisible
/// under the rules in spec §4.2. Exposed standalone so `prune`'s stage 1
/// attribute pass and this module's own guard share one source of truth.
pub fn is_hidden_style(style: &str) -> bool {
    DISPLAY_NONE.is_match(style)
        || VISIBILITY_HIDDEN.is_match(style)
        || OPACITY_ZERO.is_match(style)
        || FONT_SIZE_ZERO.is_match(style)
        || OFFSCREEN.is_match(style)
}

/// Second hidden-content detection layer (spec §4.2): scans every `<style>`
/// block for class-selector rules whose declaration body matches the same
/// hidden-style predicate as an inline `style=""` attribute, and returns the
/// set of class names those rules hide. Combinator/descendant selectors and
/// non-class selectors are not matched — only bare `.class-name { ... }`
/// rules, which cover the common SEO-spam pattern this guard targets.
fn hidden_classes_from_style_blocks(doc: &Html) -> HashSet<String> {
    let mut hidden = HashSet::new();
    let Ok(selector) = Selector::parse("style") else {
        return hidden;
    };
    for style_el in doc.select(&selector) {
        let css = style_el.text().collect::<String>();
        for caps in STYLE_BLOCK_CLASS_RULE.captures_iter(&css) {
            let class_name = &caps[1];
            let body = &caps[2];
            if is_hidden_style(body) {
                hidden.insert(class_name.to_string());
            }
        }
    }
    hidden
}

pub struct NormalizedDocument {
    pub html: Html,
    pub html_lang: Option<String>,
    pub removed_hidden_nodes: usize,
}

/// Parses `raw_html`, enforces the size/node-count guards, and strips
/// hidden subtrees. Entity decoding of emitted text happens downstream via
/// [`crate::sanitize::sanitize_text`] on every string this crate extracts,
/// not here.
pub fn parse(raw_html: &str, config: &PageMapConfig) -> Result<NormalizedDocument> {
    let byte_len = raw_html.len();
    if byte_len > config.max_html_bytes {
        return Err(PageMapError::InputTooLarge {
            actual: byte_len,
            limit: config.max_html_bytes,
        });
    }

    let mut html = Html::parse_document(raw_html);

    let node_count = html
        .tree
        .nodes()
        .filter(|node| node.value().is_element())
        .count();
    if node_count > config.max_dom_nodes {
        return Err(PageMapError::ResourceExhausted {
            reason: ResourceKind::DomNodes,
            actual: node_count,
            limit: config.max_dom_nodes,
        });
    }

    let html_lang = extract_html_lang(&html);
    let removed_hidden_nodes = strip_hidden_nodes(&mut html);

    Ok(NormalizedDocument {
        html,
        html_lang,
        removed_hidden_nodes,
    })
}

fn extract_html_lang(doc: &Html) -> Option<String> {
    let selector = Selector::parse("html[lang]").ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.to_string())
}

fn strip_hidden_nodes(doc: &mut Html) -> usize {
    let hidden_classes = hidden_classes_from_style_blocks(doc);

    let hidden_ids: Vec<NodeId> = doc
        .tree
        .nodes()
        .filter_map(|node| {
            let element = node.value().as_element()?;
            if let Some(style) = element.attr("style") {
                if is_hidden_style(style) {
                    return Some(node.id());
                }
            }
            let class = element.attr("class")?;
            class
                .split_whitespace()
                .any(|c| hidden_classes.contains(c))
                .then_some(node.id())
        })
        .collect();

    let mut removed = 0;
    for id in hidden_ids {
        if let Some(mut node_mut) = doc.tree.get_mut(id) {
            node_mut.detach();
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_input() {
        let config = PageMapConfig {
            max_html_bytes: 10,
            ..Default::default()
        };
        let err = parse("<html><body>way too long</body></html>", &config).unwrap_err();
        assert!(matches!(err, PageMapError::InputTooLarge { .. }));
    }

    #[test]
    fn font_size_zero_is_hidden_but_fractional_rem_is_not() {
        assert!(is_hidden_style("font-size:0"));
        assert!(is_hidden_style("font-size:0px;"));
        assert!(!is_hidden_style("font-size:0.5rem"));
        assert!(!is_hidden_style("font-size:0.875em"));
    }

    #[test]
    fn opacity_zero_is_hidden_but_fractional_is_not() {
        assert!(is_hidden_style("opacity:0"));
        assert!(!is_hidden_style("opacity:0.5"));
    }

    #[test]
    fn display_none_and_visibility_hidden_detected() {
        assert!(is_hidden_style("display:none"));
        assert!(is_hidden_style("visibility:hidden"));
    }

    #[test]
    fn strips_hidden_subtree_from_parse() {
        let config = PageMapConfig::default();
        let doc = parse(
            r#"<html><body><div style="font-size:0">BUY CHEAP PILLS</div><div style="font-size:0.5rem">Fine print</div></body></html>"#,
            &config,
        )
        .unwrap();
        let text: String = doc.html.root_element().text().collect();
        assert!(!text.contains("BUY CHEAP PILLS"));
        assert!(text.contains("Fine print"));
    }

    #[test]
    fn style_block_class_rule_hides_matching_elements() {
        let config = PageMapConfig::default();
        let doc = parse(
            r#"<html><head><style>.seo-spam { font-size: 0; }</style></head>
            <body><div class="seo-spam">BUY CHEAP PILLS</div><div class="legit">Real content here</div></body></html>"#,
            &config,
        )
        .unwrap();
        let text: String = doc.html.root_element().text().collect();
        assert!(!text.contains("BUY CHEAP PILLS"));
        assert!(text.contains("Real content here"));
    }

    #[test]
    fn extracts_html_lang() {
        let config = PageMapConfig::default();
        let doc = parse(r#"<html lang="ko-KR"><body></body></html>"#, &config).unwrap();
        assert_eq!(doc.html_lang.as_deref(), Some("ko-KR"));
    }
}
