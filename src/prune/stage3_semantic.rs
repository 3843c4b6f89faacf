//! Stage 3 — Semantic filtering.
//!
//! Removes `<nav>`/`<footer>`/`<aside>` subtrees unless they contain an
//! interactable already referenced by C4 (the AOM rule), applies a
//! link-density penalty with a Readability-style `<p>` exemption, and
//! exempts "grid" containers (lists/tables/similar-sibling sections)
//! entirely. This stage is the direct analogue of `justext-rs`'s whole
//! purpose, generalized with the AOM/grid exemptions the spec adds.

use crate::interactive::approximate_xpath;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

const LINK_DENSITY_THRESHOLD: f64 = 0.8;
const READABILITY_NON_LINK_CHAR_FLOOR: usize = 80;
const GRID_MIN_SIMILAR_CHILDREN: usize = 3;

/// Runs stage 3 top-down from the document root. Returns the set of
/// excluded element ids and a count of subtrees rescued by an exemption
/// (AOM or Readability), which the caller subtracts from its
/// `removed_nodes` telemetry counter per spec §4.5.
pub fn filter(doc: &Html, referenced_xpath_prefixes: &HashSet<String>) -> (HashSet<NodeId>, usize) {
    let mut excluded = HashSet::new();
    let mut rescued = 0usize;
    visit(doc.root_element(), false, referenced_xpath_prefixes, &mut excluded, &mut rescued);
    (excluded, rescued)
}

fn visit(
    el: ElementRef,
    in_article_or_main: bool,
    referenced: &HashSet<String>,
    excluded: &mut HashSet<NodeId>,
    rescued: &mut usize,
) -> bool {
    let tag = el.value().name();

    if super::stage2_script_islands::is_non_content_tag(tag) {
        mark_subtree_excluded(el, excluded);
        return true;
    }

    if matches!(tag, "nav" | "footer" | "aside") {
        if subtree_contains_referenced_interactable(el, referenced) {
            *rescued += 1;
        } else {
            mark_subtree_excluded(el, excluded);
            return true;
        }
    } else if is_grid_whitelisted(el) {
        // Exempt entirely from the link-density penalty; still recurse so
        // nested non-grid content gets evaluated on its own merits.
    } else {
        let (total_text, link_text) = text_and_link_char_counts(el);
        if total_text > 0 {
            let density = link_text as f64 / total_text as f64;
            if density > LINK_DENSITY_THRESHOLD {
                let non_link_chars = total_text.saturating_sub(link_text);
                let exempt = tag == "p"
                    && in_article_or_main
                    && non_link_chars > READABILITY_NON_LINK_CHAR_FLOOR;
                if exempt {
                    *rescued += 1;
                } else {
                    mark_subtree_excluded(el, excluded);
                    return true;
                }
            }
        }
    }

    let child_context = in_article_or_main || matches!(tag, "article" | "main");
    for child in el.children().filter_map(ElementRef::wrap) {
        visit(child, child_context, referenced, excluded, rescued);
    }
    false
}

fn mark_subtree_excluded(el: ElementRef, excluded: &mut HashSet<NodeId>) {
    excluded.insert(el.id());
    for descendant in el.descendants().filter_map(ElementRef::wrap) {
        excluded.insert(descendant.id());
    }
}

fn subtree_contains_referenced_interactable(el: ElementRef, referenced: &HashSet<String>) -> bool {
    let prefix = approximate_xpath(&el);
    referenced.iter().any(|r| r.starts_with(&prefix) || prefix.starts_with(r.as_str()))
}

fn text_and_link_char_counts(el: ElementRef) -> (usize, usize) {
    let total_text: usize = el.text().map(|t| t.chars().count()).sum();
    let Ok(link_selector) = Selector::parse("a") else {
        return (total_text, 0);
    };
    let link_text: usize = el
        .select(&link_selector)
        .flat_map(|a| a.text())
        .map(|t| t.chars().count())
        .sum();
    (total_text, link_text)
}

fn is_grid_whitelisted(el: ElementRef) -> bool {
    let tag = el.value().name();
    if matches!(tag, "ul" | "ol" | "table" | "tbody" | "tr" | "td" | "th") {
        return true;
    }
    if tag == "section" {
        let children: Vec<&str> = el.children().filter_map(ElementRef::wrap).map(|c| c.value().name()).collect();
        if children.len() >= GRID_MIN_SIMILAR_CHILDREN {
            let first = children[0];
            if children.iter().all(|t| *t == first) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_nav_without_referenced_interactable() {
        let doc = Html::parse_document("<html><body><nav><a href=\"/x\">Home</a></nav><p>Main content here that is quite long indeed.</p></body></html>");
        let (excluded, _) = filter(&doc, &HashSet::new());
        assert!(!excluded.is_empty());
    }

    #[test]
    fn grid_table_survives_high_link_density() {
        let rows = (0..10)
            .map(|i| format!("<tr><td><a href=\"/p/{i}\">Product {i} with a fairly long descriptive link text</a></td></tr>"))
            .collect::<String>();
        let html = format!("<html><body><table><tbody>{rows}</tbody></table></body></html>");
        let doc = Html::parse_document(&html);
        let (excluded, _) = filter(&doc, &HashSet::new());
        let tbody_selector = Selector::parse("tbody").unwrap();
        let tbody_id = doc.select(&tbody_selector).next().unwrap().id();
        assert!(!excluded.contains(&tbody_id));
    }

    #[test]
    fn paragraph_with_long_non_link_text_in_article_is_rescued() {
        let html = r#"<html><body><article><p>This sentence has a citation <a href="#a">[1]</a> but the rest of it is long enough prose to survive the footnote link density penalty comfortably.</p></article></body></html>"#;
        let doc = Html::parse_document(html);
        let (excluded, rescued) = filter(&doc, &HashSet::new());
        let p_selector = Selector::parse("p").unwrap();
        let p_id = doc.select(&p_selector).next().unwrap().id();
        assert!(!excluded.contains(&p_id));
        assert!(rescued >= 1);
    }
}
