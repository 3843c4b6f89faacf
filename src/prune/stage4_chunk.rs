//! Stage 4 — Schema-aware chunking.
//!
//! Flattens the surviving tree into a sequence of [`HtmlChunk`]s whose
//! `type` reflects semantic role, then lets the page type (from C6) adjust
//! per-type weights before stage 5 selects under budget.

use crate::interactive::approximate_xpath;
use crate::prune::stage1_attrs::{allowed_attribute_names, class_is_semantic};
use crate::sanitize::sanitize_text;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Heading,
    Paragraph,
    List,
    Table,
    Form,
    Media,
    Card,
    Code,
}

#[derive(Debug, Clone)]
pub struct HtmlChunk {
    pub chunk_type: ChunkType,
    pub text: String,
    pub weight: f64,
    pub attrs: HashMap<String, String>,
    pub xpath_prefix: String,
}

fn base_weight(chunk_type: ChunkType) -> f64 {
    match chunk_type {
        ChunkType::Heading => 10.0,
        ChunkType::Card => 8.0,
        ChunkType::Table => 7.0,
        ChunkType::List => 6.0,
        ChunkType::Paragraph => 5.0,
        ChunkType::Form => 4.0,
        ChunkType::Media => 3.0,
        ChunkType::Code => 2.0,
    }
}

fn chunk_type_for_tag(el: &ElementRef) -> Option<ChunkType> {
    match el.value().name() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some(ChunkType::Heading),
        "p" => Some(ChunkType::Paragraph),
        "ul" | "ol" => Some(ChunkType::List),
        "table" => Some(ChunkType::Table),
        "form" => Some(ChunkType::Form),
        "img" | "picture" | "figure" => Some(ChunkType::Media),
        "pre" | "code" => Some(ChunkType::Code),
        "div" | "section" | "article" => {
            let class = el.value().attr("class").unwrap_or("");
            (class_is_semantic(class) || class.to_lowercase().contains("card"))
                .then_some(ChunkType::Card)
        }
        _ => None,
    }
}

fn extract_attrs(el: &ElementRef) -> HashMap<String, String> {
    let allowed = allowed_attribute_names();
    let mut attrs = HashMap::new();
    for name in allowed {
        if let Some(value) = el.value().attr(name) {
            if name == "class" && !class_is_semantic(value) {
                continue;
            }
            attrs.insert(name.to_string(), value.to_string());
        }
    }
    attrs
}

/// Is `id` a descendant of (or equal to) any id already excluded? Walking
/// ancestors is cheaper than pre-computing a transitive closure since
/// stage 3 already materialized every excluded descendant explicitly.
fn is_excluded(el: &ElementRef, excluded: &HashSet<NodeId>) -> bool {
    excluded.contains(&el.id())
}

pub fn chunk(doc: &Html, excluded: &HashSet<NodeId>, _allowed_attrs: &[&str]) -> Vec<HtmlChunk> {
    let Ok(selector) = Selector::parse(
        "h1, h2, h3, h4, h5, h6, p, ul, ol, table, form, img, pre, code, div, section, article",
    ) else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    let mut emitted_ids: HashSet<NodeId> = HashSet::new();

    for el in doc.select(&selector) {
        if is_excluded(&el, excluded) {
            continue;
        }
        // Skip if an ancestor already produced a chunk covering this text
        // (e.g. a `div.card` containing a `<p>`): only the outermost
        // matching ancestor becomes a chunk, its descendants are folded
        // into its text rather than double-counted.
        if el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| emitted_ids.contains(&a.id()))
        {
            continue;
        }
        let Some(chunk_type) = chunk_type_for_tag(&el) else {
            continue;
        };

        let raw_text = match chunk_type {
            ChunkType::Media => el
                .value()
                .attr("alt")
                .or_else(|| el.value().attr("src"))
                .unwrap_or("")
                .to_string(),
            _ => el.text().collect::<Vec<_>>().join(" "),
        };
        let text = sanitize_text(&raw_text);
        if text.is_empty() {
            continue;
        }

        emitted_ids.insert(el.id());
        let xpath_prefix = approximate_xpath(&el);
        chunks.push(HtmlChunk {
            weight: base_weight(chunk_type),
            text,
            attrs: extract_attrs(&el),
            xpath_prefix,
            chunk_type,
        });
    }

    chunks
}

/// Applies a page-type-specific weight multiplier, e.g. product pages
/// up-weight PARAGRAPH chunks carrying price-like text and CARD chunks.
pub fn apply_page_type_weights(chunks: &mut [HtmlChunk], page_type: &str) {
    for chunk in chunks.iter_mut() {
        match page_type {
            "product_detail" | "product_listing" => {
                if chunk.chunk_type == ChunkType::Card {
                    chunk.weight *= 1.5;
                }
                if chunk.chunk_type == ChunkType::Paragraph && looks_price_like(&chunk.text) {
                    chunk.weight *= 1.3;
                }
            }
            "article" | "news_portal" | "wiki" => {
                if chunk.chunk_type == ChunkType::Heading {
                    chunk.weight *= 1.2;
                }
            }
            "documentation" => {
                if chunk.chunk_type == ChunkType::Code {
                    chunk.weight *= 2.0;
                }
            }
            _ => {}
        }
    }
}

fn looks_price_like(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && ["$", "€", "£", "₩", "¥"].iter().any(|sym| text.contains(sym))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_headings_and_paragraphs() {
        let doc = Html::parse_document("<html><body><h1>Title</h1><p>Body text here.</p></body></html>");
        let chunks = chunk(&doc, &HashSet::new(), &[]);
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Heading && c.text == "Title"));
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkType::Paragraph));
    }

    #[test]
    fn skips_excluded_nodes() {
        let doc = Html::parse_document("<html><body><p>keep</p></body></html>");
        let p_id = Selector::parse("p").ok().and_then(|s| doc.select(&s).next()).map(|e| e.id()).unwrap();
        let mut excluded = HashSet::new();
        excluded.insert(p_id);
        let chunks = chunk(&doc, &excluded, &[]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn product_weighting_boosts_price_like_paragraphs() {
        let mut chunks = vec![HtmlChunk {
            chunk_type: ChunkType::Paragraph,
            text: "Only $19.99 today".to_string(),
            weight: base_weight(ChunkType::Paragraph),
            attrs: HashMap::new(),
            xpath_prefix: "/html/body/p[1]".to_string(),
        }];
        let before = chunks[0].weight;
        apply_page_type_weights(&mut chunks, "product_detail");
        assert!(chunks[0].weight > before);
    }
}
