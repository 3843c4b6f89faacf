//! Stage 5 — Compression & ordering, plus the Minimum-Content-Guarantee
//! (MCG) cascade for pages that prune down to almost nothing.

use super::stage4_chunk::HtmlChunk;
use crate::locale::estimate;
use crate::sanitize::sanitize_text;
use crate::structured::Metadata;
use scraper::Html;

pub const MCG_TOKEN_FLOOR: usize = 10;
const RAW_HTML_FALLBACK_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct CompressionOutput {
    pub text: String,
    pub tokens_used: usize,
    /// Set when the MCG cascade had to fall through past the normally
    /// selected chunks; names which tier supplied the final text.
    pub mcg_fallback_tier: Option<&'static str>,
}

/// Greedily selects chunks by descending weight (document order breaking
/// ties, since stage 4 appends chunks in document order and this sort is
/// stable), packing as many as fit under `token_budget`, then renders the
/// selected chunks back in their original document order. No MCG cascade —
/// just the packing, reused directly by `compress::render`'s structural
/// phase.
pub fn greedy_select(chunks: &[HtmlChunk], token_budget: usize, locale: &str) -> String {
    let mut by_weight: Vec<usize> = (0..chunks.len()).collect();
    by_weight.sort_by(|&a, &b| {
        chunks[b]
            .weight
            .partial_cmp(&chunks[a].weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used_tokens = 0usize;
    let mut selected = Vec::new();
    for idx in by_weight {
        let tokens = estimate(&chunks[idx].text, locale);
        if used_tokens + tokens > token_budget {
            continue;
        }
        used_tokens += tokens;
        selected.push(idx);
    }
    selected.sort_unstable();

    selected
        .iter()
        .map(|&i| chunks[i].text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Middle tier of the Minimum-Content-Guarantee cascade: tried once the
/// primary selection falls under [`MCG_TOKEN_FLOOR`], before the caller
/// gives up and reaches for [`raw_html_tail_fallback`]. Falls back to
/// `primary` itself (tagged `insufficient_content`) when no OG description
/// is present or it's too short to help either.
pub fn mcg_cascade(primary: String, locale: &str, metadata: &Metadata) -> CompressionOutput {
    if let Some(description) = metadata.extra.get("description") {
        let text = sanitize_text(description);
        if estimate(&text, locale) >= MCG_TOKEN_FLOOR {
            let tokens_used = estimate(&text, locale);
            return CompressionOutput {
                text,
                tokens_used,
                mcg_fallback_tier: Some("og_description"),
            };
        }
    }

    CompressionOutput {
        tokens_used: estimate(&primary, locale),
        text: primary,
        mcg_fallback_tier: Some("insufficient_content"),
    }
}

/// Last-resort fallback used directly by the pipeline when even
/// [`mcg_cascade`] comes up empty: the raw HTML head region, then the raw
/// HTML's first N characters.
pub fn raw_html_tail_fallback(doc: &Html, raw_html: &str) -> CompressionOutput {
    let head_text: String = doc
        .select(&scraper::Selector::parse("head title, head meta[name=\"description\"]").unwrap())
        .filter_map(|el| el.value().attr("content").map(str::to_string).or_else(|| Some(el.text().collect())))
        .collect::<Vec<_>>()
        .join(" ");
    let sanitized_head = sanitize_text(&head_text);
    if !sanitized_head.is_empty() {
        return CompressionOutput {
            tokens_used: estimate(&sanitized_head, "en"),
            text: sanitized_head,
            mcg_fallback_tier: Some("pruned_html_head"),
        };
    }

    let prefix: String = raw_html.chars().take(RAW_HTML_FALLBACK_CHARS).collect();
    let sanitized = sanitize_text(&prefix);
    CompressionOutput {
        tokens_used: estimate(&sanitized, "en"),
        text: sanitized,
        mcg_fallback_tier: Some("raw_html_prefix"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::stage4_chunk::ChunkType;
    use std::collections::HashMap;

    fn chunk(text: &str, weight: f64) -> HtmlChunk {
        HtmlChunk {
            chunk_type: ChunkType::Paragraph,
            text: text.to_string(),
            weight,
            attrs: HashMap::new(),
            xpath_prefix: "/html/body/p[1]".to_string(),
        }
    }

    #[test]
    fn selects_highest_weight_first_under_tight_budget() {
        let chunks = vec![chunk("low priority filler text here", 1.0), chunk("high priority important content", 10.0)];
        let text = greedy_select(&chunks, 6, "en");
        assert!(text.contains("high priority"));
    }

    #[test]
    fn mcg_falls_back_to_og_description_when_output_too_small() {
        let mut metadata = Metadata::default();
        metadata
            .extra
            .insert("description".to_string(), "A much longer og description with plenty of tokens in it".to_string());
        let out = mcg_cascade("hi".to_string(), "en", &metadata);
        assert_eq!(out.mcg_fallback_tier, Some("og_description"));
    }

    #[test]
    fn mcg_reports_insufficient_content_with_no_description() {
        let out = mcg_cascade("hi".to_string(), "en", &Metadata::default());
        assert_eq!(out.mcg_fallback_tier, Some("insufficient_content"));
        assert_eq!(out.text, "hi");
    }
}
