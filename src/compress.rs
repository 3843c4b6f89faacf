//! C7 — Schema-Aware Compressors.
//!
//! One renderer per page type, sharing the spec's three-phase convention:
//! metadata summary → structural extraction from chunks → text-line
//! fallback, where later phases only fill budget the earlier ones
//! underspent. The structural/fallback phases delegate to
//! [`crate::prune::stage5_compress`]'s generic greedy selector and MCG
//! cascade; this module supplies the page-type-specific phase-1 summary
//! and, for news portals, a dedicated structural renderer.

use crate::cache::{Cache, TemplateParams};
use crate::locale::{compute_section_budgets, dominant_script, estimate, is_cjk_script};
use crate::prune::{class_is_semantic, CompressionOutput, HtmlChunk};
use crate::structured::{to_float, Metadata};
use scraper::{Html, Selector};

const VIDEO_CJK_BUDGET_FACTOR: f64 = 0.85;
/// Default per-item budget for the news-portal headline list, used only
/// until a host's template cache entry supplies a discovered value.
const DEFAULT_NEWS_PORTAL_ITEM_BUDGET: usize = 40;

fn format_count(count: i64) -> String {
    let abs = count.unsigned_abs() as f64;
    if abs >= 1_000_000.0 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Extracts a `(currency, numeric substring)` pair from free text like
/// `"$19.99"` or `"19.99 USD"`. Returns `None` when no digit is found.
fn parse_currency_text(text: &str) -> Option<(Option<String>, String)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let currency = if trimmed.starts_with('$') {
        Some("USD".to_string())
    } else if trimmed.starts_with('€') {
        Some("EUR".to_string())
    } else if trimmed.starts_with('£') {
        Some("GBP".to_string())
    } else if trimmed.starts_with('¥') {
        Some("JPY".to_string())
    } else {
        None
    };
    let numeric: String = trimmed.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',').collect();
    numeric.chars().any(|c| c.is_ascii_digit()).then_some((currency, numeric))
}

/// DOM-scan price-recovery cascade (spec §4.7), tried only once JSON-LD,
/// microdata, and Open Graph have all come up without a price: Amazon-style
/// `a-offscreen` nested spans first, then any element whose `class` carries
/// price semantics, then `data-price`/`data-value` attributes directly.
fn dom_price_fallback(doc: &Html) -> Option<(f64, Option<String>)> {
    if let Ok(selector) = Selector::parse(".a-offscreen") {
        for el in doc.select(&selector) {
            let text = el.text().collect::<String>();
            if let Some((currency, numeric)) = parse_currency_text(&text) {
                if let Some(price) = to_float(&numeric) {
                    return Some((price, currency));
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("[class], [data-price], [data-value]") {
        for el in doc.select(&selector) {
            if let Some(raw) = el.value().attr("data-price").or_else(|| el.value().attr("data-value")) {
                if let Some(price) = to_float(raw) {
                    return Some((price, None));
                }
            }
            if let Some(class) = el.value().attr("class") {
                if class_is_semantic(class) && class.to_lowercase().contains("price") {
                    let text = el.text().collect::<String>();
                    if let Some((currency, numeric)) = parse_currency_text(&text) {
                        if let Some(price) = to_float(&numeric) {
                            return Some((price, currency));
                        }
                    }
                }
            }
        }
    }

    None
}

/// Phase 1: a compact, page-type-specific metadata summary. Empty when the
/// page type has no natural metadata-first rendering (dashboard/default).
fn metadata_summary(page_type: &str, metadata: &Metadata, doc: &Html) -> String {
    let mut lines = Vec::new();
    match page_type {
        "product_detail" | "product_listing" => {
            if let Some(name) = &metadata.name {
                lines.push(format!("Name: {name}"));
            }
            if let Some(price) = metadata.price {
                let currency = metadata.currency.as_deref().unwrap_or("");
                lines.push(format!("Price: {price} {currency}").trim_end().to_string());
            } else if let Some(range) = &metadata.price_range {
                lines.push(format!("Price range: {range}"));
            } else if let Some((price, currency)) = dom_price_fallback(doc) {
                let currency = currency.unwrap_or_default();
                lines.push(format!("Price: {price} {currency}").trim_end().to_string());
            }
            if let Some(rating) = metadata.rating {
                let reviews = metadata
                    .review_count
                    .map(|c| format!(" ({c} reviews)"))
                    .unwrap_or_default();
                lines.push(format!("Rating: {rating}{reviews}"));
            }
            if let Some(brand) = &metadata.brand {
                lines.push(format!("Brand: {brand}"));
            }
            if let Some(availability) = &metadata.availability {
                lines.push(format!("Availability: {availability}"));
            }
        }
        "article" | "wiki" => {
            if let Some(headline) = &metadata.headline {
                lines.push(format!("Headline: {headline}"));
            }
            if let Some(author) = &metadata.author {
                lines.push(format!("Author: {author}"));
            }
            if let Some(date) = &metadata.date_published {
                lines.push(format!("Published: {date}"));
            }
        }
        "video" => {
            if let Some(name) = &metadata.name {
                lines.push(format!("Title: {name}"));
            }
            if let Some(channel) = &metadata.channel {
                lines.push(format!("Channel: {channel}"));
            }
            if let Some(duration) = &metadata.duration {
                lines.push(format!("Duration: {duration}"));
            }
            if let Some(uploaded) = &metadata.upload_date {
                lines.push(format!("Uploaded: {uploaded}"));
            }
            if let Some(views) = metadata.view_count {
                lines.push(format!("Views: {}", format_count(views)));
            }
            if let Some(likes) = metadata.like_count {
                lines.push(format!("Likes: {}", format_count(likes)));
            }
        }
        _ => {}
    }
    lines.join("\n")
}

/// News portals get a numbered headline list instead of the generic
/// greedy selector: each HEADING chunk becomes one list item, optionally
/// followed by the next chunk's text as a one-line summary, each under
/// `per_item_budget` (a per-(host, page_type) template-cache parameter,
/// see [`render`]).
fn news_portal_structural(chunks: &[HtmlChunk], locale: &str, remaining_budget: usize, per_item_budget: usize) -> String {
    use crate::prune::ChunkType;

    let mut out = Vec::new();
    let mut used = 0usize;
    let mut n = 0usize;

    let mut iter = chunks.iter().peekable();
    while let Some(chunk) = iter.next() {
        if chunk.chunk_type != ChunkType::Heading {
            continue;
        }
        n += 1;
        let mut line = format!("{n}. {}", chunk.text);
        if let Some(next) = iter.peek() {
            if next.chunk_type == ChunkType::Paragraph {
                let summary_budget = per_item_budget.min(remaining_budget.saturating_sub(used));
                let summary_tokens = estimate(&next.text, locale);
                if summary_tokens <= summary_budget {
                    line.push_str(&format!(" — {}", next.text));
                }
            }
        }
        let line_tokens = estimate(&line, locale);
        if used + line_tokens > remaining_budget {
            break;
        }
        used += line_tokens;
        out.push(line);
    }
    out.join("\n")
}

/// Renders the `## Info` block for one page, following the shared
/// three-phase convention. If the combined summary + structural text falls
/// under the Minimum-Content-Guarantee floor, falls through the cascade:
/// OG description (`mcg_cascade`), then the raw HTML head / prefix
/// (`raw_html_tail_fallback`), which is why `doc`/`raw_html` are threaded
/// all the way in here. `cache`/`host` back the per-(host, page_type)
/// template cache (C9) that news portals use for their per-item budget.
#[allow(clippy::too_many_arguments)]
pub fn render(
    page_type: &str,
    chunks: &[HtmlChunk],
    metadata: &Metadata,
    locale: &str,
    budget: usize,
    doc: &Html,
    raw_html: &str,
    cache: &Cache,
    host: &str,
) -> CompressionOutput {
    let budget = adjust_cjk_budget(page_type, chunks, locale, budget);

    let summary = metadata_summary(page_type, metadata, doc);
    let summary_tokens = estimate(&summary, locale);
    let remaining = budget.saturating_sub(summary_tokens);

    let structural = if page_type == "news_portal" {
        let per_item_budget = cache.get_template(host, page_type).per_item_budget_tokens.unwrap_or_else(|| {
            compute_section_budgets(remaining, &[1.0; 5]).into_iter().next().unwrap_or(DEFAULT_NEWS_PORTAL_ITEM_BUDGET)
        });
        cache.store_template(host, page_type, TemplateParams { per_item_budget_tokens: Some(per_item_budget) });
        news_portal_structural(chunks, locale, remaining, per_item_budget)
    } else {
        crate::prune::greedy_select(chunks, remaining, locale)
    };

    let combined = if summary.is_empty() {
        structural
    } else if structural.is_empty() {
        summary
    } else {
        format!("{summary}\n\n{structural}")
    };

    let tokens_used = estimate(&combined, locale);
    if tokens_used >= crate::prune::MCG_TOKEN_FLOOR {
        return CompressionOutput {
            text: combined,
            tokens_used,
            mcg_fallback_tier: None,
        };
    }

    let cascaded = crate::prune::mcg_cascade(combined, locale, metadata);
    if cascaded.tokens_used >= crate::prune::MCG_TOKEN_FLOOR {
        cascaded
    } else {
        crate::prune::raw_html_tail_fallback(doc, raw_html)
    }
}

/// Video descriptions get a CJK-aware budget guard (spec §4.7): when the
/// dominant script of the chunk text is CJK, the effective budget is
/// scaled by 0.85 before truncation so Han/Hangul/Kana glyphs (which carry
/// more meaning per character) aren't cut as aggressively as the raw token
/// estimate alone would suggest.
fn adjust_cjk_budget(page_type: &str, chunks: &[HtmlChunk], _locale: &str, budget: usize) -> usize {
    if page_type != "video" {
        return budget;
    }
    let aggregate: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
    match dominant_script(&aggregate) {
        Some(script) if is_cjk_script(script) => (budget as f64 * VIDEO_CJK_BUDGET_FACTOR) as usize,
        _ => budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_large_counts_with_suffix() {
        assert_eq!(format_count(1_500_000), "1.5M");
        assert_eq!(format_count(2_400), "2.4K");
        assert_eq!(format_count(42), "42");
    }

    #[test]
    fn product_summary_includes_zero_price() {
        let doc = Html::parse_document("<html><body></body></html>");
        let metadata = Metadata {
            price: Some(0.0),
            currency: Some("USD".to_string()),
            ..Default::default()
        };
        let summary = metadata_summary("product_detail", &metadata, &doc);
        assert!(summary.contains("Price: 0 USD"));
    }

    #[test]
    fn product_summary_falls_back_to_dom_scanned_price() {
        let doc = Html::parse_document(
            r#"<html><body><span class="a-offscreen">$24.99</span></body></html>"#,
        );
        let metadata = Metadata::default();
        let summary = metadata_summary("product_detail", &metadata, &doc);
        assert!(summary.contains("Price: 24.99 USD"));
    }

    #[test]
    fn render_falls_back_to_og_description_when_chunks_are_too_thin() {
        let doc = Html::parse_document("<html><head><title>x</title></head><body><p>hi</p></body></html>");
        let chunks = vec![crate::prune::HtmlChunk {
            chunk_type: crate::prune::ChunkType::Paragraph,
            text: "hi".to_string(),
            weight: 1.0,
            attrs: Default::default(),
            xpath_prefix: String::new(),
        }];
        let mut metadata = Metadata::default();
        metadata.extra.insert(
            "description".to_string(),
            "A much longer og description with plenty of tokens in it to clear the floor".to_string(),
        );
        let cache = Cache::new(20, 90);
        let out = render("default", &chunks, &metadata, "en", 100, &doc, "<html></html>", &cache, "example.com");
        assert_eq!(out.mcg_fallback_tier, Some("og_description"));
        assert!(out.text.contains("og description"));
    }

    #[test]
    fn news_portal_reuses_template_cache_across_calls() {
        let doc = Html::parse_document("<html><body></body></html>");
        let chunks = vec![
            crate::prune::HtmlChunk {
                chunk_type: crate::prune::ChunkType::Heading,
                text: "Headline".to_string(),
                weight: 1.0,
                attrs: Default::default(),
                xpath_prefix: String::new(),
            },
        ];
        let metadata = Metadata::default();
        let cache = Cache::new(20, 90);
        render("news_portal", &chunks, &metadata, "en", 500, &doc, "<html></html>", &cache, "news.example.com");
        let template = cache.get_template("news.example.com", "news_portal");
        assert!(template.per_item_budget_tokens.is_some());
    }

    #[test]
    fn cjk_video_budget_is_scaled_down() {
        let chunks = vec![crate::prune::HtmlChunk {
            chunk_type: crate::prune::ChunkType::Paragraph,
            text: "이것은 한국어 비디오 설명입니다".to_string(),
            weight: 1.0,
            attrs: Default::default(),
            xpath_prefix: String::new(),
        }];
        let adjusted = adjust_cjk_budget("video", &chunks, "ko", 1000);
        assert_eq!(adjusted, 850);
    }
}
