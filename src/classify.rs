//! C6 — Page-Type Classifier & Schema Dispatcher.
//!
//! Weighted voting over URL/meta/DOM/JSON-LD signals, with a captcha/WAF
//! short-circuit and a schema override table. Dispatch is registry-keyed
//! by page-type tag, mirroring the teacher's `workflow/schema.rs::StepType`
//! tagged-enum convention even though the teacher has no classification
//! concept of its own.

use crate::interactive::Interactable;
use crate::structured::Metadata;
use scraper::{Html, Selector};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BlockedInfo {
    pub kind: String,
    pub verify_ref: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub page_type: String,
    pub blocked_info: Option<BlockedInfo>,
}

const BLOCKED_SIGNATURES: &[(&str, &str)] = &[
    ("cf-chl", "cloudflare"),
    ("cloudflare", "cloudflare"),
    ("g-recaptcha", "recaptcha"),
    ("grecaptcha", "recaptcha"),
    ("h-captcha", "hcaptcha"),
    ("hcaptcha", "hcaptcha"),
    ("cf-turnstile", "turnstile"),
    ("turnstile", "turnstile"),
    ("datadome", "datadome"),
    ("perimeterx", "perimeterx"),
    ("imperva", "imperva"),
    ("incapsula", "imperva"),
];

const VERIFY_NAME_HINTS: &[&str] = &["verify", "i'm not a robot", "i am not a robot", "continue"];

/// Schema `@type` values that always win the page-type vote outright,
/// regardless of URL/DOM signals (spec §4.6's "schema override table").
fn schema_override(metadata: &[Metadata]) -> Option<&'static str> {
    metadata.iter().find_map(|m| match m.schema_name.as_str() {
        "WikiArticle" => Some("wiki"),
        "VideoObject" => Some("video"),
        _ => None,
    })
}

fn detect_blocked(raw_html_lower: &str, interactables: &[Interactable]) -> Option<BlockedInfo> {
    let (_, kind) = BLOCKED_SIGNATURES
        .iter()
        .find(|(needle, _)| raw_html_lower.contains(needle))?;
    let verify_ref = interactables
        .iter()
        .find(|i| {
            let lower = i.name.to_lowercase();
            VERIFY_NAME_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .map(|i| i.r#ref);
    Some(BlockedInfo {
        kind: kind.to_string(),
        verify_ref,
    })
}

fn url_votes(url: &str, votes: &mut HashMap<&'static str, f64>) {
    let lower = url.to_lowercase();
    let rules: &[(&str, &str, f64)] = &[
        ("/cart", "checkout", 2.0),
        ("/checkout", "checkout", 3.0),
        ("/login", "login", 3.0),
        ("/signin", "login", 3.0),
        ("/sign-in", "login", 3.0),
        ("/search", "product_listing", 1.5),
        ("/category", "product_listing", 1.5),
        ("/collections", "product_listing", 1.5),
        ("/product", "product_detail", 2.0),
        ("/dp/", "product_detail", 2.0),
        ("/settings", "settings", 3.0),
        ("/account/settings", "settings", 3.0),
        ("/help", "help_faq", 2.5),
        ("/faq", "help_faq", 2.5),
        ("/docs", "documentation", 2.5),
        ("/documentation", "documentation", 2.5),
        ("/wiki/", "wiki", 3.0),
        ("/watch", "video", 2.0),
    ];
    for (needle, page_type, weight) in rules {
        if lower.contains(needle) {
            *votes.entry(page_type).or_insert(0.0) += weight;
        }
    }
}

fn meta_and_jsonld_votes(metadata: &[Metadata], votes: &mut HashMap<&'static str, f64>) {
    for m in metadata {
        match m.schema_name.as_str() {
            "Product" => *votes.entry("product_detail").or_insert(0.0) += 4.0,
            "Article" | "BlogPosting" => *votes.entry("article").or_insert(0.0) += 3.0,
            "NewsArticle" => *votes.entry("news_portal").or_insert(0.0) += 3.0,
            "VideoObject" => *votes.entry("video").or_insert(0.0) += 4.0,
            _ => {}
        }
    }
}

fn dom_votes(doc: &Html, votes: &mut HashMap<&'static str, f64>) {
    if let Ok(article_selector) = Selector::parse("article") {
        let count = doc.select(&article_selector).count();
        if count >= 3 {
            *votes.entry("news_portal").or_insert(0.0) += 3.0;
        } else if count >= 1 {
            *votes.entry("article").or_insert(0.0) += 1.5;
        }
    }
    if let Ok(form_selector) = Selector::parse("form") {
        if doc.select(&form_selector).count() > 0 {
            *votes.entry("form").or_insert(0.0) += 1.0;
        }
    }
    if let Ok(password_selector) = Selector::parse(r#"input[type="password"]"#) {
        if doc.select(&password_selector).count() > 0 {
            *votes.entry("login").or_insert(0.0) += 3.0;
        }
    }
    if let Ok(table_selector) = Selector::parse("table") {
        if doc.select(&table_selector).count() >= 2 {
            *votes.entry("dashboard").or_insert(0.0) += 1.0;
        }
    }
}

/// Classifies a page into one of the page types named in spec §4.6.
/// Checks the blocked short-circuit first (which skips the rest of the
/// pipeline when it fires), then schema overrides, then weighted voting.
pub fn classify(
    doc: &Html,
    raw_html: &str,
    url: &str,
    metadata: &[Metadata],
    interactables: &[Interactable],
    http_status: Option<u16>,
) -> ClassificationResult {
    let raw_html_lower = raw_html.to_lowercase();
    if let Some(blocked) = detect_blocked(&raw_html_lower, interactables) {
        return ClassificationResult {
            page_type: "blocked".to_string(),
            blocked_info: Some(blocked),
        };
    }

    if matches!(http_status, Some(404) | Some(500) | Some(502) | Some(503)) {
        return ClassificationResult {
            page_type: "error".to_string(),
            blocked_info: None,
        };
    }

    if let Some(overridden) = schema_override(metadata) {
        return ClassificationResult {
            page_type: overridden.to_string(),
            blocked_info: None,
        };
    }

    let mut votes: HashMap<&'static str, f64> = HashMap::new();
    url_votes(url, &mut votes);
    meta_and_jsonld_votes(metadata, &mut votes);
    dom_votes(doc, &mut votes);

    let page_type = votes
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(page_type, _)| page_type.to_string())
        .unwrap_or_else(|| "landing".to_string());

    ClassificationResult {
        page_type,
        blocked_info: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turnstile_signature_classifies_blocked_with_verify_ref() {
        let html = r#"<html><body><div class="cf-turnstile"></div><button>Verify you are human</button></body></html>"#;
        let doc = Html::parse_document(html);
        let interactables = vec![Interactable {
            r#ref: 1,
            tag: "button".to_string(),
            role: "button".to_string(),
            name: "Verify you are human".to_string(),
            affordances: vec![],
            selector_chain: vec![],
            options: vec![],
            bucket: crate::interactive::Bucket::Primary,
            parent_xpath_prefix: String::new(),
        }];
        let result = classify(&doc, html, "https://example.com", &[], &interactables, None);
        assert_eq!(result.page_type, "blocked");
        assert_eq!(result.blocked_info.unwrap().verify_ref, Some(1));
    }

    #[test]
    fn product_metadata_wins_product_detail_vote() {
        let doc = Html::parse_document("<html><body></body></html>");
        let metadata = vec![Metadata {
            schema_name: "Product".to_string(),
            ..Default::default()
        }];
        let result = classify(&doc, "", "https://shop.example.com/item/1", &metadata, &[], None);
        assert_eq!(result.page_type, "product_detail");
    }

    #[test]
    fn wiki_schema_overrides_url_signals() {
        let doc = Html::parse_document("<html><body></body></html>");
        let metadata = vec![Metadata {
            schema_name: "WikiArticle".to_string(),
            ..Default::default()
        }];
        let result = classify(&doc, "", "https://example.com/product/1", &metadata, &[], None);
        assert_eq!(result.page_type, "wiki");
    }
}
