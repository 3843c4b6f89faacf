//! C3 — Structured-Data Extractor.
//!
//! Parses JSON-LD (`<script type="application/ld+json">`), microdata
//! (`itemprop`), and Open Graph / `<meta name="...">` tags into a typed
//! [`Metadata`]. Dispatch is by `@type` string, not by subtype inheritance
//! (spec §9's "open polymorphism over schemas" design note), mirrored here
//! on the teacher's `workflow/schema.rs::StepType` tag-dispatch idiom even
//! though the teacher itself has no structured-data concept.

use crate::sanitize::sanitize_text;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

const MAX_GRAPH_DEPTH: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub schema_name: String,

    // Product
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub brand: Option<String>,
    pub availability: Option<String>,
    pub image: Option<String>,

    // Article / NewsArticle
    pub headline: Option<String>,
    pub author: Option<String>,
    pub date_published: Option<String>,
    pub body: Option<String>,

    // VideoObject
    pub channel: Option<String>,
    pub duration: Option<String>,
    pub upload_date: Option<String>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub thumbnail_url: Option<String>,

    // open-shape overflow for schemas without a dedicated field set
    // (BreadcrumbList, FAQPage, Event, LocalBusiness, WikiArticle, Generic)
    pub extra: HashMap<String, String>,
}

impl Metadata {
    fn with_schema(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            ..Default::default()
        }
    }
}

/// Converts `"1,500.99"` and the European `"1.500,99"` form to the same
/// float. Decimal separator is whichever of `,`/`.` appears last in the
/// string; the other is treated as a thousands grouping mark and dropped.
pub fn to_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last_comma = trimmed.rfind(',');
    let last_dot = trimmed.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => {
            // European: '.' is a thousands separator, ',' is the decimal point.
            trimmed.replace('.', "").replace(',', ".")
        }
        (Some(c), Some(d)) if d > c => {
            // US: ',' is a thousands separator, '.' is the decimal point.
            trimmed.replace(',', "")
        }
        (Some(_), None) => {
            // Only a comma: decimal point if exactly two trailing digits,
            // else a thousands separator.
            let after = trimmed.rsplit(',').next().unwrap_or("");
            if after.len() == 2 && after.chars().all(|c| c.is_ascii_digit()) {
                trimmed.replace(',', ".")
            } else {
                trimmed.replace(',', "")
            }
        }
        _ => trimmed.replace(',', ""),
    };
    normalized.parse::<f64>().ok()
}

/// Rounds rather than truncates: `"4.9"` → `5`.
pub fn to_int(raw: &str) -> Option<i64> {
    to_float(raw).map(|f| f.round() as i64)
}

/// `http`/`https` only; rejects `javascript:`, `data:`, and other schemes.
pub fn is_allowed_image_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extracts all JSON-LD blocks from the document, recursing into `@graph`
/// to a bounded depth to prevent adversarial nesting from blowing the
/// stack, and dispatches each top-level object to a per-`@type` parser.
/// Falls back to microdata (`itemscope`/`itemprop`) when no JSON-LD block
/// is present, then to Open Graph / `<meta>` tags when neither is.
pub fn extract(doc: &Html) -> Vec<Metadata> {
    let mut results = Vec::new();
    if let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) {
        for script in doc.select(&selector) {
            let raw = script.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                collect_from_value(&value, 0, &mut results);
            }
        }
    }
    if results.is_empty() {
        results.extend(extract_microdata(doc));
    }
    if results.is_empty() {
        if let Some(meta) = extract_open_graph(doc) {
            results.push(meta);
        }
    }
    results
}

/// Collects `itemprop` key/value pairs under `scope`, not descending past a
/// nested `itemscope` boundary (those become their own top-level item).
fn collect_itemprops(scope: scraper::ElementRef) -> HashMap<String, String> {
    let mut props = HashMap::new();
    for child in scope.children().filter_map(scraper::ElementRef::wrap) {
        collect_itemprops_recursive(child, &mut props);
    }
    props
}

fn collect_itemprops_recursive(el: scraper::ElementRef, props: &mut HashMap<String, String>) {
    if let Some(key) = el.value().attr("itemprop") {
        let value = el
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());
        props.insert(key.to_string(), value);
    }
    if el.value().attr("itemscope").is_some() {
        return;
    }
    for child in el.children().filter_map(scraper::ElementRef::wrap) {
        collect_itemprops_recursive(child, props);
    }
}

fn build_from_microdata_props(type_name: &str, props: &HashMap<String, String>) -> Metadata {
    let mut meta = Metadata::with_schema(type_name);
    if type_name.contains("Product") || !props.contains_key("headline") {
        meta.name = props.get("name").map(|s| sanitize_text(s));
        meta.price = props.get("price").and_then(|p| to_float(p));
        meta.currency = props.get("priceCurrency").map(|s| sanitize_text(s));
        meta.brand = props.get("brand").map(|s| sanitize_text(s));
        meta.availability = props.get("availability").map(|s| sanitize_text(s));
        meta.rating = props.get("ratingValue").and_then(|r| to_float(r));
        meta.review_count = props.get("reviewCount").and_then(|r| to_int(r));
    }
    for (key, value) in props {
        if !matches!(
            key.as_str(),
            "name" | "price" | "priceCurrency" | "brand" | "availability" | "ratingValue" | "reviewCount"
        ) {
            meta.extra.insert(key.clone(), sanitize_text(value));
        }
    }
    meta
}

/// Extracts `itemscope`/`itemprop` microdata islands. Each `[itemscope]`
/// element with an `itemtype` becomes one [`Metadata`]; when the page uses
/// bare `itemprop` attributes with no enclosing scope (seen on some
/// minimal product templates), they're treated as one implicit `Product`.
fn extract_microdata(doc: &Html) -> Vec<Metadata> {
    let mut results = Vec::new();
    if let Ok(scope_selector) = Selector::parse("[itemscope][itemtype]") {
        for scope in doc.select(&scope_selector) {
            let itemtype = scope.value().attr("itemtype").unwrap_or("");
            let type_name = itemtype.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("Generic");
            let props = collect_itemprops(scope);
            if !props.is_empty() {
                results.push(build_from_microdata_props(type_name, &props));
            }
        }
    }
    if results.is_empty() {
        if let Ok(prop_selector) = Selector::parse("[itemprop]") {
            let props: HashMap<String, String> = doc
                .select(&prop_selector)
                .filter_map(|el| {
                    let key = el.value().attr("itemprop")?.to_string();
                    let value = el
                        .value()
                        .attr("content")
                        .map(str::to_string)
                        .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());
                    Some((key, value))
                })
                .collect();
            if !props.is_empty() {
                results.push(build_from_microdata_props("Product", &props));
            }
        }
    }
    results
}

fn collect_from_value(value: &Value, depth: usize, out: &mut Vec<Metadata>) {
    if depth > MAX_GRAPH_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_from_value(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_from_value(graph, depth + 1, out);
                return;
            }
            out.push(dispatch(value));
        }
        _ => {}
    }
}

fn get_str(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(sanitize_text)
}

fn get_numeric_str(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn resolve_type_name(obj: &Value) -> String {
    match obj.get("@type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(arr)) => arr
            .iter()
            .find_map(|v| v.as_str())
            .unwrap_or("Generic")
            .to_string(),
        _ => "Generic".to_string(),
    }
}

/// Dispatches a single JSON-LD object by `@type` into a typed [`Metadata`].
/// Registry keyed by tag, per the open-polymorphism design note: adding a
/// schema means adding one arm here.
pub fn dispatch(obj: &Value) -> Metadata {
    let type_name = resolve_type_name(obj);
    match type_name.as_str() {
        "Product" => parse_product(obj),
        "Article" | "NewsArticle" | "BlogPosting" => parse_article(&type_name, obj),
        "VideoObject" => parse_video(obj),
        "WikiArticle" => parse_wiki(obj),
        "BreadcrumbList" => parse_breadcrumb_list(obj),
        "FAQPage" => parse_faq_page(obj),
        "Event" => parse_event(obj),
        "LocalBusiness" => parse_local_business(obj),
        other => {
            let mut meta = Metadata::with_schema(other);
            if let Some(name) = get_str(obj, "name") {
                meta.extra.insert("name".to_string(), name);
            }
            meta
        }
    }
}

fn parse_product(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("Product");
    meta.name = get_str(obj, "name");
    meta.brand = obj
        .get("brand")
        .and_then(|b| b.get("name").and_then(|n| n.as_str()).or(b.as_str()))
        .map(sanitize_text);
    meta.image = obj
        .get("image")
        .and_then(|i| i.as_str().map(str::to_string).or_else(|| {
            i.as_array().and_then(|a| a.first()).and_then(|v| v.as_str()).map(str::to_string)
        }))
        .filter(|url| is_allowed_image_url(url));

    let offers = obj.get("offers").and_then(|o| {
        // `offers` may be a single object or an array; take the first.
        if o.is_array() {
            o.as_array().and_then(|a| a.first().cloned())
        } else {
            Some(o.clone())
        }
    });
    if let Some(offers) = offers {
        // Explicit `None` checks: a literal 0 price must survive, so we
        // never fold `price == 0` into `None` via `unwrap_or`.
        meta.price = get_numeric_str(&offers, "price")
            .as_deref()
            .and_then(to_float)
            .or_else(|| {
                get_numeric_str(&offers, "lowPrice").as_deref().and_then(to_float)
            });
        meta.currency = offers
            .get("priceCurrency")
            .and_then(|v| v.as_str())
            .map(sanitize_text);
        meta.availability = offers
            .get("availability")
            .and_then(|v| v.as_str())
            .map(sanitize_text);
        let low = get_numeric_str(&offers, "lowPrice");
        let high = get_numeric_str(&offers, "highPrice");
        if let (Some(low), Some(high)) = (low, high) {
            meta.price_range = Some(format!("{low}-{high}"));
        }
    }

    if let Some(rating_obj) = obj.get("aggregateRating") {
        meta.rating = get_numeric_str(rating_obj, "ratingValue").as_deref().and_then(to_float);
        meta.review_count = get_numeric_str(rating_obj, "reviewCount").as_deref().and_then(to_int);
    }

    meta
}

fn parse_article(type_name: &str, obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema(type_name);
    meta.headline = get_str(obj, "headline").or_else(|| get_str(obj, "name"));
    meta.author = obj
        .get("author")
        .and_then(|a| a.get("name").and_then(|n| n.as_str()).or(a.as_str()))
        .map(sanitize_text);
    meta.date_published = get_str(obj, "datePublished");
    meta.body = get_str(obj, "articleBody");
    meta
}

fn parse_video(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("VideoObject");
    meta.name = get_str(obj, "name");
    meta.channel = obj
        .get("author")
        .and_then(|a| a.get("name").and_then(|n| n.as_str()).or(a.as_str()))
        .map(sanitize_text);
    meta.duration = get_str(obj, "duration");
    meta.upload_date = get_str(obj, "uploadDate");
    meta.thumbnail_url = obj
        .get("thumbnailUrl")
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|url| is_allowed_image_url(url));

    if let Some(stats) = obj.get("interactionStatistic") {
        let entries = if stats.is_array() {
            stats.as_array().cloned().unwrap_or_default()
        } else {
            vec![stats.clone()]
        };
        for entry in entries {
            let count_type = entry
                .get("interactionType")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let count = get_numeric_str(&entry, "userInteractionCount")
                .as_deref()
                .and_then(to_int);
            if count_type.contains("WatchAction") {
                meta.view_count = count;
            } else if count_type.contains("LikeAction") {
                meta.like_count = count;
            }
        }
    }
    meta
}

fn parse_wiki(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("WikiArticle");
    meta.headline = get_str(obj, "name").or_else(|| get_str(obj, "headline"));
    meta.body = get_str(obj, "articleBody");
    meta
}

/// `itemListElement` ordered by `position`, flattened into a single
/// `"Home > Category > Product"`-shaped trail. `item` may carry the crumb's
/// name directly or nest it under its own `name`.
fn parse_breadcrumb_list(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("BreadcrumbList");
    let Some(items) = obj.get("itemListElement").and_then(|v| v.as_array()) else {
        return meta;
    };
    let mut ordered: Vec<(i64, String)> = items
        .iter()
        .filter_map(|item| {
            let position = item.get("position").and_then(|p| p.as_i64()).unwrap_or(0);
            let name = item
                .get("name")
                .and_then(|n| n.as_str())
                .or_else(|| item.get("item").and_then(|i| i.get("name")).and_then(|n| n.as_str()))
                .map(sanitize_text)?;
            Some((position, name))
        })
        .collect();
    ordered.sort_by_key(|(position, _)| *position);
    let trail = ordered.into_iter().map(|(_, name)| name).collect::<Vec<_>>().join(" > ");
    if !trail.is_empty() {
        meta.extra.insert("breadcrumb_trail".to_string(), trail);
    }
    meta
}

/// `mainEntity` question/answer pairs, joined into one overflow string since
/// there's no dedicated per-question field set (spec's open-shape schemas).
fn parse_faq_page(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("FAQPage");
    let Some(entities) = obj.get("mainEntity").and_then(|v| v.as_array()) else {
        return meta;
    };
    let pairs: Vec<String> = entities
        .iter()
        .filter_map(|q| {
            let question = get_str(q, "name")?;
            let answer = q
                .get("acceptedAnswer")
                .and_then(|a| a.get("text"))
                .and_then(|t| t.as_str())
                .map(sanitize_text)
                .unwrap_or_default();
            Some(format!("Q: {question}\nA: {answer}"))
        })
        .collect();
    if !pairs.is_empty() {
        meta.extra.insert("faq_count".to_string(), pairs.len().to_string());
        meta.extra.insert("faq_pairs".to_string(), pairs.join("\n\n"));
    }
    meta
}

fn parse_event(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("Event");
    meta.name = get_str(obj, "name");
    if let Some(start) = get_str(obj, "startDate") {
        meta.extra.insert("event_start_date".to_string(), start);
    }
    let location_name = obj
        .get("location")
        .and_then(|l| l.get("name").and_then(|n| n.as_str()).or_else(|| l.as_str()))
        .map(sanitize_text);
    if let Some(location_name) = location_name {
        meta.extra.insert("event_location".to_string(), location_name);
    }
    meta
}

fn parse_local_business(obj: &Value) -> Metadata {
    let mut meta = Metadata::with_schema("LocalBusiness");
    meta.name = get_str(obj, "name");
    if let Some(phone) = get_str(obj, "telephone") {
        meta.extra.insert("telephone".to_string(), phone);
    }
    let address = obj.get("address").and_then(|a| {
        a.as_str().map(str::to_string).or_else(|| {
            let parts = [
                a.get("streetAddress").and_then(|v| v.as_str()),
                a.get("addressLocality").and_then(|v| v.as_str()),
                a.get("addressRegion").and_then(|v| v.as_str()),
                a.get("postalCode").and_then(|v| v.as_str()),
            ];
            let joined = parts.iter().flatten().copied().collect::<Vec<_>>().join(", ");
            (!joined.is_empty()).then_some(joined)
        })
    });
    if let Some(address) = address {
        meta.extra.insert("address".to_string(), sanitize_text(&address));
    }
    meta
}

fn extract_open_graph(doc: &Html) -> Option<Metadata> {
    let selector = Selector::parse("meta[property^=\"og:\"], meta[name]").ok()?;
    let mut meta = Metadata::with_schema("Generic");
    let mut found_any = false;
    for tag in doc.select(&selector) {
        let key = tag
            .value()
            .attr("property")
            .or_else(|| tag.value().attr("name"))
            .unwrap_or("");
        let content = tag.value().attr("content").unwrap_or("");
        if content.is_empty() {
            continue;
        }
        found_any = true;
        match key {
            "og:title" => meta.name = Some(sanitize_text(content)),
            "og:description" => {
                meta.extra.insert("description".to_string(), sanitize_text(content));
            }
            "og:image" if is_allowed_image_url(content) => {
                meta.image = Some(content.to_string());
            }
            other => {
                meta.extra.insert(other.to_string(), sanitize_text(content));
            }
        }
    }
    found_any.then_some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_us_and_european_float_formats() {
        assert_eq!(to_float("1,500.99"), Some(1500.99));
        assert_eq!(to_float("1.500,99"), Some(1500.99));
    }

    #[test]
    fn rounds_rather_than_truncates() {
        assert_eq!(to_int("4.9"), Some(5));
        assert_eq!(to_int("4.4"), Some(4));
    }

    #[test]
    fn zero_price_is_not_none() {
        let json = serde_json::json!({
            "@type": "Product",
            "name": "Free Sample",
            "offers": { "price": "0", "priceCurrency": "USD" }
        });
        let meta = dispatch(&json);
        assert_eq!(meta.price, Some(0.0));
    }

    #[test]
    fn microdata_itemscope_product_is_extracted() {
        let html = r#"<html><body>
            <div itemscope itemtype="https://schema.org/Product">
                <span itemprop="name">Widget</span>
                <span itemprop="price">139000</span>
                <span itemprop="priceCurrency">KRW</span>
            </div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let results = extract(&doc);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].price, Some(139000.0));
        assert_eq!(results[0].currency.as_deref(), Some("KRW"));
    }

    #[test]
    fn microdata_bare_itemprop_without_itemscope_falls_back_to_product() {
        let html = r#"<html><body>
            <span itemprop="price">139000</span>
            <span itemprop="priceCurrency">KRW</span>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let results = extract(&doc);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].schema_name, "Product");
        assert_eq!(results[0].price, Some(139000.0));
    }

    #[test]
    fn rejects_javascript_and_data_image_urls() {
        assert!(!is_allowed_image_url("javascript:alert(1)"));
        assert!(!is_allowed_image_url("data:image/png;base64,aaaa"));
        assert!(is_allowed_image_url("https://example.com/a.png"));
    }

    #[test]
    fn product_round_trips_recognized_fields() {
        let json = serde_json::json!({
            "@type": "Product",
            "name": "Widget",
            "brand": { "name": "Acme" },
            "offers": {
                "price": "139000",
                "priceCurrency": "KRW",
                "availability": "https://schema.org/InStock"
            },
            "aggregateRating": { "ratingValue": "4.8", "reviewCount": "231" }
        });
        let meta = dispatch(&json);
        assert_eq!(meta.name.as_deref(), Some("Widget"));
        assert_eq!(meta.brand.as_deref(), Some("Acme"));
        assert_eq!(meta.price, Some(139000.0));
        assert_eq!(meta.currency.as_deref(), Some("KRW"));
        assert_eq!(meta.review_count, Some(231));
    }

    #[test]
    fn breadcrumb_list_orders_trail_by_position() {
        let json = serde_json::json!({
            "@type": "BreadcrumbList",
            "itemListElement": [
                {"position": 2, "name": "Laptops"},
                {"position": 1, "name": "Home"},
                {"position": 3, "item": {"name": "ThinkPad X1"}},
            ]
        });
        let meta = dispatch(&json);
        assert_eq!(meta.extra.get("breadcrumb_trail").map(String::as_str), Some("Home > Laptops > ThinkPad X1"));
    }

    #[test]
    fn faq_page_collects_question_answer_pairs() {
        let json = serde_json::json!({
            "@type": "FAQPage",
            "mainEntity": [
                {"name": "Do you ship internationally?", "acceptedAnswer": {"text": "Yes, worldwide."}},
            ]
        });
        let meta = dispatch(&json);
        assert_eq!(meta.extra.get("faq_count").map(String::as_str), Some("1"));
        assert!(meta.extra.get("faq_pairs").unwrap().contains("Do you ship internationally?"));
    }

    #[test]
    fn event_captures_name_start_date_and_location() {
        let json = serde_json::json!({
            "@type": "Event",
            "name": "Rust Meetup",
            "startDate": "2026-09-01T18:00",
            "location": {"name": "Community Hall"}
        });
        let meta = dispatch(&json);
        assert_eq!(meta.name.as_deref(), Some("Rust Meetup"));
        assert_eq!(meta.extra.get("event_start_date").map(String::as_str), Some("2026-09-01T18:00"));
        assert_eq!(meta.extra.get("event_location").map(String::as_str), Some("Community Hall"));
    }

    #[test]
    fn local_business_captures_name_phone_and_address() {
        let json = serde_json::json!({
            "@type": "LocalBusiness",
            "name": "Acme Cafe",
            "telephone": "+1-555-0100",
            "address": {"streetAddress": "1 Main St", "addressLocality": "Springfield"}
        });
        let meta = dispatch(&json);
        assert_eq!(meta.name.as_deref(), Some("Acme Cafe"));
        assert_eq!(meta.extra.get("telephone").map(String::as_str), Some("+1-555-0100"));
        assert_eq!(meta.extra.get("address").map(String::as_str), Some("1 Main St, Springfield"));
    }

    #[test]
    fn bounded_graph_recursion_does_not_stack_overflow() {
        let mut value = serde_json::json!({"@type": "Product", "name": "leaf"});
        for _ in 0..(MAX_GRAPH_DEPTH + 10) {
            value = serde_json::json!({ "@graph": [value] });
        }
        let mut out = Vec::new();
        collect_from_value(&value, 0, &mut out);
        assert!(out.len() <= 1);
    }
}
