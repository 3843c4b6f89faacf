//! Orchestration: wires C1-C9 together into one pure function of
//! `(Snapshot, PageMapConfig, &Cache) -> Result<PageMap>`.
//!
//! Grounded on the teacher's `workflow/engine.rs` step-runner: a fixed
//! sequence of stages, a deadline checked between each one, and a
//! cancellation flag honored at the same granularity, just applied to a
//! compression pipeline instead of a browser-automation script.

use crate::assemble::{Fingerprint, PageMap, PageMapStats};
use crate::cache::{Cache, CacheTier, InvalidationReason};
use crate::classify;
use crate::compress;
use crate::config::PageMapConfig;
use crate::error::{PageMapError, Result};
use crate::html_normalize;
use crate::interactive::{self, Interactable};
use crate::locale;
use crate::prune;
use crate::sanitize::sanitize_text;
use crate::snapshot::Snapshot;
use crate::structured::{self, Metadata};
use scraper::Html;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Target size for the assembled `## Info` block, before per-page-type
/// adjustment (spec §4.1's 2-5k token page-map budget minus room for
/// actions/images/meta overhead).
const DEFAULT_INFO_TOKEN_BUDGET: usize = 2200;

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(30);

fn check_deadline(cache: &Cache, url: &str, started_at: Instant, stage: &str) -> Result<()> {
    if started_at.elapsed() > PIPELINE_TIMEOUT {
        cache.invalidate(url, InvalidationReason::Timeout);
        return Err(PageMapError::PipelineTimeout {
            stage: stage.to_string(),
        });
    }
    Ok(())
}

fn check_cancelled(cache: &Cache, url: &str, cancel: Option<&AtomicBool>, stage: &str) -> Result<()> {
    if cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false) {
        cache.invalidate(url, InvalidationReason::Action);
        return Err(PageMapError::PipelineTimeout {
            stage: format!("{stage} (cancelled)"),
        });
    }
    Ok(())
}

fn merge_metadata(all: &[Metadata]) -> Metadata {
    all.first().cloned().unwrap_or_default()
}

/// Stable hash over `(tag, role, name-or-null)` for every detected
/// interactable, in ref order. Changes only when the page's *structure*
/// changes, not its copy — the basis for cache Tier B reuse.
fn dom_structure_hash(interactables: &[Interactable]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for i in interactables {
        i.tag.hash(&mut hasher);
        i.role.hash(&mut hasher);
        let name_or_null: &str = if i.name.is_empty() { "\u{0}" } else { &i.name };
        name_or_null.hash(&mut hasher);
    }
    hasher.finish()
}

/// Cheap proxy for spec's "hash over the sanitized concatenation of
/// surviving chunks": hashing the *normalized but not yet pruned* document's
/// text instead. The literal spec wording is computed from chunks C5-C7
/// produce, but the whole point of a fingerprint is to decide whether to run
/// C3-C8 at all — hashing their own output can't gate them. This hashes the
/// same sanitized text a no-op edit would leave untouched, so Tier A/B still
/// catch the common case (nothing but whitespace/markup churn) while the
/// decision lands before any of the expensive stages run.
fn content_hash(doc: &Html) -> u64 {
    let text: String = doc.root_element().text().collect();
    let mut hasher = DefaultHasher::new();
    sanitize_text(&text).hash(&mut hasher);
    hasher.finish()
}

/// Runs the full pipeline for one snapshot. `cancel`, when provided, is
/// polled between every stage; `cache` supplies the prior build (if any)
/// for this URL to decide which tier applies.
pub fn build_page_map(
    snapshot: &Snapshot,
    config: &PageMapConfig,
    cache: &Cache,
    cancel: Option<&AtomicBool>,
) -> Result<PageMap> {
    let started_at = Instant::now();
    let url = snapshot.effective_url().to_string();
    tracing::debug!(url = %url, html_bytes = snapshot.html.len(), "build_page_map: starting");

    check_cancelled(cache, &url, cancel, "normalize")?;
    check_deadline(cache, &url, started_at, "normalize")?;
    let normalized = html_normalize::parse(&snapshot.html, config).map_err(|err| {
        cache.invalidate(&url, InvalidationReason::Error);
        err
    })?;
    if normalized.removed_hidden_nodes > 0 {
        tracing::debug!(removed = normalized.removed_hidden_nodes, "normalize: stripped hidden subtrees");
    }

    check_cancelled(cache, &url, cancel, "detect_interactive")?;
    check_deadline(cache, &url, started_at, "detect_interactive")?;
    let detection = interactive::detect(&normalized.html, &snapshot.ax_tree, &snapshot.listener_hits);
    if detection.ax_degraded {
        tracing::warn!(url = %url, "detect_interactive: accessibility tree absent, degraded to DOM-only tiers");
    }

    let dom_hash = dom_structure_hash(&detection.interactables);
    let fingerprint_candidate = Fingerprint {
        dom_structure_hash: dom_hash,
        content_hash: content_hash(&normalized.html),
    };

    let tier = cache.decide_tier(&url, fingerprint_candidate);
    tracing::debug!(?tier, "cache: tier decided");

    if tier == CacheTier::A {
        if let Some(mut cached) = cache.get_full(&url) {
            cached.stats.generation_ms = started_at.elapsed().as_millis() as u64;
            tracing::info!(url = %url, generation_ms = cached.stats.generation_ms, "build_page_map: tier A short-circuit");
            return Ok(cached);
        }
    }
    if tier == CacheTier::C {
        cache.invalidate(&url, InvalidationReason::StructureChanged);
    }

    check_cancelled(cache, &url, cancel, "extract")?;
    check_deadline(cache, &url, started_at, "extract")?;
    let metadata_list = structured::extract(&normalized.html);
    let metadata = merge_metadata(&metadata_list);
    tracing::debug!(schemas_found = metadata_list.len(), "extract: structured data parsed");

    check_cancelled(cache, &url, cancel, "classify")?;
    check_deadline(cache, &url, started_at, "classify")?;
    let classification = classify::classify(
        &normalized.html,
        &snapshot.html,
        &url,
        &metadata_list,
        &detection.interactables,
        snapshot.status,
    );
    tracing::debug!(page_type = %classification.page_type, "classify: page type resolved");

    if let Some(blocked) = &classification.blocked_info {
        tracing::info!(url = %url, kind = %blocked.kind, "classify: page blocked, short-circuiting pruning");
        let page_map = PageMap {
            url: snapshot.url.clone(),
            final_url: url.clone(),
            title: snapshot.title.clone().unwrap_or_default(),
            locale: config.default_locale.clone(),
            page_type: classification.page_type.clone(),
            schema_name: metadata.schema_name.clone(),
            blocked_info: Some(blocked.clone()),
            interactables: detection.interactables,
            pruned_context: String::new(),
            images: Vec::new(),
            metadata,
            fingerprint: Fingerprint {
                dom_structure_hash: dom_hash,
                content_hash: 0,
            },
            stats: PageMapStats {
                tokens: 0,
                interactable_count: 0,
                generation_ms: started_at.elapsed().as_millis() as u64,
                pruning_warnings: vec!["page blocked before pruning ran".to_string()],
            },
            allow_local_network: config.allow_local_network,
        };
        cache.store(&url, page_map.fingerprint, page_map.interactables.clone(), page_map.clone());
        return Ok(page_map);
    }

    check_cancelled(cache, &url, cancel, "resolve_locale")?;
    let host = url_host(&url);
    let resolved_locale = locale::resolve_locale(
        None,
        &host,
        normalized.html_lang.as_deref(),
        &config.locale_table,
        &config.default_locale,
    );

    let interactables = match tier {
        CacheTier::A | CacheTier::B => {
            cache.get_interactables(&url).unwrap_or_else(|| detection.interactables.clone())
        }
        CacheTier::C => detection.interactables.clone(),
    };

    check_cancelled(cache, &url, cancel, "prune")?;
    check_deadline(cache, &url, started_at, "prune")?;
    let referenced_xpath_prefixes: HashSet<String> = interactables
        .iter()
        .map(|i| i.parent_xpath_prefix.clone())
        .collect();
    let prune_output = prune::run(
        &normalized.html,
        &referenced_xpath_prefixes,
        &classification.page_type,
        &resolved_locale,
        config.language_filter_enabled,
    );

    check_cancelled(cache, &url, cancel, "compress")?;
    check_deadline(cache, &url, started_at, "compress")?;
    let compression = compress::render(
        &classification.page_type,
        &prune_output.chunks,
        &metadata,
        &resolved_locale,
        DEFAULT_INFO_TOKEN_BUDGET,
        &normalized.html,
        &snapshot.html,
        cache,
        &host,
    );

    let mut pruning_warnings = Vec::new();
    if let Some(tier) = compression.mcg_fallback_tier {
        pruning_warnings.push(format!("minimum-content-guarantee fallback tier: {tier}"));
    }
    if detection.ax_degraded {
        pruning_warnings.push("accessibility tree unavailable; used DOM-only interactive detection".to_string());
    }
    if normalized.removed_hidden_nodes > 0 {
        pruning_warnings.push(format!("removed {} hidden subtrees", normalized.removed_hidden_nodes));
    }

    let images: Vec<String> = metadata
        .image
        .iter()
        .cloned()
        .chain(metadata.thumbnail_url.iter().cloned())
        .collect();

    let interactable_count = interactables.len();

    let page_map = PageMap {
        url: snapshot.url.clone(),
        final_url: url.clone(),
        title: snapshot.title.clone().unwrap_or_default(),
        locale: resolved_locale,
        page_type: classification.page_type,
        schema_name: metadata.schema_name.clone(),
        blocked_info: None,
        interactables,
        pruned_context: compression.text,
        images,
        metadata,
        fingerprint: fingerprint_candidate,
        stats: PageMapStats {
            tokens: compression.tokens_used,
            interactable_count,
            generation_ms: started_at.elapsed().as_millis() as u64,
            pruning_warnings,
        },
        allow_local_network: config.allow_local_network,
    };

    cache.store(&url, fingerprint_candidate, page_map.interactables.clone(), page_map.clone());
    tracing::info!(
        url = %url,
        tokens = page_map.stats.tokens,
        interactables = page_map.stats.interactable_count,
        generation_ms = page_map.stats.generation_ms,
        "build_page_map: done"
    );
    Ok(page_map)
}

fn url_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::config::PageMapConfig;
    use crate::snapshot::Snapshot;

    fn snapshot(html: &str, url: &str) -> Snapshot {
        Snapshot {
            html: html.to_string(),
            ax_tree: vec![],
            listener_hits: vec![],
            url: url.to_string(),
            final_url: None,
            title: None,
            status: None,
            fingerprint: None,
        }
    }

    #[test]
    fn builds_page_map_for_simple_page() {
        let config = PageMapConfig::default();
        let cache = Cache::new(config.cache_capacity, config.cache_ttl_seconds);
        let snap = snapshot(
            r#"<html><body><h1>Hello</h1><p>A simple paragraph with enough content to survive pruning and compression easily.</p></body></html>"#,
            "https://example.com/",
        );
        let page_map = build_page_map(&snap, &config, &cache, None).unwrap();
        assert_eq!(page_map.final_url, "https://example.com/");
        assert!(!page_map.pruned_context.is_empty());
    }

    #[test]
    fn blocked_page_short_circuits_pruning() {
        let config = PageMapConfig::default();
        let cache = Cache::new(config.cache_capacity, config.cache_ttl_seconds);
        let snap = snapshot(
            r#"<html><body><div class="cf-turnstile"></div><button>Verify you are human</button></body></html>"#,
            "https://example.com/",
        );
        let page_map = build_page_map(&snap, &config, &cache, None).unwrap();
        assert_eq!(page_map.page_type, "blocked");
        assert!(page_map.blocked_info.is_some());
    }

    #[test]
    fn repeated_build_hits_cache_tier_a() {
        let config = PageMapConfig::default();
        let cache = Cache::new(config.cache_capacity, config.cache_ttl_seconds);
        let snap = snapshot(
            r#"<html><body><p>Stable content that does not change between requests at all.</p></body></html>"#,
            "https://example.com/stable",
        );
        let first = build_page_map(&snap, &config, &cache, None).unwrap();
        let second = build_page_map(&snap, &config, &cache, None).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn already_cancelled_token_aborts_immediately() {
        let config = PageMapConfig::default();
        let cache = Cache::new(config.cache_capacity, config.cache_ttl_seconds);
        let snap = snapshot("<html><body></body></html>", "https://example.com/");
        let cancelled = AtomicBool::new(true);
        let err = build_page_map(&snap, &config, &cache, Some(&cancelled)).unwrap_err();
        assert!(matches!(err, PageMapError::PipelineTimeout { .. }));
    }
}
