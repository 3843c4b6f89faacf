//! C8 — Page-Map Assembler & Serializer.
//!
//! Produces the three output forms from one [`PageMap`]: the canonical
//! agent prompt, lossless JSON, and a diff against a prior build for the
//! same URL. Grounded on the teacher's "multiple shapes from one captured
//! state" convention (`agent/types.rs::PageState`/`DOMContext`, both
//! derived from a single CDP session snapshot).

use crate::classify::BlockedInfo;
use crate::interactive::{Affordance, Bucket, Interactable};
use crate::structured::Metadata;
use serde_json::{json, Value};

const DEFAULT_MAX_TEXT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub dom_structure_hash: u64,
    pub content_hash: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PageMapStats {
    pub tokens: usize,
    pub interactable_count: usize,
    pub generation_ms: u64,
    pub pruning_warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PageMap {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub locale: String,
    pub page_type: String,
    pub schema_name: String,
    pub blocked_info: Option<BlockedInfo>,
    pub interactables: Vec<Interactable>,
    pub pruned_context: String,
    pub images: Vec<String>,
    pub metadata: Metadata,
    pub fingerprint: Fingerprint,
    pub stats: PageMapStats,
    /// `PageMapConfig::allow_local_network` at the time this page map was
    /// built, recorded verbatim for audit (spec §6).
    pub allow_local_network: bool,
}

fn affordance_str(a: Affordance) -> &'static str {
    match a {
        Affordance::Click => "click",
        Affordance::Type => "type",
        Affordance::Select => "select",
        Affordance::Hover => "hover",
    }
}

fn bucket_str(b: Bucket) -> &'static str {
    match b {
        Bucket::Primary => "primary",
        Bucket::Named => "named",
        Bucket::Inputish => "inputish",
        Bucket::Chrome => "chrome",
        Bucket::TableNoise => "table-noise",
        Bucket::Rest => "rest",
    }
}

fn format_interactable_line(i: &Interactable) -> String {
    let affordances = i
        .affordances
        .iter()
        .map(|a| affordance_str(*a))
        .collect::<Vec<_>>()
        .join(",");
    let options = if i.options.is_empty() {
        String::new()
    } else {
        format!(" [options={}]", i.options.join(","))
    };
    format!("[{}] {}: {} ({}){}", i.r#ref, i.role, i.name, affordances, options)
}

/// Truncates `text` to at most `limit` bytes on a UTF-8 boundary, appending
/// a tail marker naming the recovery action when truncation occurs.
fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n…[truncated at {limit} bytes; call get_page_map with a narrower scope to see more]",
        &text[..cut]
    )
}

impl PageMap {
    /// The canonical, stable agent-prompt layout (spec §6). Field order
    /// and punctuation are part of the contract agents parse on; never
    /// reorder these sections.
    pub fn to_agent_prompt(&self, max_text_bytes: Option<usize>) -> String {
        let limit = max_text_bytes.unwrap_or(DEFAULT_MAX_TEXT_BYTES);

        if let Some(blocked) = &self.blocked_info {
            let verify = blocked
                .verify_ref
                .map(|r| format!(" [verify_ref={r}]"))
                .unwrap_or_default();
            return format!(
                "URL: {}\nTitle: {}\nType: blocked\n\n## Blocked\nDetected: {}{}\n",
                self.final_url, self.title, blocked.kind, verify
            );
        }

        let actions = self
            .interactables
            .iter()
            .map(format_interactable_line)
            .collect::<Vec<_>>()
            .join("\n");

        let images = self
            .images
            .iter()
            .enumerate()
            .map(|(idx, url)| format!("  [{}] {}", idx + 1, url))
            .collect::<Vec<_>>()
            .join("\n");

        let info = truncate_with_marker(&self.pruned_context, limit);

        format!(
            "URL: {}\nTitle: {}\nType: {}\n\n## Actions\n{}\n\n## Info\n{}\n\n## Images\n{}\n\n## Meta\nTokens: ~{} | Interactables: {} | Generation: {}ms\n",
            self.final_url,
            self.title,
            self.page_type,
            actions,
            info,
            images,
            self.stats.tokens,
            self.stats.interactable_count,
            self.stats.generation_ms,
        )
    }

    pub fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "final_url": self.final_url,
            "title": self.title,
            "locale": self.locale,
            "page_type": self.page_type,
            "schema_name": self.schema_name,
            "blocked_info": self.blocked_info.as_ref().map(|b| json!({
                "kind": b.kind,
                "verify_ref": b.verify_ref,
            })),
            "interactables": self.interactables.iter().map(|i| json!({
                "ref": i.r#ref,
                "role": i.role,
                "name": i.name,
                "affordances": i.affordances.iter().map(|a| affordance_str(*a)).collect::<Vec<_>>(),
                "selector_chain": i.selector_chain,
                "options": i.options,
                "bucket": bucket_str(i.bucket),
            })).collect::<Vec<_>>(),
            "pruned_context": self.pruned_context,
            "images": self.images,
            "metadata": {
                "schema_name": self.metadata.schema_name,
                "name": self.metadata.name,
                "price": self.metadata.price,
                "currency": self.metadata.currency,
                "price_range": self.metadata.price_range,
                "rating": self.metadata.rating,
                "review_count": self.metadata.review_count,
                "brand": self.metadata.brand,
                "availability": self.metadata.availability,
                "image": self.metadata.image,
                "headline": self.metadata.headline,
                "author": self.metadata.author,
                "date_published": self.metadata.date_published,
                "channel": self.metadata.channel,
                "duration": self.metadata.duration,
                "upload_date": self.metadata.upload_date,
                "view_count": self.metadata.view_count,
                "like_count": self.metadata.like_count,
                "thumbnail_url": self.metadata.thumbnail_url,
                "extra": self.metadata.extra,
            },
            "fingerprint": {
                "dom_structure_hash": self.fingerprint.dom_structure_hash,
                "content_hash": self.fingerprint.content_hash,
            },
            "allow_local_network": self.allow_local_network,
            "stats": {
                "tokens": self.stats.tokens,
                "interactable_count": self.stats.interactable_count,
                "generation_ms": self.stats.generation_ms,
                "pruning_warnings": self.stats.pruning_warnings,
            },
        })
    }

    /// Diffs this PageMap's agent prompt against `previous`'s, section by
    /// section: unchanged sections collapse to `— unchanged`, changed ones
    /// are fully re-rendered.
    pub fn diff_against(&self, previous: Option<&PageMap>) -> String {
        let Some(previous) = previous else {
            return self.to_agent_prompt(None);
        };

        let current_sections = split_sections(&self.to_agent_prompt(None));
        let previous_sections = split_sections(&previous.to_agent_prompt(None));

        let mut out = Vec::new();
        for (header, body) in current_sections {
            let unchanged = previous_sections
                .iter()
                .any(|(prev_header, prev_body)| prev_header == &header && prev_body == &body);
            if unchanged {
                out.push(format!("{header}\n— unchanged"));
            } else {
                out.push(format!("{header}\n{body}"));
            }
        }
        out.join("\n\n")
    }
}

fn split_sections(prompt: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current_header = String::new();
    let mut current_body = Vec::new();
    for line in prompt.lines() {
        if line.starts_with("## ") || (sections.is_empty() && current_header.is_empty() && !line.starts_with("## ")) {
            if line.starts_with("## ") {
                if !current_header.is_empty() || !current_body.is_empty() {
                    sections.push((current_header.clone(), current_body.join("\n")));
                }
                current_header = line.to_string();
                current_body.clear();
                continue;
            }
        }
        current_body.push(line.to_string());
    }
    sections.push((current_header, current_body.join("\n")));
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{Fingerprint, PageMapStats};

    fn sample_page_map(info: &str) -> PageMap {
        PageMap {
            url: "https://example.com".to_string(),
            final_url: "https://example.com".to_string(),
            title: "Example".to_string(),
            locale: "en".to_string(),
            page_type: "landing".to_string(),
            schema_name: "Generic".to_string(),
            blocked_info: None,
            interactables: vec![],
            pruned_context: info.to_string(),
            images: vec![],
            metadata: Metadata::default(),
            fingerprint: Fingerprint {
                dom_structure_hash: 1,
                content_hash: 2,
            },
            stats: PageMapStats::default(),
            allow_local_network: false,
        }
    }

    #[test]
    fn agent_prompt_contains_required_sections_in_order() {
        let page_map = sample_page_map("hello");
        let prompt = page_map.to_agent_prompt(None);
        let actions_idx = prompt.find("## Actions").unwrap();
        let info_idx = prompt.find("## Info").unwrap();
        let images_idx = prompt.find("## Images").unwrap();
        let meta_idx = prompt.find("## Meta").unwrap();
        assert!(actions_idx < info_idx && info_idx < images_idx && images_idx < meta_idx);
    }

    #[test]
    fn truncates_oversized_info_with_marker() {
        let page_map = sample_page_map(&"x".repeat(100));
        let prompt = page_map.to_agent_prompt(Some(10));
        assert!(prompt.contains("truncated at 10 bytes"));
    }

    #[test]
    fn diff_marks_unchanged_sections() {
        let previous = sample_page_map("same info");
        let current = sample_page_map("same info");
        let diff = current.diff_against(Some(&previous));
        assert!(diff.contains("— unchanged"));
    }

    #[test]
    fn diff_rerenders_changed_sections() {
        let previous = sample_page_map("old info");
        let current = sample_page_map("new info");
        let diff = current.diff_against(Some(&previous));
        assert!(diff.contains("new info"));
    }
}
