//! C5 — Pruning Pipeline, five stages applied in order:
//! attribute strip → script-island extraction → semantic filter →
//! schema-aware chunking → compression.
//!
//! Grounded on the link-density / boilerplate-removal idiom of the
//! corpus's `justext-rs` (the entire purpose of that crate is stage 3 of
//! this one) and `riptidecrawler`'s extraction crate shape.

mod stage1_attrs;
mod stage2_script_islands;
mod stage3_semantic;
mod stage4_chunk;
mod stage5_compress;

pub mod language;

pub use stage1_attrs::class_is_semantic;
pub use stage4_chunk::{ChunkType, HtmlChunk};
pub use stage5_compress::{greedy_select, mcg_cascade, raw_html_tail_fallback, CompressionOutput, MCG_TOKEN_FLOOR};

use scraper::Html;
use std::collections::HashSet;

pub struct PruneOutput {
    pub chunks: Vec<HtmlChunk>,
    pub removed_nodes: usize,
}

/// Runs stages 1-4 (attribute allowlisting, script-island skipping,
/// semantic filtering, schema-aware chunking + page-type weighting, and
/// the language filter). Stage 5 (compression) and the page-type-specific
/// rendering live in [`crate::compress`], which calls back into this
/// module's [`greedy_select`]/[`mcg_cascade`]/[`raw_html_tail_fallback`]
/// for the generic packing and the Minimum-Content-Guarantee cascade.
pub fn run(
    doc: &Html,
    referenced_xpath_prefixes: &HashSet<String>,
    page_type: &str,
    locale: &str,
    language_filter_enabled: bool,
) -> PruneOutput {
    let allowed_attrs = stage1_attrs::allowed_attribute_names();
    let (excluded, rescued) = stage3_semantic::filter(doc, referenced_xpath_prefixes);
    let mut chunks = stage4_chunk::chunk(doc, &excluded, &allowed_attrs);

    stage4_chunk::apply_page_type_weights(&mut chunks, page_type);

    if language_filter_enabled {
        language::filter_chunks(&mut chunks, locale);
    }

    PruneOutput {
        chunks,
        removed_nodes: excluded.len().saturating_sub(rescued),
    }
}
