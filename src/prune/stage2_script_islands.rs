//! Stage 2 — Script-island extraction.
//!
//! JSON-LD and Open Graph payload shapes are captured by
//! [`crate::structured::extract`] directly off the normalized document
//! before this stage runs; this module's job is narrower: it marks
//! `<script>`, `<style>`, `<noscript>`, and `<template>` as non-content so
//! stage 3/4 traversal never emits chunks for them. React-server-component
//! payload capture named in the spec is not implemented — there is no
//! dedicated parser for `self.__next_f.push(...)`-shaped streams anywhere
//! in this crate; such payloads are treated as opaque script content and
//! dropped along with everything else this stage marks non-content.

/// Tags whose subtrees carry no renderable content and must never become
/// (or contribute to) an [`super::HtmlChunk`].
pub fn is_non_content_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "template")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_non_content_tags() {
        assert!(is_non_content_tag("script"));
        assert!(is_non_content_tag("template"));
        assert!(!is_non_content_tag("article"));
    }
}
