//! The single funnel every text field emitted on a `PageMap` passes through
//! before assembly (spec invariant: sanitization is total, no emitted string
//! bypasses it).

use once_cell::sync::Lazy;
use regex::Regex;

static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\u{80}-\u{9F}]").expect("static control-char pattern")
});

static ROLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(system|assistant|user|developer)\s*:\s*").expect("static role-prefix pattern")
});

static TRAILING_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\n").expect("static trailing-whitespace pattern"));

static MULTI_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static blank-line collapse pattern"));

/// Decodes HTML entities, normalizes non-breaking spaces, strips control
/// characters and prompt-injection role prefixes, and collapses trailing
/// whitespace. Idempotent: `sanitize_text(sanitize_text(s)) == sanitize_text(s)`.
pub fn sanitize_text(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input);
    let nbsp_normalized = decoded.replace('\u{a0}', " ");
    let no_control = CONTROL_CHARS.replace_all(&nbsp_normalized, "");
    let no_role_prefix = ROLE_PREFIX.replace(&no_control, "");
    let trimmed_lines = TRAILING_WHITESPACE.replace_all(&no_role_prefix, "\n");
    let collapsed = MULTI_BLANK_LINES.replace_all(&trimmed_lines, "\n\n");
    collapsed.trim().to_string()
}
