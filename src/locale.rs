//! C1 — Token Budgeter.
//!
//! Per-locale char/token ratios, section budget split, and locale
//! resolution (explicit config → host table → `<html lang>` → default).
//! Unicode-script bisect classification backs both the language filter in
//! `prune` and the CJK budget factor in `compress`.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_script::{Script, UnicodeScript};

/// Characters-per-token ratios for the locales this crate recognizes by
/// name. Anything outside this table falls back to the English ratio,
/// which is the conservative (smallest-output) choice for unfamiliar
/// scripts.
fn chars_per_token(locale: &str) -> f64 {
    match locale {
        "ko" => 0.6,
        "ja" => 0.7,
        "zh" | "zh-CN" | "zh-TW" | "zh-HK" => 0.7,
        "en" => 4.0,
        // European Latin-script locales cluster tightly; 3.5-4.0 per spec.
        "fr" | "de" | "it" | "pt" | "nl" | "sv" | "da" | "no" | "fi" | "pl" => 3.7,
        "es" => 3.8,
        _ => 4.0,
    }
}

/// Built-in host/TLD → locale table, covering the ten locales named in the
/// spec's token-budgeter contract. Extended (never replaced) by
/// `PageMapConfig::locale_table`.
static HOST_LOCALE_TABLE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (".kr", "ko"),
        ("naver.com", "ko"),
        (".jp", "ja"),
        ("yahoo.co.jp", "ja"),
        (".cn", "zh"),
        ("baidu.com", "zh"),
        (".tw", "zh-TW"),
        (".fr", "fr"),
        (".de", "de"),
        (".it", "it"),
        (".es", "es"),
        (".pt", "pt"),
        (".nl", "nl"),
        (".se", "sv"),
        (".dk", "da"),
        (".no", "no"),
        (".fi", "fi"),
        (".pl", "pl"),
    ])
});

/// Estimates the token count of `text` under `locale`'s char/token ratio.
/// Always rounds up: under-budgeting output is the safer failure mode than
/// silently exceeding the caller's budget.
pub fn estimate(text: &str, locale: &str) -> usize {
    let ratio = chars_per_token(locale);
    let chars = text.chars().count() as f64;
    (chars / ratio).ceil() as usize
}

/// Splits `total` tokens across `weights` proportionally, in the order
/// given. The remainder (from integer rounding) is added to the
/// highest-weighted section so CJK sections are never starved by
/// rounding-down on every section in turn.
pub fn compute_section_budgets(total: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return vec![0; weights.len()];
    }
    let mut budgets: Vec<usize> = weights
        .iter()
        .map(|w| ((w / sum) * total as f64).floor() as usize)
        .collect();
    let assigned: usize = budgets.iter().sum();
    if let Some(remainder) = total.checked_sub(assigned) {
        if remainder > 0 {
            let (max_idx, _) = weights
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap();
            budgets[max_idx] += remainder;
        }
    }
    budgets
}

/// Resolves the effective locale for a page: explicit config override →
/// host/TLD table (built-in, extended by config) → `<html lang>` attribute
/// → `"en"`.
pub fn resolve_locale(
    explicit: Option<&str>,
    url_host: &str,
    html_lang: Option<&str>,
    config_table: &HashMap<String, String>,
    default_locale: &str,
) -> String {
    if let Some(locale) = explicit {
        return locale.to_string();
    }
    for (suffix, locale) in config_table.iter() {
        if url_host.ends_with(suffix.as_str()) || url_host == suffix.as_str() {
            return locale.clone();
        }
    }
    for (suffix, locale) in HOST_LOCALE_TABLE.iter() {
        if url_host.ends_with(suffix) {
            return (*locale).to_string();
        }
    }
    if let Some(lang) = html_lang {
        let primary = lang.split(['-', '_']).next().unwrap_or(lang);
        if !primary.is_empty() {
            return primary.to_string();
        }
    }
    default_locale.to_string()
}

/// Dominant Unicode script of a string, used by the stage-5 language filter
/// and the CJK budget factor in `compress`. Punctuation, digits, and
/// whitespace are ignored; `Script::Common`/`Script::Unknown` are ignored so
/// a line of pure numerals or URLs never counts as "disagreeing".
pub fn dominant_script(text: &str) -> Option<Script> {
    let mut counts: HashMap<Script, usize> = HashMap::new();
    for ch in text.chars() {
        if ch.is_whitespace() || ch.is_ascii_punctuation() {
            continue;
        }
        let script = ch.script();
        if script == Script::Common || script == Script::Unknown || script == Script::Inherited {
            continue;
        }
        *counts.entry(script).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(script, _)| script)
}

/// True when `text` is CJK-dominant (used for the 0.85 budget factor in the
/// video compressor and the language filter's exemption rules).
pub fn is_cjk_script(script: Script) -> bool {
    matches!(script, Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_english_and_korean_differently() {
        let text = "a".repeat(40);
        assert_eq!(estimate(&text, "en"), 10);
        assert!(estimate(&text, "ko") > estimate(&text, "en"));
    }

    #[test]
    fn section_budgets_sum_to_total() {
        let budgets = compute_section_budgets(100, &[1.0, 2.0, 1.0]);
        assert_eq!(budgets.iter().sum::<usize>(), 100);
    }

    #[test]
    fn section_budgets_empty_weights() {
        assert!(compute_section_budgets(100, &[]).is_empty());
    }

    #[test]
    fn resolves_locale_from_host_table() {
        let table = HashMap::new();
        let locale = resolve_locale(None, "www.naver.com", None, &table, "en");
        assert_eq!(locale, "ko");
    }

    #[test]
    fn resolves_locale_from_html_lang_when_host_unknown() {
        let table = HashMap::new();
        let locale = resolve_locale(None, "example.com", Some("fr-CA"), &table, "en");
        assert_eq!(locale, "fr");
    }

    #[test]
    fn falls_back_to_default_locale() {
        let table = HashMap::new();
        let locale = resolve_locale(None, "example.com", None, &table, "en");
        assert_eq!(locale, "en");
    }

    #[test]
    fn dominant_script_ignores_digits_and_punctuation() {
        let script = dominant_script("한글 123!").unwrap();
        assert_eq!(script, Script::Hangul);
    }

    #[test]
    fn dominant_script_none_for_pure_numerals() {
        assert!(dominant_script("12345").is_none());
    }
}
