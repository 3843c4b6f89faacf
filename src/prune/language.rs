//! Script-based language filter (enabled by default, spec §4.5).
//!
//! Lines whose dominant Unicode script disagrees with the page-dominant
//! script are removed when short (assumed UI noise) or tagged `[lang]`
//! when long enough to be real content in another language. URLs,
//! numerals, brand-name-shaped tokens, and strings of five characters or
//! fewer always pass through untouched.

use super::stage4_chunk::HtmlChunk;
use crate::locale::dominant_script;

const SHORT_LINE_REMOVAL_THRESHOLD: usize = 30;
const ALWAYS_PASS_CHAR_FLOOR: usize = 5;

fn looks_like_url(line: &str) -> bool {
    line.contains("://") || line.starts_with("www.")
}

fn looks_numeral_like(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit() || c.is_ascii_punctuation() || c.is_whitespace())
}

fn process_line(line: &str, page_script: Option<unicode_script::Script>) -> Option<String> {
    if line.chars().count() <= ALWAYS_PASS_CHAR_FLOOR {
        return Some(line.to_string());
    }
    if looks_like_url(line) || looks_numeral_like(line) {
        return Some(line.to_string());
    }
    let Some(page_script) = page_script else {
        return Some(line.to_string());
    };
    let line_script = dominant_script(line);
    match line_script {
        Some(script) if script != page_script => {
            if line.chars().count() < SHORT_LINE_REMOVAL_THRESHOLD {
                None
            } else {
                Some(format!("[lang] {line}"))
            }
        }
        _ => Some(line.to_string()),
    }
}

/// Mutates `chunks` in place, dropping or `[lang]`-tagging disagreeing
/// lines, and removes chunks that become empty as a result.
pub fn filter_chunks(chunks: &mut Vec<HtmlChunk>, _locale: &str) {
    let aggregate: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
    let page_script = dominant_script(&aggregate);

    for chunk in chunks.iter_mut() {
        let filtered: Vec<String> = chunk
            .text
            .lines()
            .filter_map(|line| process_line(line, page_script))
            .collect();
        chunk.text = filtered.join("\n");
    }
    chunks.retain(|c| !c.text.trim().is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::stage4_chunk::ChunkType;
    use std::collections::HashMap;

    fn chunk(text: &str) -> HtmlChunk {
        HtmlChunk {
            chunk_type: ChunkType::Paragraph,
            text: text.to_string(),
            weight: 1.0,
            attrs: HashMap::new(),
            xpath_prefix: "/html/body/p[1]".to_string(),
        }
    }

    #[test]
    fn urls_and_short_strings_always_pass() {
        assert_eq!(process_line("https://example.com/a", Some(unicode_script::Script::Latin)), Some("https://example.com/a".to_string()));
        assert_eq!(process_line("OK", Some(unicode_script::Script::Han)), Some("OK".to_string()));
    }

    #[test]
    fn short_disagreeing_line_is_removed_long_one_is_tagged() {
        assert_eq!(process_line("안녕", Some(unicode_script::Script::Latin)), None);
        let long_korean = "안녕하세요 이것은 꽤 긴 한국어 문장입니다 분명히 서른 글자는 넘습니다";
        let tagged = process_line(long_korean, Some(unicode_script::Script::Latin));
        assert!(tagged.unwrap().starts_with("[lang] "));
    }

    #[test]
    fn drops_chunks_that_become_fully_empty() {
        let mut chunks = vec![chunk("안녕"), chunk("English paragraph that is clearly dominant script here")];
        filter_chunks(&mut chunks, "en");
        assert_eq!(chunks.len(), 1);
    }
}
