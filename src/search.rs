//! Case-insensitive literal search over document text.
//!
//! Page numbers for hits are a linear proportion of the match offset to the
//! text length. They are only a hint; real page breaks are not consulted.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;

const SNIPPET_CONTEXT_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct SearchHit {
    /// Char offsets of the match in the searched text.
    pub start: usize,
    pub end: usize,
    /// Best-effort 1-based page.
    pub approx_page: usize,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
}

fn literal_pattern(query: &str) -> Option<Regex> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

pub fn search(text: &str, query: &str, page_count: usize) -> Vec<SearchHit> {
    let Some(pattern) = literal_pattern(query) else {
        return Vec::new();
    };
    let total_chars = text.chars().count();
    let page_count = page_count.max(1);

    let mut hits = Vec::new();
    let mut chars_before = 0usize;
    let mut last_byte = 0usize;
    for found in pattern.find_iter(text) {
        chars_before += text[last_byte..found.start()].chars().count();
        let match_chars = found.as_str().chars().count();
        last_byte = found.start();

        hits.push(SearchHit {
            start: chars_before,
            end: chars_before + match_chars,
            approx_page: approx_page(chars_before, total_chars, page_count),
            snippet: snippet(text, found.start(), found.end()),
        });
    }
    debug!(query = %query.trim(), hits = hits.len(), "Search finished");
    hits
}

pub fn approx_page(offset: usize, total_chars: usize, page_count: usize) -> usize {
    if total_chars == 0 || page_count <= 1 {
        return 1;
    }
    (offset.saturating_mul(page_count) / total_chars + 1).min(page_count)
}

/// Split `text` into alternating plain and highlighted runs for `query`.
pub fn highlight_segments(text: &str, query: &str) -> Vec<Segment> {
    let Some(pattern) = literal_pattern(query) else {
        return vec![Segment {
            text: text.to_string(),
            highlighted: false,
        }];
    };

    let mut segments = Vec::new();
    let mut cursor = 0usize;
    for found in pattern.find_iter(text) {
        if found.start() > cursor {
            segments.push(Segment {
                text: text[cursor..found.start()].to_string(),
                highlighted: false,
            });
        }
        segments.push(Segment {
            text: found.as_str().to_string(),
            highlighted: true,
        });
        cursor = found.end();
    }
    if cursor < text.len() || segments.is_empty() {
        segments.push(Segment {
            text: text[cursor..].to_string(),
            highlighted: false,
        });
    }
    segments
}

fn snippet(text: &str, start: usize, end: usize) -> String {
    let before: String = {
        let mut chars: Vec<char> = text[..start]
            .chars()
            .rev()
            .take(SNIPPET_CONTEXT_CHARS)
            .collect();
        chars.reverse();
        chars.into_iter().collect()
    };
    let after: String = text[end..].chars().take(SNIPPET_CONTEXT_CHARS).collect();
    let joined = format!("{before}{}{after}", &text[start..end]);
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
